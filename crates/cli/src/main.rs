use std::process::ExitCode;

fn main() -> ExitCode {
    huntbot_cli::run()
}
