pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "huntbot",
    about = "Huntbot operator CLI",
    long_about = "Inspect huntbot configuration and check that the puzzle sheet and Discord \
                  categories are reachable before a hunt.",
    after_help = "Examples:\n  huntbot doctor --json\n  huntbot config\n  \
                  huntbot --config ./config/huntbot.toml doctor"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Config file to load instead of huntbot.toml")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, sheet connectivity, and Discord category readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Command::Config => commands::config::run(config_path),
        Command::Doctor { json } => commands::doctor::run(config_path, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
