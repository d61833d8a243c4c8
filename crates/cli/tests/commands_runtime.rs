use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use huntbot_cli::commands::{config, doctor};
use serde_json::Value;

const VALID_ENV: [(&str, &str); 7] = [
    ("HUNTBOT_DISCORD_BOT_TOKEN", "discord-token"),
    ("HUNTBOT_DISCORD_GUILD_ID", "100"),
    ("HUNTBOT_DISCORD_PUZZLE_CATEGORY_ID", "200"),
    ("HUNTBOT_DISCORD_SOLVED_CATEGORY_ID", "300"),
    ("HUNTBOT_GOOGLE_ACCESS_TOKEN", "google-token"),
    ("HUNTBOT_GOOGLE_PUZZLE_SHEET_ID", "sheet-1"),
    ("HUNTBOT_GOOGLE_HUNT_FOLDER_ID", "folder-1"),
];

const MISSING_CONFIG: &str = "does-not-exist/huntbot.toml";

#[test]
fn config_renders_redacted_values_with_sources() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("huntbot.toml");
    fs::write(&path, "[google]\nsheet_range = \"A:G\"\n").expect("write config");

    with_env(&VALID_ENV, || {
        let result = config::run(Some(path.as_path()));
        assert_eq!(result.exit_code, 0, "expected config to render: {}", result.output);

        let output = &result.output;
        assert!(output.contains(
            "- discord.bot_token = <redacted> (source: env (HUNTBOT_DISCORD_BOT_TOKEN))"
        ));
        assert!(output.contains(&format!(
            "- google.sheet_range = A:G (source: file ({}))",
            path.display()
        )));
        assert!(output.contains("- server.bind_address = 127.0.0.1 (source: default)"));
        assert!(output.contains("- discord.voice_category_id = <unset> (source: default)"));
        assert!(!output.contains("discord-token"));
        assert!(!output.contains("google-token"));
    });
}

#[test]
fn config_returns_validation_failure_without_tokens() {
    with_env(&[], || {
        let result = config::run(Some(Path::new(MISSING_CONFIG)));
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("discord.bot_token"));
    });
}

#[test]
fn doctor_skips_collaborator_checks_when_config_is_invalid() {
    with_env(&[], || {
        let result = doctor::run(Some(Path::new(MISSING_CONFIG)), true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["name"], "config_validation");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
        assert_eq!(payload["checks"][2]["status"], "skipped");
    });
}

#[test]
fn doctor_reports_unreachable_collaborators() {
    let mut vars = VALID_ENV.to_vec();
    vars.extend([
        ("HUNTBOT_DISCORD_API_BASE_URL", "http://127.0.0.1:9/api/v10"),
        ("HUNTBOT_GOOGLE_SHEETS_BASE_URL", "http://127.0.0.1:9/v4"),
        ("HUNTBOT_GOOGLE_DRIVE_BASE_URL", "http://127.0.0.1:9/drive/v3"),
    ]);

    with_env(&vars, || {
        let result = doctor::run(Some(Path::new(MISSING_CONFIG)), false);
        assert_eq!(result.exit_code, 1);

        let lines = result.output.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "doctor: one or more readiness checks failed");
        assert!(lines[1].starts_with("- [ok] config_validation"));
        assert!(lines[2].starts_with("- [fail] sheet_connectivity"));
        assert!(lines[3].starts_with("- [fail] category_readiness"));
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "HUNTBOT_DISCORD_BOT_TOKEN",
        "HUNTBOT_DISCORD_GUILD_ID",
        "HUNTBOT_DISCORD_PUZZLE_CATEGORY_ID",
        "HUNTBOT_DISCORD_SOLVED_CATEGORY_ID",
        "HUNTBOT_DISCORD_VOICE_CATEGORY_ID",
        "HUNTBOT_DISCORD_COMMAND_PREFIX",
        "HUNTBOT_DISCORD_API_BASE_URL",
        "HUNTBOT_GOOGLE_ACCESS_TOKEN",
        "HUNTBOT_GOOGLE_PUZZLE_SHEET_ID",
        "HUNTBOT_GOOGLE_HUNT_FOLDER_ID",
        "HUNTBOT_GOOGLE_SHEET_RANGE",
        "HUNTBOT_GOOGLE_SHEETS_BASE_URL",
        "HUNTBOT_GOOGLE_DRIVE_BASE_URL",
        "HUNTBOT_SERVER_BIND_ADDRESS",
        "HUNTBOT_SERVER_HEALTH_CHECK_PORT",
        "HUNTBOT_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "HUNTBOT_LOGGING_LEVEL",
        "HUNTBOT_LOGGING_FORMAT",
        "HUNTBOT_LOG_LEVEL",
        "HUNTBOT_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
