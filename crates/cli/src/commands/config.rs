use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use huntbot_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use super::CommandResult;

/// One rendered setting: dotted key, display value and the env var that can
/// override it.
struct Setting {
    key: &'static str,
    value: String,
    env_key: &'static str,
}

pub fn run(config_path: Option<&Path>) -> CommandResult {
    let options =
        LoadOptions { config_path: config_path.map(Path::to_path_buf), ..LoadOptions::default() };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("config", "config_validation", error.to_string(), 2)
        }
    };

    let config_file_path = detect_config_path(config_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for setting in settings(&config) {
        let source = field_source(
            setting.key,
            setting.env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(setting.key, &setting.value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn settings(config: &AppConfig) -> Vec<Setting> {
    let setting = |key, value: &str, env_key| Setting { key, value: value.to_string(), env_key };
    let discord = &config.discord;
    let google = &config.google;

    vec![
        setting(
            "discord.bot_token",
            &redact_token(discord.bot_token.expose_secret()),
            "HUNTBOT_DISCORD_BOT_TOKEN",
        ),
        setting("discord.guild_id", &discord.guild_id, "HUNTBOT_DISCORD_GUILD_ID"),
        setting(
            "discord.puzzle_category_id",
            &discord.puzzle_category_id,
            "HUNTBOT_DISCORD_PUZZLE_CATEGORY_ID",
        ),
        setting(
            "discord.solved_category_id",
            &discord.solved_category_id,
            "HUNTBOT_DISCORD_SOLVED_CATEGORY_ID",
        ),
        setting(
            "discord.voice_category_id",
            discord.voice_category_id.as_deref().unwrap_or("<unset>"),
            "HUNTBOT_DISCORD_VOICE_CATEGORY_ID",
        ),
        setting(
            "discord.command_prefix",
            &discord.command_prefix,
            "HUNTBOT_DISCORD_COMMAND_PREFIX",
        ),
        setting("discord.api_base_url", &discord.api_base_url, "HUNTBOT_DISCORD_API_BASE_URL"),
        setting(
            "google.access_token",
            &redact_token(google.access_token.expose_secret()),
            "HUNTBOT_GOOGLE_ACCESS_TOKEN",
        ),
        setting(
            "google.puzzle_sheet_id",
            &google.puzzle_sheet_id,
            "HUNTBOT_GOOGLE_PUZZLE_SHEET_ID",
        ),
        setting("google.hunt_folder_id", &google.hunt_folder_id, "HUNTBOT_GOOGLE_HUNT_FOLDER_ID"),
        setting("google.sheet_range", &google.sheet_range, "HUNTBOT_GOOGLE_SHEET_RANGE"),
        setting(
            "google.sheets_base_url",
            &google.sheets_base_url,
            "HUNTBOT_GOOGLE_SHEETS_BASE_URL",
        ),
        setting("google.drive_base_url", &google.drive_base_url, "HUNTBOT_GOOGLE_DRIVE_BASE_URL"),
        setting("server.bind_address", &config.server.bind_address, "HUNTBOT_SERVER_BIND_ADDRESS"),
        setting(
            "server.health_check_port",
            &config.server.health_check_port.to_string(),
            "HUNTBOT_SERVER_HEALTH_CHECK_PORT",
        ),
        setting(
            "server.graceful_shutdown_secs",
            &config.server.graceful_shutdown_secs.to_string(),
            "HUNTBOT_SERVER_GRACEFUL_SHUTDOWN_SECS",
        ),
        setting("logging.level", &config.logging.level, "HUNTBOT_LOGGING_LEVEL"),
        setting(
            "logging.format",
            &format!("{:?}", config.logging.format),
            "HUNTBOT_LOGGING_FORMAT",
        ),
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    let root = PathBuf::from("huntbot.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/huntbot.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the last four characters of long tokens so operators can tell
/// credentials apart.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let chars = trimmed.chars().collect::<Vec<_>>();
    if chars.len() < 16 {
        return "<redacted>".to_string();
    }

    let tail = chars[chars.len() - 4..].iter().collect::<String>();
    format!("***{tail}")
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_token};

    #[test]
    fn short_tokens_are_fully_redacted() {
        assert_eq!(redact_token(""), "<empty>");
        assert_eq!(redact_token("discord-token"), "<redacted>");
        assert_eq!(redact_token("ya29.a0AfH6SMBxxxxxxxxxxLw9Q"), "***Lw9Q");
    }

    #[test]
    fn dotted_paths_resolve_into_tables() {
        let doc = "[google]\nsheet_range = \"A:G\"\n".parse::<Value>().expect("toml");

        assert!(contains_path(&doc, "google.sheet_range"));
        assert!(!contains_path(&doc, "google.hunt_folder_id"));
        assert!(!contains_path(&doc, "discord.guild_id"));
    }
}
