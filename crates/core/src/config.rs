use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::A1Range;
use crate::directory::DirectoryLayout;
use crate::domain::puzzle::COLUMN_COUNT;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub discord: DiscordConfig,
    pub google: GoogleConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DiscordConfig {
    pub bot_token: SecretString,
    pub guild_id: String,
    pub puzzle_category_id: String,
    pub solved_category_id: String,
    pub voice_category_id: Option<String>,
    pub command_prefix: String,
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct GoogleConfig {
    pub access_token: SecretString,
    pub puzzle_sheet_id: String,
    pub hunt_folder_id: String,
    pub sheet_range: String,
    pub sheets_base_url: String,
    pub drive_base_url: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub discord_bot_token: Option<String>,
    pub google_access_token: Option<String>,
    pub puzzle_sheet_id: Option<String>,
    pub health_check_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            discord: DiscordConfig {
                bot_token: String::new().into(),
                guild_id: String::new(),
                puzzle_category_id: String::new(),
                solved_category_id: String::new(),
                voice_category_id: None,
                command_prefix: "!".to_string(),
                api_base_url: "https://discord.com/api/v10".to_string(),
            },
            google: GoogleConfig {
                access_token: String::new().into(),
                puzzle_sheet_id: String::new(),
                hunt_folder_id: String::new(),
                sheet_range: "A:G".to_string(),
                sheets_base_url: "https://sheets.googleapis.com/v4".to_string(),
                drive_base_url: "https://www.googleapis.com/drive/v3".to_string(),
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("huntbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Sheet and channel placement derived from the `discord` and `google`
    /// sections.
    pub fn directory_layout(&self) -> Result<DirectoryLayout, ConfigError> {
        let record_range = parse_sheet_range(&self.google.sheet_range)?;
        Ok(DirectoryLayout::new(
            record_range,
            self.discord.puzzle_category_id.clone(),
            self.discord.solved_category_id.clone(),
            self.google.hunt_folder_id.clone(),
        ))
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(discord) = patch.discord {
            if let Some(discord_bot_token_value) = discord.bot_token {
                self.discord.bot_token = secret_value(discord_bot_token_value);
            }
            if let Some(guild_id) = discord.guild_id {
                self.discord.guild_id = guild_id;
            }
            if let Some(puzzle_category_id) = discord.puzzle_category_id {
                self.discord.puzzle_category_id = puzzle_category_id;
            }
            if let Some(solved_category_id) = discord.solved_category_id {
                self.discord.solved_category_id = solved_category_id;
            }
            if let Some(voice_category_id) = discord.voice_category_id {
                self.discord.voice_category_id = Some(voice_category_id);
            }
            if let Some(command_prefix) = discord.command_prefix {
                self.discord.command_prefix = command_prefix;
            }
            if let Some(api_base_url) = discord.api_base_url {
                self.discord.api_base_url = api_base_url;
            }
        }

        if let Some(google) = patch.google {
            if let Some(google_access_token_value) = google.access_token {
                self.google.access_token = secret_value(google_access_token_value);
            }
            if let Some(puzzle_sheet_id) = google.puzzle_sheet_id {
                self.google.puzzle_sheet_id = puzzle_sheet_id;
            }
            if let Some(hunt_folder_id) = google.hunt_folder_id {
                self.google.hunt_folder_id = hunt_folder_id;
            }
            if let Some(sheet_range) = google.sheet_range {
                self.google.sheet_range = sheet_range;
            }
            if let Some(sheets_base_url) = google.sheets_base_url {
                self.google.sheets_base_url = sheets_base_url;
            }
            if let Some(drive_base_url) = google.drive_base_url {
                self.google.drive_base_url = drive_base_url;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("HUNTBOT_DISCORD_BOT_TOKEN") {
            self.discord.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("HUNTBOT_DISCORD_GUILD_ID") {
            self.discord.guild_id = value;
        }
        if let Some(value) = read_env("HUNTBOT_DISCORD_PUZZLE_CATEGORY_ID") {
            self.discord.puzzle_category_id = value;
        }
        if let Some(value) = read_env("HUNTBOT_DISCORD_SOLVED_CATEGORY_ID") {
            self.discord.solved_category_id = value;
        }
        if let Some(value) = read_env("HUNTBOT_DISCORD_VOICE_CATEGORY_ID") {
            self.discord.voice_category_id = Some(value);
        }
        if let Some(value) = read_env("HUNTBOT_DISCORD_COMMAND_PREFIX") {
            self.discord.command_prefix = value;
        }
        if let Some(value) = read_env("HUNTBOT_DISCORD_API_BASE_URL") {
            self.discord.api_base_url = value;
        }

        if let Some(value) = read_env("HUNTBOT_GOOGLE_ACCESS_TOKEN") {
            self.google.access_token = secret_value(value);
        }
        if let Some(value) = read_env("HUNTBOT_GOOGLE_PUZZLE_SHEET_ID") {
            self.google.puzzle_sheet_id = value;
        }
        if let Some(value) = read_env("HUNTBOT_GOOGLE_HUNT_FOLDER_ID") {
            self.google.hunt_folder_id = value;
        }
        if let Some(value) = read_env("HUNTBOT_GOOGLE_SHEET_RANGE") {
            self.google.sheet_range = value;
        }
        if let Some(value) = read_env("HUNTBOT_GOOGLE_SHEETS_BASE_URL") {
            self.google.sheets_base_url = value;
        }
        if let Some(value) = read_env("HUNTBOT_GOOGLE_DRIVE_BASE_URL") {
            self.google.drive_base_url = value;
        }

        if let Some(value) = read_env("HUNTBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("HUNTBOT_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("HUNTBOT_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("HUNTBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("HUNTBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("HUNTBOT_LOGGING_LEVEL").or_else(|| read_env("HUNTBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("HUNTBOT_LOGGING_FORMAT").or_else(|| read_env("HUNTBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(discord_bot_token) = overrides.discord_bot_token {
            self.discord.bot_token = secret_value(discord_bot_token);
        }
        if let Some(google_access_token) = overrides.google_access_token {
            self.google.access_token = secret_value(google_access_token);
        }
        if let Some(puzzle_sheet_id) = overrides.puzzle_sheet_id {
            self.google.puzzle_sheet_id = puzzle_sheet_id;
        }
        if let Some(health_check_port) = overrides.health_check_port {
            self.server.health_check_port = health_check_port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_discord(&self.discord)?;
        validate_google(&self.google)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("huntbot.toml"), PathBuf::from("config/huntbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_discord(discord: &DiscordConfig) -> Result<(), ConfigError> {
    if discord.bot_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "discord.bot_token is required. Get it from \
             https://discord.com/developers/applications > Your App > Bot"
                .to_string(),
        ));
    }

    validate_snowflake("discord.guild_id", &discord.guild_id)?;
    validate_snowflake("discord.puzzle_category_id", &discord.puzzle_category_id)?;
    validate_snowflake("discord.solved_category_id", &discord.solved_category_id)?;
    if let Some(voice_category_id) = &discord.voice_category_id {
        validate_snowflake("discord.voice_category_id", voice_category_id)?;
    }

    if discord.command_prefix.trim().is_empty() || discord.command_prefix.contains(' ') {
        return Err(ConfigError::Validation(
            "discord.command_prefix must be non-empty and contain no spaces".to_string(),
        ));
    }

    validate_base_url("discord.api_base_url", &discord.api_base_url)
}

fn validate_google(google: &GoogleConfig) -> Result<(), ConfigError> {
    if google.access_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "google.access_token is required (an OAuth access token with Sheets and Drive scopes)"
                .to_string(),
        ));
    }
    if google.puzzle_sheet_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "google.puzzle_sheet_id is required (the id in the puzzle list spreadsheet URL)"
                .to_string(),
        ));
    }
    if google.hunt_folder_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "google.hunt_folder_id is required (the Drive folder new documents are created in)"
                .to_string(),
        ));
    }

    parse_sheet_range(&google.sheet_range)?;
    validate_base_url("google.sheets_base_url", &google.sheets_base_url)?;
    validate_base_url("google.drive_base_url", &google.drive_base_url)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_snowflake(key: &str, value: &str) -> Result<(), ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Validation(format!(
            "{key} is required. Enable developer mode in Discord and use Copy ID"
        )));
    }
    if value.parse::<u64>().is_err() {
        return Err(ConfigError::Validation(format!(
            "{key} must be a numeric Discord id, got `{value}`"
        )));
    }
    Ok(())
}

fn validate_base_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{key} must start with http:// or https://"
        )));
    }
    Ok(())
}

fn parse_sheet_range(value: &str) -> Result<A1Range, ConfigError> {
    let range = value.parse::<A1Range>().map_err(|error| {
        ConfigError::Validation(format!("google.sheet_range `{value}` is invalid: {error}"))
    })?;
    if range.width() != COLUMN_COUNT {
        return Err(ConfigError::Validation(format!(
            "google.sheet_range must span {COLUMN_COUNT} columns like `A:G`, got `{value}`"
        )));
    }
    Ok(range)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    discord: Option<DiscordPatch>,
    google: Option<GooglePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscordPatch {
    bot_token: Option<String>,
    guild_id: Option<String>,
    puzzle_category_id: Option<String>,
    solved_category_id: Option<String>,
    voice_category_id: Option<String>,
    command_prefix: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GooglePatch {
    access_token: Option<String>,
    puzzle_sheet_id: Option<String>,
    hunt_folder_id: Option<String>,
    sheet_range: Option<String>,
    sheets_base_url: Option<String>,
    drive_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
