use std::path::Path;
use std::sync::Arc;

use huntbot_core::backend::ChannelKind;
use huntbot_core::config::{AppConfig, LoadOptions};
use huntbot_core::directory::PuzzleDirectory;
use huntbot_discord::DiscordRest;
use huntbot_google::{GoogleDriveDocuments, GoogleSheetsStore};
use serde::Serialize;

use super::CommandResult;

const EXIT_CHECKS_FAILED: u8 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(config_path: Option<&Path>, json_output: bool) -> CommandResult {
    let report = build_report(config_path);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { EXIT_CHECKS_FAILED };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\
                 \"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(config_path: Option<&Path>) -> DoctorReport {
    let mut checks = Vec::new();
    let options =
        LoadOptions { config_path: config_path.map(Path::to_path_buf), ..LoadOptions::default() };

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck::pass(
                "config_validation",
                "configuration loaded and validated",
            ));
            checks.extend(check_collaborators(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            let reason = "configuration did not load";
            checks.push(DoctorCheck::skipped("sheet_connectivity", reason));
            checks.push(DoctorCheck::skipped("category_readiness", reason));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_collaborators(config: &AppConfig) -> Vec<DoctorCheck> {
    let directory = match build_directory(config) {
        Ok(directory) => directory,
        Err(error) => {
            return vec![
                DoctorCheck::fail("sheet_connectivity", error.clone()),
                DoctorCheck::fail("category_readiness", error),
            ];
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            let details = format!("failed to initialize async runtime: {error}");
            return vec![
                DoctorCheck::fail("sheet_connectivity", details.clone()),
                DoctorCheck::fail("category_readiness", details),
            ];
        }
    };

    runtime.block_on(async {
        vec![check_sheet(&directory, config).await, check_categories(&directory, config).await]
    })
}

fn build_directory(config: &AppConfig) -> Result<PuzzleDirectory, String> {
    let layout = config.directory_layout().map_err(|error| error.to_string())?;
    let store = GoogleSheetsStore::new(
        &config.google.sheets_base_url,
        config.google.access_token.clone(),
        config.google.puzzle_sheet_id.clone(),
        layout.record_range.clone(),
    )
    .map_err(|error| error.to_string())?;
    let documents =
        GoogleDriveDocuments::new(&config.google.drive_base_url, config.google.access_token.clone())
            .map_err(|error| error.to_string())?;
    let channels = DiscordRest::new(
        &config.discord.api_base_url,
        config.discord.bot_token.clone(),
        &config.discord.guild_id,
    )
    .map_err(|error| error.to_string())?;

    Ok(PuzzleDirectory::new(Arc::new(store), Arc::new(documents), Arc::new(channels), layout))
}

async fn check_sheet(directory: &PuzzleDirectory, config: &AppConfig) -> DoctorCheck {
    match directory.probe().await {
        Ok(()) => DoctorCheck::pass(
            "sheet_connectivity",
            format!("read the header row of sheet `{}`", config.google.puzzle_sheet_id),
        ),
        Err(error) => DoctorCheck::fail("sheet_connectivity", error.to_string()),
    }
}

async fn check_categories(directory: &PuzzleDirectory, config: &AppConfig) -> DoctorCheck {
    let discord = &config.discord;
    let mut categories = vec![
        ("discord.puzzle_category_id", discord.puzzle_category_id.as_str()),
        ("discord.solved_category_id", discord.solved_category_id.as_str()),
    ];
    if let Some(voice_category_id) = discord.voice_category_id.as_deref() {
        categories.push(("discord.voice_category_id", voice_category_id));
    }

    let mut problems = Vec::new();
    for (setting, channel_id) in &categories {
        match directory.channels().get_channel(channel_id).await {
            Ok(channel) if channel.kind == ChannelKind::Category => {}
            Ok(_) => problems.push(format!("`{setting}` ({channel_id}) is not a category")),
            Err(error) => problems.push(format!("`{setting}` ({channel_id}): {error}")),
        }
    }

    if problems.is_empty() {
        DoctorCheck::pass(
            "category_readiness",
            format!("{} configured categories resolved", categories.len()),
        )
    } else {
        DoctorCheck::fail("category_readiness", problems.join("; "))
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::{render_human, CheckStatus, DoctorCheck, DoctorReport};

    #[test]
    fn human_report_marks_each_check() {
        let report = DoctorReport {
            overall_status: CheckStatus::Fail,
            summary: "doctor: one or more readiness checks failed".to_string(),
            checks: vec![
                DoctorCheck::pass("config_validation", "configuration loaded and validated"),
                DoctorCheck::fail("sheet_connectivity", "403 forbidden"),
                DoctorCheck::skipped("category_readiness", "the sheet was unreachable"),
            ],
        };

        assert_eq!(
            render_human(&report),
            "doctor: one or more readiness checks failed\n\
             - [ok] config_validation: configuration loaded and validated\n\
             - [fail] sheet_connectivity: 403 forbidden\n\
             - [skip] category_readiness: skipped because the sheet was unreachable"
        );
    }
}
