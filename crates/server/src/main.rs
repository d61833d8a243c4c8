mod bootstrap;
mod health;

use std::time::Duration;

use anyhow::Result;
use huntbot_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use huntbot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let bootstrap::Application { config, directory, gateway } =
        bootstrap::bootstrap_with_config(config).await?;

    health::spawn(&config.server.bind_address, config.server.health_check_port, directory).await?;

    let gateway = tokio::spawn(async move {
        if let Err(error) = gateway.start().await {
            tracing::error!(
                event_name = "system.gateway.error",
                correlation_id = "gateway",
                error = %error,
                "gateway runner stopped with an error"
            );
        }
    });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "huntbot-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "huntbot-server stopping"
    );

    let grace = Duration::from_secs(config.server.graceful_shutdown_secs);
    if tokio::time::timeout(grace, gateway).await.is_err() {
        tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            grace_secs = grace.as_secs(),
            "gateway did not stop within the grace period"
        );
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
