use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use huntbot_core::directory::PuzzleDirectory;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    directory: Arc<PuzzleDirectory>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CacheCounts {
    pub rounds: usize,
    pub names: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub sheet: HealthCheck,
    pub cache: CacheCounts,
    pub checked_at: String,
}

pub fn router(directory: Arc<PuzzleDirectory>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { directory })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    directory: Arc<PuzzleDirectory>,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(directory)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let sheet = sheet_check(&state.directory).await;
    let ready = sheet.status == "ready";
    let (rounds, names) = state.directory.cache_counts().await;

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "huntbot-server runtime initialized".to_string(),
        },
        sheet,
        cache: CacheCounts { rounds, names },
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn sheet_check(directory: &PuzzleDirectory) -> HealthCheck {
    match directory.probe().await {
        Ok(()) => HealthCheck { status: "ready", detail: "sheet read succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("sheet read failed: {error}") }
        }
    }
}
