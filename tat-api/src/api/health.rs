//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Which integrations are usable with the current configuration
#[derive(Debug, Serialize)]
pub struct Integrations {
    pub openai: bool,
    pub claude: bool,
    /// Backend name, or null when sessions are unavailable
    pub storage: Option<&'static str>,
    pub auth: bool,
    pub audio_splitting: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_seconds: i64,
    pub integrations: Integrations,
}

/// GET /api/health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let now = Utc::now();

    Json(HealthResponse {
        status: "OK",
        timestamp: now.to_rfc3339(),
        service: "Tennis Attribution Trainer",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: (now - state.startup_time).num_seconds(),
        integrations: Integrations {
            openai: state.transcription.is_some(),
            claude: state.attribution.is_some(),
            storage: state.sessions.as_ref().map(|s| s.backend_name()),
            auth: state.auth.is_some(),
            audio_splitting: state
                .transcription
                .as_ref()
                .map_or(false, |t| t.can_split()),
        },
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/api/health", get(health_check))
}
