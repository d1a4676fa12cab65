//! HTTP API handlers for tat-api

pub mod analyze;
pub mod auth;
pub mod emotions;
pub mod health;
pub mod sessions;
pub mod transcribe;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub use analyze::analyze_routes;
pub use auth::{AuthUser, TokenVerifier};
pub use emotions::emotion_routes;
pub use health::health_routes;
pub use sessions::session_routes;
pub use transcribe::transcribe_routes;

/// Fallback for unmatched paths when no static directory is served
pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "error": "Route not found",
        })),
    )
        .into_response()
}
