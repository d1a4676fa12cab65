//! Emotional Tennis Framework endpoints
//!
//! Pure table lookups, no external calls.

use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tat_common::emotions::{analyze_trajectory, detect_emotions, framework_config, Language, Statement};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrajectoryRequest {
    /// Anything other than an array is rejected below
    #[serde(default)]
    pub statements: Option<Value>,
    #[serde(default)]
    pub language: Option<String>,
}

/// GET /api/emotions
pub async fn get_framework() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": framework_config(),
    }))
}

/// POST /api/detect-emotions
pub async fn detect(body: Result<Json<DetectRequest>, JsonRejection>) -> ApiResult<Json<Value>> {
    let Json(request) = body?;

    let text = request
        .text
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No text provided for emotion detection.".into()))?;

    let detection = detect_emotions(&text, Language::from_code(request.language.as_deref()));
    Ok(Json(json!({
        "success": true,
        "data": detection,
    })))
}

/// POST /api/analyze-emotional-trajectory
pub async fn trajectory(
    body: Result<Json<TrajectoryRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = body?;

    let statements = match request.statements {
        Some(value @ Value::Array(_)) => serde_json::from_value::<Vec<Statement>>(value)
            .map_err(|e| ApiError::BadRequest(format!("Invalid statements: {}", e)))?,
        _ => {
            return Err(ApiError::BadRequest(
                "No statements array provided for trajectory analysis.".into(),
            ))
        }
    };

    let result = analyze_trajectory(&statements, Language::from_code(request.language.as_deref()));
    Ok(Json(json!({
        "success": true,
        "data": result,
    })))
}

pub fn emotion_routes() -> Router<AppState> {
    Router::new()
        .route("/api/emotions", get(get_framework))
        .route("/api/detect-emotions", post(detect))
        .route("/api/analyze-emotional-trajectory", post(trajectory))
}
