//! Attribution analysis, reframe scoring and the demo analysis

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::services::sample::sample_analysis;
use crate::services::AttributionService;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub transcription: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReframeRequest {
    #[serde(default)]
    pub original_quote: Option<String>,
    #[serde(default)]
    pub player_reframe: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

fn attribution_service(state: &AppState) -> ApiResult<&Arc<AttributionService>> {
    state.attribution.as_ref().ok_or(ApiError::MissingApiKey {
        service: "Claude",
        var: "CLAUDE_API_KEY",
    })
}

/// Non-blank trimmed value
fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// POST /api/analyze
pub async fn analyze_transcription(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = body?;

    let transcription = present(request.transcription.as_deref())
        .ok_or_else(|| ApiError::BadRequest("No transcription provided for analysis.".into()))?;

    let service = attribution_service(&state)?;

    let length = transcription.chars().count();
    info!(
        "Processing transcription for attribution analysis ({} characters)",
        length
    );

    let outcome = service.analyze(transcription).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Attribution analysis completed successfully",
        "metadata": {
            "transcription_length": length,
            "analysis_timestamp": Utc::now().to_rfc3339(),
            "segments_found": outcome.result.segments.len(),
            "chunks_processed": outcome.chunks_processed,
            "chunks_total": outcome.chunks_total,
            "model": service.model(),
        },
        "data": outcome.result,
    })))
}

/// POST /api/score-reframe
///
/// Always answers 200 once the request is valid; scoring problems produce
/// a neutral fallback score.
pub async fn score_reframe(
    State(state): State<AppState>,
    body: Result<Json<ReframeRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = body?;

    let (Some(original), Some(reframe)) = (
        present(request.original_quote.as_deref()),
        present(request.player_reframe.as_deref()),
    ) else {
        return Err(ApiError::BadRequest(
            "Original quote and player reframe are required.".into(),
        ));
    };

    let service = attribution_service(&state)?;

    info!("Scoring reframe: \"{}\" -> \"{}\"", original, reframe);
    let context = request.context.as_deref().unwrap_or_default();
    let score = service.score_reframe(original, reframe, context).await;

    Ok(Json(json!({
        "success": true,
        "feedback": score.feedback,
        "improvements": score.improvements,
        "score": score,
    })))
}

/// GET /api/sample-analysis
pub async fn get_sample_analysis() -> ApiResult<Json<Value>> {
    let sample = sample_analysis().map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(json!({
        "success": true,
        "data": sample,
    })))
}

pub fn analyze_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analyze", post(analyze_transcription))
        .route("/api/score-reframe", post(score_reframe))
        .route("/api/sample-analysis", get(get_sample_analysis))
}
