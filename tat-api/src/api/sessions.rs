//! Saved sessions, pattern trends and the caller's profile
//!
//! Every handler here requires a bearer token and only touches rows owned
//! by the authenticated user.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tat_common::analysis::AnalysisResult;
use tat_common::session::{NewSession, ProfileUpdate, SessionType};
use tracing::info;
use uuid::Uuid;

use super::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::store::SessionStore;
use crate::AppState;

pub const DEFAULT_LIST_LIMIT: u32 = 10;
pub const MAX_LIST_LIMIT: u32 = 100;
pub const DEFAULT_TREND_DAYS: u32 = 30;
pub const MAX_TREND_DAYS: u32 = 365;

#[derive(Debug, Deserialize)]
pub struct SaveSessionRequest {
    #[serde(default, alias = "raw_transcript")]
    pub transcript: Option<String>,
    #[serde(default, alias = "analysis_json")]
    pub analysis: Option<AnalysisResult>,
    #[serde(default)]
    pub session_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrendQuery {
    pub days: Option<u32>,
}

fn session_store(state: &AppState) -> ApiResult<&Arc<dyn SessionStore>> {
    state.sessions.as_ref().ok_or_else(|| {
        ApiError::Unavailable(
            "Session storage is not configured. Set SUPABASE_URL and SUPABASE_SERVICE_KEY, or SESSION_STORE=sqlite."
                .into(),
        )
    })
}

/// POST /api/sessions
pub async fn save_session(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<SaveSessionRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(request) = body?;

    let analysis = request
        .analysis
        .ok_or_else(|| ApiError::BadRequest("Analysis data is required.".into()))?;

    let session_type = match request.session_type.as_deref().map(str::trim) {
        None | Some("") => SessionType::default(),
        Some(name) => name.parse::<SessionType>()?,
    };

    let store = session_store(&state)?;
    let session = store
        .save_session(NewSession {
            player_id: user.id,
            session_type,
            raw_transcript: request.transcript.unwrap_or_default(),
            analysis,
        })
        .await?;

    info!(player_id = %user.id, session_id = %session.id, "Session created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": session,
        })),
    ))
}

/// GET /api/sessions?limit=N
pub async fn list_sessions(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let sessions = session_store(&state)?.list_sessions(user.id, limit).await?;
    Ok(Json(json!({
        "success": true,
        "data": sessions,
    })))
}

/// GET /api/sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    user: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let Path(id) = id?;

    let session = session_store(&state)?
        .get_session(id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Session not found".into()))?;

    Ok(Json(json!({
        "success": true,
        "data": session,
    })))
}

/// GET /api/trends?days=N
pub async fn get_trends(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<TrendQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query?;
    let days = query
        .days
        .unwrap_or(DEFAULT_TREND_DAYS)
        .clamp(1, MAX_TREND_DAYS);

    let trends = session_store(&state)?.pattern_trends(user.id, days).await?;
    Ok(Json(json!({
        "success": true,
        "days": days,
        "data": trends,
    })))
}

/// GET /api/profile
pub async fn get_profile(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Value>> {
    let profile = session_store(&state)?
        .get_profile(user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".into()))?;

    Ok(Json(json!({
        "success": true,
        "data": profile,
    })))
}

/// PUT /api/profile
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<ProfileUpdate>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(update) = body?;
    update.validate()?;

    let profile = session_store(&state)?
        .update_profile(user.id, &update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".into()))?;

    info!(player_id = %user.id, "Profile updated");
    Ok(Json(json!({
        "success": true,
        "data": profile,
    })))
}

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sessions", get(list_sessions).post(save_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/trends", get(get_trends))
        .route("/api/profile", get(get_profile).put(update_profile))
}
