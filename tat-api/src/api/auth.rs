//! Bearer token authentication
//!
//! Protected handlers take an [`AuthUser`] argument. Tokens are checked by
//! the configured [`TokenVerifier`] (Supabase Auth in production).

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Resolves a bearer token to a user
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// None when the token is unknown, expired or cannot be checked
    async fn verify(&self, token: &str) -> Option<AuthUser>;
}

/// Token from an `Authorization` header value
fn bearer_token(header: Option<&str>) -> Result<&str, ApiError> {
    let token = header
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Authentication required. Please sign in.".into()))?;

    let token = token.trim();
    if token.is_empty() {
        return Err(ApiError::Unauthorized("Invalid authorization format".into()));
    }
    Ok(token)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let token = bearer_token(header)?;

        let verifier = state.auth.as_ref().ok_or_else(|| {
            ApiError::Unavailable(
                "Authentication is not configured. Set SUPABASE_URL and SUPABASE_SERVICE_KEY."
                    .into(),
            )
        })?;

        verifier.verify(token).await.ok_or_else(|| {
            ApiError::Unauthorized("Invalid or expired token. Please sign in again.".into())
        })
    }
}
