//! Supabase backend
//!
//! Tables are reached through PostgREST at `{url}/rest/v1/{table}` with the
//! service role key; tokens are checked against Supabase Auth at
//! `{url}/auth/v1/user`.

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tat_common::analysis::AnalysisResult;
use tat_common::session::{
    NewSession, PatternPoint, Profile, ProfileUpdate, Role, Session, SessionSummary, SessionType,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{SessionStore, StoreError};
use crate::api::auth::{AuthUser, TokenVerifier};

const SUMMARY_COLUMNS: &str =
    "id,created_at,session_type,helpful_thought_ratio,average_attribution_quality,total_segments";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Session row as PostgREST returns it (nullable columns stay optional)
#[derive(Debug, Deserialize)]
struct SessionRow {
    id: Uuid,
    player_id: Uuid,
    created_at: DateTime<Utc>,
    session_type: Option<SessionType>,
    #[serde(default)]
    raw_transcript: Option<String>,
    analysis_json: Value,
    helpful_thought_ratio: Option<String>,
    average_attribution_quality: Option<f64>,
    total_segments: Option<u32>,
}

impl SessionRow {
    fn into_session(self) -> Result<Session, StoreError> {
        let analysis_json: AnalysisResult = serde_json::from_value(self.analysis_json)
            .map_err(|e| StoreError::Corrupt(format!("session {} analysis_json: {}", self.id, e)))?;

        Ok(Session {
            id: self.id,
            player_id: self.player_id,
            created_at: self.created_at,
            session_type: self.session_type.unwrap_or_default(),
            raw_transcript: self.raw_transcript.unwrap_or_default(),
            analysis_json,
            helpful_thought_ratio: self.helpful_thought_ratio,
            average_attribution_quality: self.average_attribution_quality,
            total_segments: self.total_segments.unwrap_or(0),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SummaryRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    session_type: Option<SessionType>,
    helpful_thought_ratio: Option<String>,
    average_attribution_quality: Option<f64>,
    total_segments: Option<u32>,
}

impl From<SummaryRow> for SessionSummary {
    fn from(row: SummaryRow) -> Self {
        SessionSummary {
            id: row.id,
            created_at: row.created_at,
            session_type: row.session_type.unwrap_or_default(),
            helpful_thought_ratio: row.helpful_thought_ratio,
            average_attribution_quality: row.average_attribution_quality,
            total_segments: row.total_segments.unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    id: Uuid,
    full_name: Option<String>,
    role: Option<Role>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            id: row.id,
            full_name: row.full_name,
            role: row.role.unwrap_or_default(),
            updated_at: row.updated_at,
        }
    }
}

/// Supabase REST and Auth client
pub struct SupabaseClient {
    http_client: reqwest::Client,
    url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(url: &str, service_key: &str) -> Result<Self, StoreError> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            url: url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.url, table)
    }

    /// Attach service role credentials
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn read_rows<T: DeserializeOwned>(response: Response) -> Result<Vec<T>, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    async fn insert_patterns(&self, session: &Session, new_session: &NewSession) {
        let rows: Vec<Value> = new_session
            .patterns()
            .into_iter()
            .map(|p| {
                json!({
                    "session_id": session.id,
                    "player_id": session.player_id,
                    "pattern_type": p.pattern_type,
                    "helpfulness_score": p.helpfulness_score,
                    "quote": p.quote,
                    "explanation": p.explanation,
                    "intensity": p.intensity,
                    "focus_direction": p.focus_direction,
                    "has_attribution": p.has_attribution,
                    "attribution_quality_score": p.attribution_quality_score,
                })
            })
            .collect();

        if rows.is_empty() {
            return;
        }

        let result = self
            .authorized(self.http_client.post(self.table_url("patterns")))
            .json(&rows)
            .send()
            .await;

        // The session row already exists; a pattern failure only loses trend data
        match result {
            Ok(response) if response.status().is_success() => {
                debug!(session_id = %session.id, count = rows.len(), "Patterns saved");
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!(session_id = %session.id, %status, body = %body, "Error saving patterns");
            }
            Err(e) => warn!(session_id = %session.id, error = %e, "Error saving patterns"),
        }
    }
}

fn single<T>(mut rows: Vec<T>) -> Option<T> {
    if rows.is_empty() {
        None
    } else {
        Some(rows.swap_remove(0))
    }
}

#[axum::async_trait]
impl SessionStore for SupabaseClient {
    fn backend_name(&self) -> &'static str {
        "supabase"
    }

    async fn save_session(&self, new_session: NewSession) -> Result<Session, StoreError> {
        let body = json!({
            "player_id": new_session.player_id,
            "session_type": new_session.session_type.as_str(),
            "raw_transcript": new_session.raw_transcript,
            "analysis_json": new_session.analysis,
            "helpful_thought_ratio": new_session.helpful_thought_ratio(),
            "average_attribution_quality": new_session.average_attribution_quality(),
            "total_segments": new_session.total_segments(),
        });

        let response = self
            .authorized(self.http_client.post(self.table_url("sessions")))
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;

        let row: SessionRow = single(Self::read_rows(response).await?).ok_or_else(|| {
            StoreError::Corrupt("insert returned no session row".to_string())
        })?;
        let session = row.into_session()?;

        self.insert_patterns(&session, &new_session).await;

        info!(
            session_id = %session.id,
            segments = session.analysis_json.segments.len(),
            "Session saved"
        );
        Ok(session)
    }

    async fn list_sessions(
        &self,
        player_id: Uuid,
        limit: u32,
    ) -> Result<Vec<SessionSummary>, StoreError> {
        let response = self
            .authorized(self.http_client.get(self.table_url("sessions")))
            .query(&[
                ("select", SUMMARY_COLUMNS.to_string()),
                ("player_id", format!("eq.{}", player_id)),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;

        let rows: Vec<SummaryRow> = Self::read_rows(response).await?;
        Ok(rows.into_iter().map(SessionSummary::from).collect())
    }

    async fn get_session(
        &self,
        id: Uuid,
        player_id: Uuid,
    ) -> Result<Option<Session>, StoreError> {
        let response = self
            .authorized(self.http_client.get(self.table_url("sessions")))
            .query(&[
                ("select", "*".to_string()),
                ("id", format!("eq.{}", id)),
                ("player_id", format!("eq.{}", player_id)),
            ])
            .send()
            .await?;

        let rows: Vec<SessionRow> = Self::read_rows(response).await?;
        single(rows).map(SessionRow::into_session).transpose()
    }

    async fn pattern_points(
        &self,
        player_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<PatternPoint>, StoreError> {
        let response = self
            .authorized(self.http_client.get(self.table_url("patterns")))
            .query(&[
                ("select", "pattern_type,helpfulness_score,created_at".to_string()),
                ("player_id", format!("eq.{}", player_id)),
                (
                    "created_at",
                    format!("gte.{}", since.to_rfc3339_opts(SecondsFormat::Millis, true)),
                ),
                ("order", "created_at.asc".to_string()),
            ])
            .send()
            .await?;

        Self::read_rows(response).await
    }

    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        let response = self
            .authorized(self.http_client.get(self.table_url("profiles")))
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", id))])
            .send()
            .await?;

        let rows: Vec<ProfileRow> = Self::read_rows(response).await?;
        Ok(single(rows).map(Profile::from))
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Option<Profile>, StoreError> {
        let response = self
            .authorized(self.http_client.patch(self.table_url("profiles")))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(&json!({
                "full_name": update.full_name.trim(),
                "updated_at": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            }))
            .send()
            .await?;

        let rows: Vec<ProfileRow> = Self::read_rows(response).await?;
        Ok(single(rows).map(Profile::from))
    }
}

#[axum::async_trait]
impl TokenVerifier for SupabaseClient {
    async fn verify(&self, token: &str) -> Option<AuthUser> {
        let result = self
            .http_client
            .get(format!("{}/auth/v1/user", self.url))
            .header("apikey", &self.service_key)
            .bearer_auth(token)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Token verification request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(status = %response.status(), "Token rejected");
            return None;
        }

        match response.json::<AuthUser>().await {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Unreadable auth user response");
                None
            }
        }
    }
}
