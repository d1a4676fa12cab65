//! Session storage
//!
//! [`SessionStore`] is implemented by the hosted Supabase backend
//! (PostgREST over HTTPS) and by a local SQLite database.

pub mod sqlite;
pub mod supabase;

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tat_common::session::{
    aggregate_trends, NewSession, PatternPoint, PatternTrend, Profile, ProfileUpdate, Session,
    SessionSummary,
};
use thiserror::Error;
use uuid::Uuid;

pub use sqlite::SqliteStore;
pub use supabase::SupabaseClient;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistence for sessions, patterns and profiles
///
/// All reads are scoped to the owning player.
#[axum::async_trait]
pub trait SessionStore: Send + Sync {
    /// Short backend name for logs and health output
    fn backend_name(&self) -> &'static str;

    /// Insert a session and its derived pattern rows
    async fn save_session(&self, session: NewSession) -> Result<Session, StoreError>;

    /// Newest first
    async fn list_sessions(
        &self,
        player_id: Uuid,
        limit: u32,
    ) -> Result<Vec<SessionSummary>, StoreError>;

    async fn get_session(&self, id: Uuid, player_id: Uuid)
        -> Result<Option<Session>, StoreError>;

    /// Pattern rows created at or after `since`, oldest first
    async fn pattern_points(
        &self,
        player_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<PatternPoint>, StoreError>;

    /// Per pattern type trends over the last `days` days
    async fn pattern_trends(
        &self,
        player_id: Uuid,
        days: u32,
    ) -> Result<BTreeMap<String, PatternTrend>, StoreError> {
        let since = Utc::now() - Duration::days(i64::from(days));
        let points = self.pattern_points(player_id, since).await?;
        Ok(aggregate_trends(&points))
    }

    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError>;

    /// None when the backend has no profile row to update
    async fn update_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Option<Profile>, StoreError>;
}
