//! Local SQLite session store
//!
//! Ids are stored as TEXT UUIDs and timestamps as fixed-width RFC 3339
//! strings (microseconds, `Z`), so string comparison orders by time.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use tat_common::analysis::AnalysisResult;
use tat_common::session::{
    NewSession, PatternPoint, PatternRecord, Profile, ProfileUpdate, Role, Session,
    SessionSummary, SessionType,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{SessionStore, StoreError};

pub struct SqliteStore {
    pool: SqlitePool,
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{}': {}", value, e)))
}

fn parse_uuid(value: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(value).map_err(|e| StoreError::Corrupt(format!("bad id '{}': {}", value, e)))
}

fn parse_session_type(value: &str) -> Result<SessionType, StoreError> {
    value
        .parse()
        .map_err(|e: tat_common::Error| StoreError::Corrupt(e.to_string()))
}

impl SqliteStore {
    /// Open (creating if needed) the database file and its tables
    pub async fn connect(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        debug!("Connecting to database: {}", db_url);

        let pool = SqlitePool::connect(&db_url).await?;
        init_tables(&pool).await?;
        Ok(Self { pool })
    }

    /// Private in-memory database
    pub async fn in_memory() -> Result<Self, StoreError> {
        // A single long-lived connection keeps the memory database alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        init_tables(&pool).await?;
        Ok(Self { pool })
    }

    /// Insert all pattern rows of one session in a single transaction
    async fn insert_patterns(
        &self,
        session_id: &str,
        player_id: &str,
        created_at: &str,
        patterns: &[PatternRecord],
    ) -> Result<(), sqlx::Error> {
        if patterns.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for pattern in patterns {
            sqlx::query(
                r#"
                INSERT INTO patterns (
                    session_id, player_id, pattern_type, helpfulness_score, quote,
                    explanation, intensity, focus_direction, has_attribution,
                    attribution_quality_score, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(session_id)
            .bind(player_id)
            .bind(&pattern.pattern_type)
            .bind(pattern.helpfulness_score)
            .bind(&pattern.quote)
            .bind(&pattern.explanation)
            .bind(&pattern.intensity)
            .bind(&pattern.focus_direction)
            .bind(pattern.has_attribution)
            .bind(pattern.attribution_quality_score)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await
    }
}

async fn init_tables(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            player_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            session_type TEXT NOT NULL,
            raw_transcript TEXT NOT NULL,
            analysis_json TEXT NOT NULL,
            helpful_thought_ratio TEXT,
            average_attribution_quality REAL,
            total_segments INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS patterns (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL REFERENCES sessions(id),
            player_id TEXT NOT NULL,
            pattern_type TEXT NOT NULL,
            helpfulness_score REAL,
            quote TEXT NOT NULL DEFAULT '',
            explanation TEXT NOT NULL DEFAULT '',
            intensity TEXT NOT NULL DEFAULT '',
            focus_direction TEXT,
            has_attribution INTEGER NOT NULL DEFAULT 0,
            attribution_quality_score REAL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            full_name TEXT,
            role TEXT NOT NULL DEFAULT 'player',
            updated_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_sessions_player_created ON sessions(player_id, created_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_patterns_player_created ON patterns(player_id, created_at)",
    )
    .execute(pool)
    .await?;

    info!("Database tables initialized (sessions, patterns, profiles)");
    Ok(())
}

fn session_from_row(row: &SqliteRow) -> Result<Session, StoreError> {
    let analysis: String = row.try_get("analysis_json")?;
    let analysis_json: AnalysisResult = serde_json::from_str(&analysis)
        .map_err(|e| StoreError::Corrupt(format!("analysis_json: {}", e)))?;

    Ok(Session {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        player_id: parse_uuid(&row.try_get::<String, _>("player_id")?)?,
        created_at: parse_time(&row.try_get::<String, _>("created_at")?)?,
        session_type: parse_session_type(&row.try_get::<String, _>("session_type")?)?,
        raw_transcript: row.try_get("raw_transcript")?,
        analysis_json,
        helpful_thought_ratio: row.try_get("helpful_thought_ratio")?,
        average_attribution_quality: row.try_get("average_attribution_quality")?,
        total_segments: row.try_get::<i64, _>("total_segments")? as u32,
    })
}

fn summary_from_row(row: &SqliteRow) -> Result<SessionSummary, StoreError> {
    Ok(SessionSummary {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        created_at: parse_time(&row.try_get::<String, _>("created_at")?)?,
        session_type: parse_session_type(&row.try_get::<String, _>("session_type")?)?,
        helpful_thought_ratio: row.try_get("helpful_thought_ratio")?,
        average_attribution_quality: row.try_get("average_attribution_quality")?,
        total_segments: row.try_get::<i64, _>("total_segments")? as u32,
    })
}

fn profile_from_row(row: &SqliteRow) -> Result<Profile, StoreError> {
    let role: String = row.try_get("role")?;
    let updated_at: Option<String> = row.try_get("updated_at")?;

    Ok(Profile {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        full_name: row.try_get("full_name")?,
        role: role
            .parse::<Role>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        updated_at: updated_at.as_deref().map(parse_time).transpose()?,
    })
}

#[axum::async_trait]
impl SessionStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn save_session(&self, new_session: NewSession) -> Result<Session, StoreError> {
        let patterns = new_session.patterns();
        let session = new_session.into_session(Uuid::new_v4(), Utc::now().trunc_subsecs(6));

        let id = session.id.to_string();
        let player_id = session.player_id.to_string();
        let created_at = format_time(session.created_at);
        let analysis = serde_json::to_string(&session.analysis_json)
            .map_err(|e| StoreError::Corrupt(format!("analysis_json: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO sessions (
                id, player_id, created_at, session_type, raw_transcript,
                analysis_json, helpful_thought_ratio, average_attribution_quality,
                total_segments
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&player_id)
        .bind(&created_at)
        .bind(session.session_type.as_str())
        .bind(&session.raw_transcript)
        .bind(&analysis)
        .bind(&session.helpful_thought_ratio)
        .bind(session.average_attribution_quality)
        .bind(i64::from(session.total_segments))
        .execute(&self.pool)
        .await?;

        // Pattern rows only feed trends; the session stands without them
        if let Err(e) = self.insert_patterns(&id, &player_id, &created_at, &patterns).await {
            warn!(session_id = %session.id, error = %e, "Error saving patterns");
        }

        info!(
            session_id = %session.id,
            segments = session.analysis_json.segments.len(),
            patterns = patterns.len(),
            "Session saved"
        );
        Ok(session)
    }

    async fn list_sessions(
        &self,
        player_id: Uuid,
        limit: u32,
    ) -> Result<Vec<SessionSummary>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, created_at, session_type, helpful_thought_ratio,
                   average_attribution_quality, total_segments
            FROM sessions
            WHERE player_id = ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(player_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(summary_from_row).collect()
    }

    async fn get_session(
        &self,
        id: Uuid,
        player_id: Uuid,
    ) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ? AND player_id = ?")
            .bind(id.to_string())
            .bind(player_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn pattern_points(
        &self,
        player_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<PatternPoint>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT pattern_type, helpfulness_score, created_at
            FROM patterns
            WHERE player_id = ? AND created_at >= ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(player_id.to_string())
        .bind(format_time(since))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<PatternPoint, StoreError> {
                Ok(PatternPoint {
                    pattern_type: row.try_get("pattern_type")?,
                    helpfulness_score: row.try_get("helpfulness_score")?,
                    created_at: parse_time(&row.try_get::<String, _>("created_at")?)?,
                })
            })
            .collect()
    }

    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query("SELECT id, full_name, role, updated_at FROM profiles WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(profile_from_row).transpose()
    }

    /// Upsert: a local database has no auth service creating profiles
    async fn update_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Option<Profile>, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, full_name, role, updated_at)
            VALUES (?, ?, 'player', ?)
            ON CONFLICT(id) DO UPDATE SET
                full_name = excluded.full_name,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id.to_string())
        .bind(update.full_name.trim())
        .bind(format_time(Utc::now()))
        .execute(&self.pool)
        .await?;

        self.get_profile(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tat_common::analysis::{AnalysisSummary, AttributionAnalysis, PsychologicalPattern, Segment};

    fn analysis() -> AnalysisResult {
        let segment = |id: u32, kinds: &[(&str, f64)]| Segment {
            segment_id: id,
            quote: format!("quote {}", id),
            timestamp: None,
            situation: None,
            helpfulness_score: 6.0,
            psychological_patterns: kinds
                .iter()
                .map(|(kind, score)| PsychologicalPattern {
                    pattern_type: kind.to_string(),
                    helpfulness_score: *score,
                    explanation: String::new(),
                    intensity: "medium".to_string(),
                })
                .collect(),
            attribution_analysis: AttributionAnalysis::default(),
            focus_direction: Some("forward".to_string()),
        };

        let mut summary = AnalysisSummary::empty();
        summary.total_segments = 2;
        summary.helpful_thought_ratio = "50%".to_string();

        AnalysisResult {
            segments: vec![
                segment(1, &[("self_criticism", 3.0), ("backward_focus", 2.0)]),
                segment(2, &[("self_criticism", 6.0)]),
            ],
            analysis_summary: summary,
        }
    }

    fn new_session(player_id: Uuid) -> NewSession {
        NewSession {
            player_id,
            session_type: SessionType::Match,
            raw_transcript: "Soy un desastre. Vamos.".to_string(),
            analysis: analysis(),
        }
    }

    #[tokio::test]
    async fn test_save_and_get_session() {
        let store = SqliteStore::in_memory().await.unwrap();
        let player = Uuid::new_v4();

        let saved = store.save_session(new_session(player)).await.unwrap();
        assert_eq!(saved.total_segments, 2);
        assert_eq!(saved.helpful_thought_ratio.as_deref(), Some("50%"));

        let loaded = store.get_session(saved.id, player).await.unwrap().unwrap();
        assert_eq!(loaded.analysis_json, saved.analysis_json);
        assert_eq!(loaded.session_type, SessionType::Match);
        assert_eq!(loaded.created_at, saved.created_at);

        // other players cannot read it
        assert!(store
            .get_session(saved.id, Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_session_saved_when_pattern_insert_fails() {
        let store = SqliteStore::in_memory().await.unwrap();
        sqlx::query("DROP TABLE patterns")
            .execute(&store.pool)
            .await
            .unwrap();
        let player = Uuid::new_v4();

        let saved = store.save_session(new_session(player)).await.unwrap();

        let loaded = store.get_session(saved.id, player).await.unwrap();
        assert!(loaded.is_some());
        assert_eq!(store.list_sessions(player, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_sessions_newest_first_with_limit() {
        let store = SqliteStore::in_memory().await.unwrap();
        let player = Uuid::new_v4();

        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(store.save_session(new_session(player)).await.unwrap().id);
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        store.save_session(new_session(Uuid::new_v4())).await.unwrap();

        let list = store.list_sessions(player, 2).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, ids[2]);
        assert_eq!(list[1].id, ids[1]);
    }

    #[tokio::test]
    async fn test_pattern_trends() {
        let store = SqliteStore::in_memory().await.unwrap();
        let player = Uuid::new_v4();
        store.save_session(new_session(player)).await.unwrap();

        let trends = store.pattern_trends(player, 30).await.unwrap();
        let self_criticism = &trends["self_criticism"];
        assert_eq!(self_criticism.count, 2);
        assert_eq!(self_criticism.total_score, 9.0);
        assert_eq!(self_criticism.average_score, 4.5);
        assert_eq!(self_criticism.scores.len(), 2);
        assert_eq!(trends["backward_focus"].count, 1);

        let future = store
            .pattern_points(player, Utc::now() + Duration::days(1))
            .await
            .unwrap();
        assert!(future.is_empty());
    }

    #[tokio::test]
    async fn test_profile_upsert() {
        let store = SqliteStore::in_memory().await.unwrap();
        let id = Uuid::new_v4();
        assert!(store.get_profile(id).await.unwrap().is_none());

        let update = ProfileUpdate {
            full_name: "  Carla Suárez ".to_string(),
        };
        let profile = store.update_profile(id, &update).await.unwrap().unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Carla Suárez"));
        assert_eq!(profile.role, Role::Player);
        assert!(profile.updated_at.is_some());

        let update = ProfileUpdate {
            full_name: "Carla".to_string(),
        };
        let profile = store.update_profile(id, &update).await.unwrap().unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Carla"));
    }

    #[tokio::test]
    async fn test_connect_creates_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("sessions.db");
        let store = SqliteStore::connect(&path).await.unwrap();
        assert_eq!(store.backend_name(), "sqlite");
        assert!(path.exists());
    }
}
