//! tat-api library - Tennis Attribution Trainer backend
//!
//! HTTP server that transcribes match audio with Whisper, analyzes the
//! transcript for causal attributions with Claude and stores analyzed
//! sessions per player.

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod store;

use api::TokenVerifier;
use config::{ServerConfig, StoreBackend};
use services::{AttributionService, AudioSplitter, ClaudeClient, TranscriptionService, WhisperClient};
use store::{SessionStore, SqliteStore, SupabaseClient};

/// Application state shared across HTTP handlers
///
/// An integration is `None` when its credentials are not configured;
/// handlers that need it answer with a configuration error.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub transcription: Option<Arc<TranscriptionService>>,
    pub attribution: Option<Arc<AttributionService>>,
    pub sessions: Option<Arc<dyn SessionStore>>,
    pub auth: Option<Arc<dyn TokenVerifier>>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Build the API clients for every configured key
    ///
    /// Session storage and token verification start out unset.
    pub fn new(config: ServerConfig, splitter: Option<AudioSplitter>) -> anyhow::Result<Self> {
        let transcription = match &config.openai_api_key {
            Some(key) => {
                let whisper = WhisperClient::new(
                    key.clone(),
                    &config.openai_base_url,
                    config.openai_timeout,
                    config.openai_max_retries,
                )
                .context("Failed to create Whisper client")?;
                Some(Arc::new(TranscriptionService::new(whisper, splitter)))
            }
            None => None,
        };

        let attribution = match &config.claude_api_key {
            Some(key) => {
                let claude = ClaudeClient::new(
                    key.clone(),
                    &config.claude_base_url,
                    config.claude_model.clone(),
                    config.claude_timeout,
                    config.claude_max_retries,
                )
                .context("Failed to create Claude client")?;
                Some(Arc::new(AttributionService::new(claude)))
            }
            None => None,
        };

        Ok(Self {
            config: Arc::new(config),
            transcription,
            attribution,
            sessions: None,
            auth: None,
            startup_time: Utc::now(),
        })
    }

    /// Full startup: ffmpeg detection, upload directory, storage and auth
    pub async fn init(config: ServerConfig) -> anyhow::Result<Self> {
        let splitter = match AudioSplitter::detect().await {
            Ok(splitter) => {
                info!("ffmpeg available: large audio files will be split");
                Some(splitter)
            }
            Err(e) => {
                warn!("Audio splitting disabled ({}). Files over 25MB will be rejected.", e);
                None
            }
        };

        tokio::fs::create_dir_all(&config.upload_dir)
            .await
            .with_context(|| format!("Failed to create upload directory {}", config.upload_dir.display()))?;
        info!("Upload directory: {}", config.upload_dir.display());

        let supabase = match config.supabase_credentials() {
            Some((url, key)) => Some(Arc::new(
                SupabaseClient::new(url, key).context("Failed to create Supabase client")?,
            )),
            None => None,
        };

        let backend = config.session_store;
        let database_path = config.database_path.clone();
        let mut state = Self::new(config, splitter)?;

        match backend {
            StoreBackend::Sqlite => {
                let store = SqliteStore::connect(&database_path)
                    .await
                    .with_context(|| format!("Failed to open database {}", database_path.display()))?;
                info!("Session store: SQLite at {}", database_path.display());
                state = state.with_session_store(Arc::new(store));
            }
            StoreBackend::Supabase => match &supabase {
                Some(client) => {
                    info!("Session store: Supabase");
                    state = state.with_session_store(client.clone());
                }
                None => warn!(
                    "SUPABASE_URL / SUPABASE_SERVICE_KEY not set. Session endpoints will be unavailable."
                ),
            },
        }

        match supabase {
            Some(client) => state = state.with_token_verifier(client),
            None => warn!("Authentication not configured. Protected endpoints will answer 503."),
        }

        Ok(state)
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(store);
        self
    }

    pub fn with_token_verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.auth = Some(verifier);
        self
    }
}

/// CORS for the configured origins, with credentials
///
/// `*` echoes the caller's origin, since a literal wildcard cannot be
/// combined with credentials.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|origin| origin.trim() == "*") {
        AllowOrigin::mirror_request()
    } else {
        let allowed = origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin: {}", origin);
                    None
                }
            })
            .collect::<Vec<_>>();
        AllowOrigin::list(allowed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true)
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.max_upload_bytes).unwrap_or(usize::MAX);
    let cors = cors_layer(&state.config.allowed_origins);

    let router = Router::new()
        .merge(api::health_routes())
        .merge(api::transcribe_routes())
        .merge(api::analyze_routes())
        .merge(api::emotion_routes())
        .merge(api::session_routes());

    let router = match &state.config.static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router.fallback(api::not_found),
    };

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
