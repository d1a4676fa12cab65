//! Server configuration
//!
//! Each setting resolves in priority order:
//! 1. Command-line argument
//! 2. Environment variable
//! 3. TOML config file (`--config` or the platform default path)
//! 4. Compiled default
//!
//! clap handles tiers 1 and 2 (every argument carries an `env` fallback),
//! [`ServerConfig::resolve`] merges in the file and the defaults.

use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tat_common::config::{is_valid_key, FileConfig};
use tat_common::Error;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_TIMEOUT_MS: u64 = 300_000;
pub const DEFAULT_CLAUDE_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-5-20250929";
pub const DEFAULT_CLAUDE_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_DATABASE_PATH: &str = "./data/sessions.db";
pub const DEFAULT_UPLOAD_DIR: &str = "./data/uploads";
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Command-line arguments for tat-api
#[derive(Parser, Debug, Default)]
#[command(name = "tat-api")]
#[command(about = "Tennis Attribution Trainer API server")]
#[command(version)]
pub struct Args {
    /// Path to TOML config file
    #[arg(short, long, env = "TAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// OpenAI API key (Whisper transcription)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// OpenAI API base URL
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,

    /// Whisper request timeout in milliseconds
    #[arg(long, env = "OPENAI_API_TIMEOUT")]
    pub openai_api_timeout: Option<u64>,

    /// Whisper attempts per request
    #[arg(long, env = "OPENAI_MAX_RETRIES")]
    pub openai_max_retries: Option<u32>,

    /// Anthropic API key (attribution analysis)
    #[arg(long, env = "CLAUDE_API_KEY", hide_env_values = true)]
    pub claude_api_key: Option<String>,

    /// Anthropic API base URL
    #[arg(long, env = "CLAUDE_BASE_URL")]
    pub claude_base_url: Option<String>,

    /// Claude model identifier
    #[arg(long, env = "CLAUDE_MODEL")]
    pub claude_model: Option<String>,

    /// Claude request timeout in milliseconds
    #[arg(long, env = "CLAUDE_API_TIMEOUT")]
    pub claude_api_timeout: Option<u64>,

    /// Claude attempts per request
    #[arg(long, env = "CLAUDE_MAX_RETRIES")]
    pub claude_max_retries: Option<u32>,

    /// Supabase project URL
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    /// Supabase service role key
    #[arg(long, env = "SUPABASE_SERVICE_KEY", hide_env_values = true)]
    pub supabase_service_key: Option<String>,

    /// Session storage backend: supabase or sqlite
    #[arg(long, env = "SESSION_STORE")]
    pub session_store: Option<String>,

    /// SQLite database file (sqlite backend)
    #[arg(long, env = "DATABASE_PATH")]
    pub database_path: Option<PathBuf>,

    /// Comma-separated CORS origins
    #[arg(long, env = "ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Option<Vec<String>>,

    /// Directory for temporary audio uploads
    #[arg(long, env = "UPLOAD_DIR")]
    pub upload_dir: Option<PathBuf>,

    /// Maximum request body size in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: Option<u64>,

    /// Directory served for unmatched paths (web client bundle)
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,
}

/// Session storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Supabase,
    Sqlite,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Supabase => "supabase",
            StoreBackend::Sqlite => "sqlite",
        }
    }
}

impl FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supabase" => Ok(StoreBackend::Supabase),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(Error::Config(format!(
                "SESSION_STORE must be 'supabase' or 'sqlite', got '{}'",
                other
            ))),
        }
    }
}

/// Fully resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_timeout: Duration,
    pub openai_max_retries: u32,
    pub claude_api_key: Option<String>,
    pub claude_base_url: String,
    pub claude_model: String,
    pub claude_timeout: Duration,
    pub claude_max_retries: u32,
    pub supabase_url: Option<String>,
    pub supabase_service_key: Option<String>,
    pub session_store: StoreBackend,
    pub database_path: PathBuf,
    pub allowed_origins: Vec<String>,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub static_dir: Option<PathBuf>,
    /// `[logging] level` from the config file
    pub log_level: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_timeout: Duration::from_millis(DEFAULT_OPENAI_TIMEOUT_MS),
            openai_max_retries: DEFAULT_MAX_RETRIES,
            claude_api_key: None,
            claude_base_url: DEFAULT_CLAUDE_BASE_URL.to_string(),
            claude_model: DEFAULT_CLAUDE_MODEL.to_string(),
            claude_timeout: Duration::from_millis(DEFAULT_CLAUDE_TIMEOUT_MS),
            claude_max_retries: DEFAULT_MAX_RETRIES,
            supabase_url: None,
            supabase_service_key: None,
            session_store: StoreBackend::default(),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            allowed_origins: vec![DEFAULT_ALLOWED_ORIGIN.to_string()],
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            static_dir: None,
            log_level: None,
        }
    }
}

/// Keep a key only when it is non-blank
fn key(value: Option<String>) -> Option<String> {
    value.filter(|k| is_valid_key(k))
}

impl ServerConfig {
    /// Merge arguments (CLI + env) over the config file over defaults
    pub fn resolve(args: Args, file: FileConfig) -> Result<Self, Error> {
        let defaults = ServerConfig::default();

        let session_store = match args.session_store.or(file.storage.backend) {
            Some(name) => name.parse()?,
            None => defaults.session_store,
        };

        let allowed_origins: Vec<String> = args
            .allowed_origins
            .or(file.allowed_origins)
            .map(|origins| {
                origins
                    .into_iter()
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.allowed_origins);

        Ok(Self {
            host: args.host.or(file.host).unwrap_or(defaults.host),
            port: args.port.or(file.port).unwrap_or(defaults.port),
            openai_api_key: key(args.openai_api_key).or(key(file.openai.api_key)),
            openai_base_url: args
                .openai_base_url
                .or(file.openai.base_url)
                .unwrap_or(defaults.openai_base_url),
            openai_timeout: args
                .openai_api_timeout
                .or(file.openai.timeout_ms)
                .map(Duration::from_millis)
                .unwrap_or(defaults.openai_timeout),
            openai_max_retries: args
                .openai_max_retries
                .or(file.openai.max_retries)
                .unwrap_or(defaults.openai_max_retries),
            claude_api_key: key(args.claude_api_key).or(key(file.claude.api_key)),
            claude_base_url: args
                .claude_base_url
                .or(file.claude.base_url)
                .unwrap_or(defaults.claude_base_url),
            claude_model: args
                .claude_model
                .or(file.claude.model)
                .unwrap_or(defaults.claude_model),
            claude_timeout: args
                .claude_api_timeout
                .or(file.claude.timeout_ms)
                .map(Duration::from_millis)
                .unwrap_or(defaults.claude_timeout),
            claude_max_retries: args
                .claude_max_retries
                .or(file.claude.max_retries)
                .unwrap_or(defaults.claude_max_retries),
            supabase_url: key(args.supabase_url).or(key(file.supabase.url)),
            supabase_service_key: key(args.supabase_service_key)
                .or(key(file.supabase.service_key)),
            session_store,
            database_path: args
                .database_path
                .or(file.storage.database_path)
                .unwrap_or(defaults.database_path),
            allowed_origins,
            upload_dir: args
                .upload_dir
                .or(file.upload_dir)
                .unwrap_or(defaults.upload_dir),
            max_upload_bytes: args
                .max_upload_bytes
                .or(file.max_upload_bytes)
                .unwrap_or(defaults.max_upload_bytes),
            static_dir: args.static_dir.or(file.static_dir),
            log_level: file.logging.level,
        })
    }

    /// Supabase URL and service key, when both are set
    pub fn supabase_credentials(&self) -> Option<(&str, &str)> {
        match (&self.supabase_url, &self.supabase_service_key) {
            (Some(url), Some(key)) => Some((url.as_str(), key.as_str())),
            _ => None,
        }
    }

    /// Upload limit in whole megabytes, for messages
    pub fn max_upload_mb(&self) -> u64 {
        self.max_upload_bytes / (1024 * 1024)
    }
}
