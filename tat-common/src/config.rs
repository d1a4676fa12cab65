//! Configuration file loading
//!
//! Service settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Tiers 1 and 2 belong to each service's argument parser. This module
//! provides tier 3: locating, reading and parsing the TOML file.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory name under the platform config dir
const CONFIG_DIR_NAME: &str = "tennis-attribution";

/// File name of the TOML config
const CONFIG_FILE_NAME: &str = "config.toml";

/// Contents of the TOML config file
///
/// Every field is optional. Missing fields fall through to compiled defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub allowed_origins: Option<Vec<String>>,
    pub upload_dir: Option<PathBuf>,
    pub max_upload_bytes: Option<u64>,
    pub static_dir: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub openai: OpenAiConfig,
    pub claude: ClaudeConfig,
    pub supabase: SupabaseConfig,
    pub storage: StorageConfig,
}

/// `[logging]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "tat_api=debug,tower_http=info"
    pub level: Option<String>,
}

/// `[openai]` table (Whisper transcription)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
}

/// `[claude]` table (attribution analysis)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaudeConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
}

/// `[supabase]` table (auth + hosted session storage)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupabaseConfig {
    pub url: Option<String>,
    pub service_key: Option<String>,
}

/// `[storage]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// "supabase" or "sqlite"
    pub backend: Option<String>,
    pub database_path: Option<PathBuf>,
}

/// Default config file location for the platform
///
/// Linux: `$XDG_CONFIG_HOME/tennis-attribution/config.toml`
/// (falls back to `~/.config/...`). macOS and Windows use the
/// platform config directory reported by `dirs`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Parse TOML config content
pub fn parse_config(content: &str) -> Result<FileConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Load the config file
///
/// An explicitly requested path must exist. When no path is given the
/// platform default is tried, and a missing default file yields
/// `FileConfig::default()` so startup never fails for lack of a file.
pub fn load_config_file(explicit: Option<&Path>) -> Result<FileConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            Some(path) => {
                debug!("No config file at {}, using defaults", path.display());
                return Ok(FileConfig::default());
            }
            None => {
                debug!("Could not determine config directory, using defaults");
                return Ok(FileConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config = parse_config(&content)?;

    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
