//! Tests for config file loading and graceful degradation
//!
//! - Missing default config file yields defaults, never an error
//! - Explicit config path must exist
//! - Default path honors XDG_CONFIG_HOME on Linux
//!
//! Tests that touch XDG_CONFIG_HOME are marked #[serial] so they do not race.

use serial_test::serial;
use std::env;
use std::fs;
use tat_common::config::{default_config_path, load_config_file, FileConfig};
use tat_common::Error;
use tempfile::TempDir;

#[test]
fn test_explicit_path_loads_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
        port = 4000
        upload_dir = "/tmp/tat-uploads"

        [openai]
        max_retries = 5

        [supabase]
        url = "https://example.supabase.co"
        "#,
    )
    .unwrap();

    let config = load_config_file(Some(&path)).unwrap();
    assert_eq!(config.port, Some(4000));
    assert_eq!(config.openai.max_retries, Some(5));
    assert_eq!(
        config.supabase.url.as_deref(),
        Some("https://example.supabase.co")
    );
    assert_eq!(
        config.upload_dir.as_deref(),
        Some(std::path::Path::new("/tmp/tat-uploads"))
    );
}

#[test]
fn test_explicit_missing_path_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nope.toml");

    let result = load_config_file(Some(&path));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_explicit_invalid_toml_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "port = [").unwrap();

    let result = load_config_file(Some(&path));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn test_missing_default_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    env::set_var("XDG_CONFIG_HOME", dir.path());

    let config = load_config_file(None).unwrap();
    assert_eq!(config, FileConfig::default());

    env::remove_var("XDG_CONFIG_HOME");
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn test_default_path_under_xdg_config_home() {
    let dir = TempDir::new().unwrap();
    env::set_var("XDG_CONFIG_HOME", dir.path());

    let path = default_config_path().unwrap();
    assert_eq!(path, dir.path().join("tennis-attribution").join("config.toml"));

    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "host = \"127.0.0.1\"\n[storage]\nbackend = \"sqlite\"\n").unwrap();

    let config = load_config_file(None).unwrap();
    assert_eq!(config.host.as_deref(), Some("127.0.0.1"));
    assert_eq!(config.storage.backend.as_deref(), Some("sqlite"));

    env::remove_var("XDG_CONFIG_HOME");
}
