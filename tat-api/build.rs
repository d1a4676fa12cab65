//! Build identification for the startup log line
//!
//! Exposes GIT_HASH, BUILD_TIMESTAMP and BUILD_PROFILE to `env!`.

use std::process::Command;

/// Short HEAD hash, or "unknown" without git or outside a checkout
fn git_short_hash() -> String {
    let output = match Command::new("git").args(["rev-parse", "--short=8", "HEAD"]).output() {
        Ok(output) if output.status.success() => output,
        _ => return "unknown".to_string(),
    };
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn main() {
    let build_timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=GIT_HASH={}", git_short_hash());
    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", build_timestamp);
    println!("cargo:rustc-env=BUILD_PROFILE={}", profile);
    // No rerun-if-changed: the script runs on every build so the hash stays current
}
