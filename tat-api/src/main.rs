//! tat-api - Tennis Attribution Trainer API server
//!
//! Settings come from command-line flags, environment variables and an
//! optional TOML file; see `config.rs`.

use anyhow::{Context, Result};
use clap::Parser;
use tat_api::config::{Args, ServerConfig};
use tat_api::{build_router, AppState};
use tat_common::config::load_config_file;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "tat_api=info,tat_common=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // The file is read before tracing starts so its log level can apply
    let file_config = load_config_file(args.config.as_deref())?;
    let config = ServerConfig::resolve(args, file_config)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| match &config.log_level {
            Some(level) => EnvFilter::try_new(level),
            None => EnvFilter::try_new(DEFAULT_LOG_FILTER),
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting tat-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    if config.openai_api_key.is_none() {
        warn!("OPENAI_API_KEY not set. Transcription service will not work.");
    }
    if config.claude_api_key.is_none() {
        warn!("CLAUDE_API_KEY not set. Attribution analysis will not work.");
    }

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::init(config).await?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("tat-api listening on http://{}", addr);
    info!("Health check: http://{}/api/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
