// crates/server/src/main.rs
//! adsdesk server binary.
//!
//! Starts the job coordinator and serves its HTTP API on localhost. On
//! Ctrl-C, open SSE streams end and every poll loop stops; jobs already
//! running on the backend are left alone and resumed on the next start.

use std::sync::Arc;

use adsdesk_server::{build_state, create_app, init_metrics, AppState, HttpJobApi, ServerConfig};
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

async fn shutdown_signal(state: Arc<AppState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown requested");
    state.shut_down();
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,adsdesk_server=info,adsdesk_jobs=info".into()),
        )
        .init();

    let config = ServerConfig::parse();
    init_metrics();

    let api = HttpJobApi::new(config.api_base.clone(), config.request_timeout())
        .context("building job API client")?;
    let state = build_state(&config, Arc::new(api));
    let app = create_app(state.clone());

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, api_base = %config.api_base, "adsdesk server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    tracing::info!("adsdesk server stopped");
    Ok(())
}
