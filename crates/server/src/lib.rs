// crates/server/src/lib.rs
//! adsdesk server library.
//!
//! Wires the `adsdesk-jobs` coordinator to the dashboard backend over HTTP
//! and exposes job state to UI consumers through a small Axum API.

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod state;

use std::sync::Arc;

pub use client::HttpJobApi;
pub use config::ServerConfig;
pub use error::*;
pub use metrics::{init_metrics, render_metrics};
pub use routes::api_routes;
pub use state::AppState;

use adsdesk_jobs::{BroadcastSink, JobApi, JobRegistry};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Notification channel capacity for SSE consumers.
const NOTIFICATION_CAPACITY: usize = 256;

/// Build the shared state: registry and notification fan-out over `api`.
pub fn build_state(config: &ServerConfig, api: Arc<dyn JobApi>) -> Arc<AppState> {
    let notifications = Arc::new(BroadcastSink::new(NOTIFICATION_CAPACITY, false));
    let jobs = JobRegistry::new(config.coordinator_config(), api, notifications.clone());
    AppState::new(jobs, notifications)
}

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (health, jobs) and /metrics
/// - CORS for the dashboard frontend (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    api_routes(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
