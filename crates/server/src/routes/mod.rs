//! API route handlers for the adsdesk server.

pub mod health;
pub mod jobs;
pub mod metrics;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined router: API routes under /api, plus /metrics.
///
/// Routes:
/// - GET    /api/health - Health check
/// - GET    /api/jobs/{context} - Job views for a context (resumes on first call)
/// - POST   /api/jobs/{context}/{kind}/start - Start a job
/// - POST   /api/jobs/{context}/{kind}/resume - Re-attach to a remote job
/// - DELETE /api/jobs/{context}/{kind} - Dismiss a job
/// - GET    /api/jobs/stream - SSE stream of job changes and notifications
/// - GET    /metrics - Prometheus metrics
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", jobs::router())
        .merge(metrics::router())
        .with_state(state)
}
