// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use adsdesk_jobs::{BroadcastSink, JobRegistry};
use tokio_util::sync::CancellationToken;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// The background job coordinator.
    pub jobs: Arc<JobRegistry>,
    /// Notification fan-out consumed by the SSE stream.
    pub notifications: Arc<BroadcastSink>,
    /// Cancelled on shutdown so open SSE streams end.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(jobs: Arc<JobRegistry>, notifications: Arc<BroadcastSink>) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            jobs,
            notifications,
            shutdown: CancellationToken::new(),
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// End open streams and stop every poll loop.
    pub fn shut_down(&self) {
        self.shutdown.cancel();
        self.jobs.shutdown();
    }
}
