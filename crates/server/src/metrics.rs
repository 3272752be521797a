//! Prometheus metrics for the adsdesk server.
//!
//! This module provides:
//! - Prometheus metrics recorder initialization
//! - Rendering for the `/metrics` endpoint
//!
//! The metrics themselves are recorded by `adsdesk_jobs::metrics`.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Call once at startup, before any job is started.
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    let mut installed = false;
    // Concurrent callers wait here until the first one has finished.
    PROMETHEUS_HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        match metrics::set_global_recorder(recorder) {
            Ok(()) => {
                adsdesk_jobs::metrics::describe_metrics();
                tracing::info!("Prometheus metrics initialized");
                installed = true;
            }
            Err(_) => tracing::warn!("Failed to set global metrics recorder (already set)"),
        }
        handle
    });
    installed
}

/// Render current metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}
