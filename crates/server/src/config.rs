// crates/server/src/config.rs
//! Command-line / environment configuration for the adsdesk server.

use std::net::SocketAddr;
use std::time::Duration;

use adsdesk_jobs::{CoordinatorConfig, JobKind};
use clap::Parser;

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 47900;

#[derive(Debug, Clone, Parser)]
#[command(name = "adsdesk", version, about = "Background job coordinator for the adsdesk dashboard")]
pub struct ServerConfig {
    /// Port to listen on (localhost only).
    #[arg(long, env = "ADSDESK_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Base URL of the dashboard backend that runs the jobs.
    #[arg(long, env = "ADSDESK_API_BASE", default_value = "http://127.0.0.1:8000")]
    pub api_base: String,

    /// Per-request timeout for backend calls, in seconds.
    #[arg(long, env = "ADSDESK_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Poll interval for data sync jobs.
    #[arg(long, env = "ADSDESK_SYNC_INTERVAL_MS")]
    pub sync_interval_ms: Option<u64>,

    /// Poll interval for search term sync jobs.
    #[arg(long, env = "ADSDESK_SEARCH_TERMS_INTERVAL_MS")]
    pub search_terms_interval_ms: Option<u64>,

    /// Resubmission interval for report generation.
    #[arg(long, env = "ADSDESK_REPORT_INTERVAL_MS")]
    pub report_interval_ms: Option<u64>,

    /// How long a completed job stays visible.
    #[arg(long, env = "ADSDESK_DISPLAY_WINDOW_MS")]
    pub display_window_ms: Option<u64>,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], self.port))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Coordinator defaults with any interval and window overrides applied.
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        let overrides = [
            (JobKind::DataSync, self.sync_interval_ms),
            (JobKind::SearchTermSync, self.search_terms_interval_ms),
            (JobKind::ReportGeneration, self.report_interval_ms),
        ];
        let mut config = overrides
            .into_iter()
            .fold(CoordinatorConfig::default(), |config, (kind, ms)| match ms {
                Some(ms) => config.with_interval(kind, Duration::from_millis(ms)),
                None => config,
            });
        if let Some(ms) = self.display_window_ms {
            config.display_window = Duration::from_millis(ms);
        }
        config
    }
}
