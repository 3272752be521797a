// crates/jobs/src/config.rs
//! Coordinator configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::JobKind;

/// How long a completed job stays visible after `completed_at`.
pub const DEFAULT_DISPLAY_WINDOW: Duration = Duration::from_millis(60_000);

/// Which poll transport a job kind uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// `start` issues a job id, `status(job_id)` reports progress.
    StatusQuery,
    /// The start request is resubmitted with a pending token until it answers.
    Resubmit,
}

/// Per-kind polling setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindConfig {
    pub transport: TransportKind,
    pub interval: Duration,
}

/// Configuration for a [`crate::JobRegistry`].
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub data_sync: KindConfig,
    pub search_term_sync: KindConfig,
    pub report_generation: KindConfig,
    pub display_window: Duration,
    /// Capacity of the record-change broadcast channel.
    pub channel_capacity: usize,
}

impl CoordinatorConfig {
    pub fn for_kind(&self, kind: JobKind) -> &KindConfig {
        match kind {
            JobKind::DataSync => &self.data_sync,
            JobKind::SearchTermSync => &self.search_term_sync,
            JobKind::ReportGeneration => &self.report_generation,
        }
    }

    fn for_kind_mut(&mut self, kind: JobKind) -> &mut KindConfig {
        match kind {
            JobKind::DataSync => &mut self.data_sync,
            JobKind::SearchTermSync => &mut self.search_term_sync,
            JobKind::ReportGeneration => &mut self.report_generation,
        }
    }

    pub fn with_interval(mut self, kind: JobKind, interval: Duration) -> Self {
        self.for_kind_mut(kind).interval = interval;
        self
    }

    pub fn with_transport(mut self, kind: JobKind, transport: TransportKind) -> Self {
        self.for_kind_mut(kind).transport = transport;
        self
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            // Short jobs: poll fast so the progress bar moves.
            data_sync: KindConfig {
                transport: TransportKind::StatusQuery,
                interval: Duration::from_secs(2),
            },
            // Reports come from the ad platform and take minutes.
            search_term_sync: KindConfig {
                transport: TransportKind::Resubmit,
                interval: Duration::from_secs(8),
            },
            report_generation: KindConfig {
                transport: TransportKind::Resubmit,
                interval: Duration::from_secs(10),
            },
            display_window: DEFAULT_DISPLAY_WINDOW,
            channel_capacity: 256,
        }
    }
}
