// crates/jobs/src/metrics.rs
//! Job coordinator metrics.
//!
//! Recording is a no-op until the embedding process installs a recorder
//! (the server installs the Prometheus one at startup).

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};

use crate::types::{JobKind, JobStatus};

/// Describe all coordinator metrics. Call once after installing a recorder.
pub fn describe_metrics() {
    describe_counter!("jobs_started_total", "Background jobs started, by kind");
    describe_counter!(
        "jobs_finished_total",
        "Background jobs that reached a terminal state, by kind and outcome"
    );
    describe_counter!(
        "jobs_resumed_total",
        "In-flight jobs adopted from the backend on first contact"
    );
    describe_histogram!(
        "job_poll_duration_seconds",
        "Duration of a single job status fetch in seconds"
    );
}

pub fn record_started(kind: JobKind) {
    counter!("jobs_started_total", "kind" => kind.as_str()).increment(1);
}

pub fn record_resumed(kind: JobKind) {
    counter!("jobs_resumed_total", "kind" => kind.as_str()).increment(1);
}

pub fn record_finished(kind: JobKind, status: JobStatus) {
    counter!("jobs_finished_total", "kind" => kind.as_str(), "outcome" => status.as_str())
        .increment(1);
}

pub fn record_poll(kind: JobKind, duration: Duration) {
    histogram!("job_poll_duration_seconds", "kind" => kind.as_str()).record(duration.as_secs_f64());
}
