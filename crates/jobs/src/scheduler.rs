// crates/jobs/src/scheduler.rs
//! Self-rescheduling poll loop for one (kind, context).
//!
//! Phases: Idle → Armed (timer set) → Polling (fetch in flight) → Armed …
//! until a terminal answer or a fetch error drops it back to Idle. Every
//! mutation goes through [`JobEntry::update`] with the run's epoch, so a run
//! that was dismissed or torn down can never touch the record again.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::error::JobApiError;
use crate::metrics;
use crate::notify::NotificationDispatcher;
use crate::state::{JobEntry, SchedulerPhase};
use crate::transport::{PollTransport, Progress};
use crate::types::{ContextId, JobHandle, JobKind};

/// One supervised run of a job, from start (or adoption) to terminal state.
pub(crate) struct PollRun {
    pub kind: JobKind,
    pub context: ContextId,
    pub entry: Arc<JobEntry>,
    pub transport: Arc<dyn PollTransport>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub interval: Duration,
    pub epoch: u64,
    pub token: CancellationToken,
}

impl PollRun {
    /// Issue the remote start, then keep polling.
    pub async fn run_from_start(self) {
        if !self.entry.set_phase(self.epoch, SchedulerPhase::Polling) {
            return;
        }
        let outcome = tokio::select! {
            biased;
            _ = self.token.cancelled() => return,
            outcome = self.transport.begin(&self.context) => outcome,
        };
        if let Some(handle) = self.apply(outcome) {
            self.poll_loop(handle).await;
        }
    }

    /// Keep polling a job whose handle is already known (resume).
    pub async fn run_from_handle(self, handle: JobHandle) {
        self.poll_loop(handle).await;
    }

    async fn poll_loop(self, mut handle: JobHandle) {
        loop {
            if !self.entry.set_phase(self.epoch, SchedulerPhase::Armed) {
                return;
            }
            tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    tracing::debug!(kind = %self.kind, context = %self.context, "Poll cancelled");
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
            if !self.entry.set_phase(self.epoch, SchedulerPhase::Polling) {
                return;
            }

            let started = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = self.token.cancelled() => return,
                outcome = self.transport.poll(&self.context, &handle) => outcome,
            };
            metrics::record_poll(self.kind, started.elapsed());

            match self.apply(outcome) {
                Some(next) => handle = next,
                None => return,
            }
        }
    }

    /// Commit one answer. Returns the handle to poll next, or `None` when
    /// the run is over (terminal, fetch error, or no longer owned).
    fn apply(&self, outcome: Result<Progress, JobApiError>) -> Option<JobHandle> {
        let at = Utc::now();
        let (transition, next) = match outcome {
            Ok(Progress::Running {
                handle,
                step,
                progress_pct,
            }) => {
                tracing::debug!(
                    kind = %self.kind,
                    context = %self.context,
                    handle = handle.as_str(),
                    progress_pct = ?progress_pct,
                    "Job still running"
                );
                let transition = self
                    .entry
                    .update(self.epoch, |r| r.record_progress(&handle, step, progress_pct))?;
                (transition, Some(handle))
            }
            Ok(Progress::Completed(result)) => {
                (self.entry.update(self.epoch, |r| r.complete(result, at))?, None)
            }
            Ok(Progress::Failed(message)) => {
                (self.entry.update(self.epoch, |r| r.fail(message, at))?, None)
            }
            Err(e) => {
                tracing::warn!(
                    kind = %self.kind,
                    context = %self.context,
                    transport = self.transport.name(),
                    error = %e,
                    "Job fetch failed"
                );
                (self.entry.update(self.epoch, |r| r.fail(e.to_string(), at))?, None)
            }
        };

        if transition.entered_terminal() {
            let record = &transition.record;
            match &record.error {
                Some(error) => tracing::warn!(
                    kind = %self.kind,
                    context = %self.context,
                    error = %error,
                    "Job failed"
                ),
                None => tracing::info!(kind = %self.kind, context = %self.context, "Job completed"),
            }
            metrics::record_finished(self.kind, record.status);
            self.dispatcher.observe(&transition);
        }

        // A record that is no longer running has nothing left to poll.
        next.filter(|_| !transition.record.status.is_terminal())
    }
}
