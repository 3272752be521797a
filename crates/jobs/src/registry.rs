// crates/jobs/src/registry.rs
//! The job registry: one shared coordinator per process.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::api::JobApi;
use crate::config::CoordinatorConfig;
use crate::display::DisplayWindow;
use crate::error::JobApiError;
use crate::metrics;
use crate::notify::{NotificationDispatcher, NotificationSink};
use crate::scheduler::PollRun;
use crate::state::{JobEntry, SchedulerPhase};
use crate::transport::{self, PollTransport, Progress};
use crate::types::{ContextId, JobKind, JobRecord, JobView};

/// Central coordinator for supervised background jobs.
///
/// Construct once at startup and share the `Arc` with every consumer.
/// `start`, `dismiss` and the snapshot readers never block on the network;
/// the remote calls run in spawned tasks (so a Tokio runtime must be
/// running). Dropping the registry or calling [`JobRegistry::shutdown`]
/// stops every poll loop; remote jobs keep running server-side.
pub struct JobRegistry {
    config: CoordinatorConfig,
    transports: HashMap<JobKind, Arc<dyn PollTransport>>,
    entries: DashMap<(JobKind, ContextId), Arc<JobEntry>>,
    /// Contexts `ensure_tracked` has already resumed.
    contacted: DashSet<ContextId>,
    dispatcher: Arc<NotificationDispatcher>,
    window: DisplayWindow,
    root: CancellationToken,
    changes: broadcast::Sender<JobRecord>,
}

impl JobRegistry {
    /// Create a registry whose transports all talk to `api`, each kind using
    /// the transport named in `config`.
    pub fn new(
        config: CoordinatorConfig,
        api: Arc<dyn JobApi>,
        sink: Arc<dyn NotificationSink>,
    ) -> Arc<Self> {
        let transports = JobKind::ALL
            .into_iter()
            .map(|kind| {
                let transport = config.for_kind(kind).transport;
                (kind, transport::for_kind(kind, transport, Arc::clone(&api)))
            })
            .collect();
        Self::with_transports(config, transports, sink)
    }

    /// Create with explicit transports (kinds without one cannot be started).
    pub fn with_transports(
        config: CoordinatorConfig,
        transports: HashMap<JobKind, Arc<dyn PollTransport>>,
        sink: Arc<dyn NotificationSink>,
    ) -> Arc<Self> {
        let (changes, _) = broadcast::channel(config.channel_capacity.max(1));
        Arc::new(Self {
            window: DisplayWindow::new(config.display_window),
            config,
            transports,
            entries: DashMap::new(),
            contacted: DashSet::new(),
            dispatcher: Arc::new(NotificationDispatcher::new(sink)),
            root: CancellationToken::new(),
            changes,
        })
    }

    fn entry(&self, kind: JobKind, context: &ContextId) -> Arc<JobEntry> {
        let entry = self
            .entries
            .entry((kind, context.clone()))
            .or_insert_with(|| Arc::new(JobEntry::new(kind, context.clone(), self.changes.clone())));
        Arc::clone(&entry)
    }

    fn transport(&self, kind: JobKind) -> Option<Arc<dyn PollTransport>> {
        let transport = self.transports.get(&kind).cloned();
        if transport.is_none() {
            tracing::error!(kind = %kind, "No poll transport configured");
        }
        transport
    }

    fn poll_run(
        &self,
        kind: JobKind,
        context: &ContextId,
        entry: Arc<JobEntry>,
        transport: Arc<dyn PollTransport>,
        epoch: u64,
        token: CancellationToken,
    ) -> PollRun {
        PollRun {
            kind,
            context: context.clone(),
            entry,
            transport,
            dispatcher: Arc::clone(&self.dispatcher),
            interval: self.config.for_kind(kind).interval,
            epoch,
            token,
        }
    }

    /// Start a job. A no-op returning `false` if one is already running for
    /// this (kind, context), or after shutdown.
    pub fn start(&self, kind: JobKind, context: &ContextId) -> bool {
        if self.is_shut_down() {
            tracing::warn!(kind = %kind, context = %context, "Start ignored: registry shut down");
            return false;
        }
        let Some(transport) = self.transport(kind) else {
            return false;
        };
        let entry = self.entry(kind, context);
        let token = self.root.child_token();
        let Some(epoch) = self.claim(&entry, token.clone()) else {
            tracing::debug!(kind = %kind, context = %context, "Start ignored: job running or registry shut down");
            return false;
        };

        tracing::info!(kind = %kind, context = %context, transport = transport.name(), "Job started");
        metrics::record_started(kind);
        self.dispatcher.request_permission();

        let run = self.poll_run(kind, context, entry, transport, epoch, token);
        tokio::spawn(run.run_from_start());
        true
    }

    /// Move the entry to running for this start. A shutdown that lands
    /// between the caller's check and `begin` undoes the claim, since the
    /// run's token is already cancelled and nothing would finish it.
    fn claim(&self, entry: &JobEntry, token: CancellationToken) -> Option<u64> {
        let epoch = entry.begin(token)?;
        if self.is_shut_down() {
            entry.reset();
            return None;
        }
        Some(epoch)
    }

    /// Re-attach to a job the backend reports as running. Only acts while
    /// the local record is idle; returns whether a job was adopted.
    pub async fn resume(&self, kind: JobKind, context: &ContextId) -> bool {
        match self.try_resume(kind, context).await {
            Ok(adopted) => adopted,
            Err(e) => {
                tracing::warn!(kind = %kind, context = %context, error = %e, "Resume lookup failed");
                false
            }
        }
    }

    async fn try_resume(&self, kind: JobKind, context: &ContextId) -> Result<bool, JobApiError> {
        if self.is_shut_down() {
            return Ok(false);
        }
        let Some(transport) = self.transport(kind) else {
            return Ok(false);
        };
        let entry = self.entry(kind, context);
        let Some(idle_epoch) = entry.idle_epoch() else {
            return Ok(false);
        };

        let Some(Progress::Running {
            handle,
            step,
            progress_pct,
        }) = transport.find_live(context).await?
        else {
            return Ok(false);
        };
        if self.is_shut_down() {
            return Ok(false);
        }

        let token = self.root.child_token();
        let Some(epoch) = entry.adopt(idle_epoch, &handle, step, progress_pct, token.clone()) else {
            tracing::debug!(kind = %kind, context = %context, "Resume discarded: record changed meanwhile");
            return Ok(false);
        };

        tracing::info!(kind = %kind, context = %context, handle = handle.as_str(), "Resumed in-flight job");
        metrics::record_resumed(kind);

        let run = self.poll_run(kind, context, entry, transport, epoch, token);
        tokio::spawn(run.run_from_handle(handle));
        Ok(true)
    }

    /// First contact with a context: resume every kind once. Later calls
    /// for the same context do nothing, unless a lookup failed, in which
    /// case the next call tries again. Returns the number of jobs adopted.
    pub async fn ensure_tracked(&self, context: &ContextId) -> usize {
        if !self.contacted.insert(context.clone()) {
            return 0;
        }
        let lookups = JobKind::ALL
            .into_iter()
            .map(|kind| async move { (kind, self.try_resume(kind, context).await) });
        let outcomes = join_all(lookups).await;

        let mut adopted = 0;
        let mut failed = false;
        for (kind, outcome) in outcomes {
            match outcome {
                Ok(true) => adopted += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(kind = %kind, context = %context, error = %e, "Resume lookup failed");
                    failed = true;
                }
            }
        }
        if failed {
            self.contacted.remove(context);
        }
        adopted
    }

    /// Stop tracking a job locally and reset it to idle. The remote job is
    /// not cancelled; nothing observes it until the next resume.
    pub fn dismiss(&self, kind: JobKind, context: &ContextId) {
        let Some(entry) = self.entries.get(&(kind, context.clone())).map(|e| Arc::clone(&e)) else {
            return;
        };
        entry.reset();
        tracing::info!(kind = %kind, context = %context, "Job dismissed");
    }

    /// Current record for (kind, context); idle if never touched.
    pub fn snapshot(&self, kind: JobKind, context: &ContextId) -> JobRecord {
        self.entries
            .get(&(kind, context.clone()))
            .map(|e| e.snapshot())
            .unwrap_or_else(|| JobRecord::idle(kind, context.clone()))
    }

    /// Record with display visibility applied at `now`.
    pub fn view(&self, kind: JobKind, context: &ContextId, now: DateTime<Utc>) -> JobView {
        let record = self.snapshot(kind, context);
        let visible = self.window.is_visible(&record, now);
        JobView { record, visible }
    }

    /// Views for all kinds of one context, in [`JobKind::ALL`] order.
    pub fn views(&self, context: &ContextId, now: DateTime<Utc>) -> Vec<JobView> {
        JobKind::ALL
            .into_iter()
            .map(|kind| self.view(kind, context, now))
            .collect()
    }

    /// Where the poll loop for (kind, context) is.
    pub fn phase(&self, kind: JobKind, context: &ContextId) -> SchedulerPhase {
        self.entries
            .get(&(kind, context.clone()))
            .map(|e| e.phase())
            .unwrap_or(SchedulerPhase::Idle)
    }

    /// Subscribe to every committed record change.
    pub fn subscribe(&self) -> broadcast::Receiver<JobRecord> {
        self.changes.subscribe()
    }

    pub fn display_window(&self) -> DisplayWindow {
        self.window
    }

    /// Tear down: cancel every scheduled poll and revoke every run's
    /// ownership, leaving records as they were.
    pub fn shutdown(&self) {
        if self.root.is_cancelled() {
            return;
        }
        self.root.cancel();
        for entry in self.entries.iter() {
            entry.value().detach();
        }
        tracing::info!("Job registry shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }
}

impl Drop for JobRegistry {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
