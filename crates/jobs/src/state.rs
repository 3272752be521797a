// crates/jobs/src/state.rs
//! Shared state for a single (kind, context) job record.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::types::{ContextId, JobHandle, JobKind, JobRecord, JobStatus};

/// Where the polling loop for a record currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// No timer, nothing in flight.
    Idle,
    /// Timer scheduled, not yet fired.
    Armed,
    /// Remote fetch in flight.
    Polling,
}

/// A committed mutation: the status before, and the record after.
#[derive(Debug, Clone)]
pub struct Transition {
    pub previous: JobStatus,
    pub record: JobRecord,
}

impl Transition {
    /// True only for the step *into* completed or failed.
    pub fn entered_terminal(&self) -> bool {
        !self.previous.is_terminal() && self.record.status.is_terminal()
    }
}

struct Slot {
    record: JobRecord,
    /// Bumped by begin, adopt, reset and detach. A scheduler run may only
    /// mutate the record while the epoch it was launched with is current.
    epoch: u64,
    phase: SchedulerPhase,
    run: Option<CancellationToken>,
}

/// One job record plus the bookkeeping its scheduler run needs.
///
/// Everything sits behind one `RwLock` so the ownership check and the
/// mutation it guards are atomic with respect to `reset` and `detach`.
/// The lock is never held across an `.await`.
pub struct JobEntry {
    slot: RwLock<Slot>,
    changes: broadcast::Sender<JobRecord>,
}

impl JobEntry {
    pub fn new(kind: JobKind, context: ContextId, changes: broadcast::Sender<JobRecord>) -> Self {
        Self {
            slot: RwLock::new(Slot {
                record: JobRecord::idle(kind, context),
                epoch: 0,
                phase: SchedulerPhase::Idle,
                run: None,
            }),
            changes,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Slot> {
        self.slot.read().unwrap_or_else(|e| {
            tracing::error!("RwLock poisoned reading job slot: {e}");
            e.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slot> {
        self.slot.write().unwrap_or_else(|e| {
            tracing::error!("RwLock poisoned writing job slot: {e}");
            e.into_inner()
        })
    }

    fn broadcast(&self, record: JobRecord) {
        // No subscribers is fine.
        let _ = self.changes.send(record);
    }

    /// Get a snapshot of the current record.
    pub fn snapshot(&self) -> JobRecord {
        self.read().record.clone()
    }

    pub fn status(&self) -> JobStatus {
        self.read().record.status
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.read().phase
    }

    /// Whether a run launched at `epoch` still owns this record.
    pub fn owns(&self, epoch: u64) -> bool {
        self.read().epoch == epoch
    }

    /// The current epoch if the record is idle.
    pub fn idle_epoch(&self) -> Option<u64> {
        let slot = self.read();
        (slot.record.status == JobStatus::Idle).then_some(slot.epoch)
    }

    /// Move to running for a fresh `start`. Returns `None` if already running.
    pub fn begin(&self, run: CancellationToken) -> Option<u64> {
        let (epoch, snapshot) = {
            let mut slot = self.write();
            if slot.record.status == JobStatus::Running {
                return None;
            }
            if let Some(old) = slot.run.replace(run) {
                old.cancel();
            }
            slot.record.begin();
            slot.epoch += 1;
            slot.phase = SchedulerPhase::Armed;
            (slot.epoch, slot.record.clone())
        };
        self.broadcast(snapshot);
        Some(epoch)
    }

    /// Take over a job found in flight by resume. Refused if the record has
    /// moved on since `expected_epoch` was read or is no longer idle.
    pub fn adopt(
        &self,
        expected_epoch: u64,
        handle: &JobHandle,
        step: Option<String>,
        progress_pct: Option<u8>,
        run: CancellationToken,
    ) -> Option<u64> {
        let (epoch, snapshot) = {
            let mut slot = self.write();
            if slot.epoch != expected_epoch || slot.record.status != JobStatus::Idle {
                return None;
            }
            if let Some(old) = slot.run.replace(run) {
                old.cancel();
            }
            slot.record.adopt(handle, step, progress_pct);
            slot.epoch += 1;
            slot.phase = SchedulerPhase::Armed;
            (slot.epoch, slot.record.clone())
        };
        self.broadcast(snapshot);
        Some(epoch)
    }

    /// Apply `f` to the record if `epoch` is still current.
    ///
    /// A terminal result drops the phase back to idle and releases the run
    /// token, so nothing can reschedule after it.
    pub fn update<F>(&self, epoch: u64, f: F) -> Option<Transition>
    where
        F: FnOnce(&mut JobRecord) -> bool,
    {
        let (transition, changed) = {
            let mut slot = self.write();
            if slot.epoch != epoch {
                return None;
            }
            let previous = slot.record.status;
            let changed = f(&mut slot.record);
            if slot.record.status.is_terminal() {
                slot.phase = SchedulerPhase::Idle;
                slot.run = None;
            }
            (
                Transition {
                    previous,
                    record: slot.record.clone(),
                },
                changed,
            )
        };
        if changed {
            self.broadcast(transition.record.clone());
        }
        Some(transition)
    }

    /// Record the scheduler phase. Returns false if `epoch` no longer owns the record.
    pub fn set_phase(&self, epoch: u64, phase: SchedulerPhase) -> bool {
        let mut slot = self.write();
        if slot.epoch != epoch {
            return false;
        }
        slot.phase = phase;
        true
    }

    /// Back to idle, cancelling any scheduled poll. The remote job is untouched.
    pub fn reset(&self) {
        let snapshot = {
            let mut slot = self.write();
            if let Some(run) = slot.run.take() {
                run.cancel();
            }
            slot.epoch += 1;
            slot.phase = SchedulerPhase::Idle;
            slot.record.reset();
            slot.record.clone()
        };
        self.broadcast(snapshot);
    }

    /// Stop observing without touching the record (registry teardown).
    pub fn detach(&self) {
        let mut slot = self.write();
        if let Some(run) = slot.run.take() {
            run.cancel();
        }
        slot.epoch += 1;
        slot.phase = SchedulerPhase::Idle;
    }
}
