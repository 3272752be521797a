// crates/jobs/src/types.rs
//! Types for supervised background jobs.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::JobError;

/// Step label written by `start` before the remote call returns.
pub const STARTING_STEP: &str = "Starting…";

/// The three kinds of supervised background operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Campaign / ad group / target / ad sync. Short, has a server-side job id.
    DataSync,
    /// Search term report download.
    SearchTermSync,
    /// Performance report generation. Slow, externally generated.
    ReportGeneration,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [
        JobKind::DataSync,
        JobKind::SearchTermSync,
        JobKind::ReportGeneration,
    ];

    /// Wire name, also used in URLs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataSync => "data_sync",
            Self::SearchTermSync => "search_term_sync",
            Self::ReportGeneration => "report_generation",
        }
    }

    /// Human-readable label for notifications and fallback error text.
    pub fn label(&self) -> &'static str {
        match self {
            Self::DataSync => "Data sync",
            Self::SearchTermSync => "Search term sync",
            Self::ReportGeneration => "Report generation",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "data_sync" => Ok(Self::DataSync),
            "search_term_sync" => Ok(Self::SearchTermSync),
            "report_generation" => Ok(Self::ReportGeneration),
            other => Err(JobError::UnknownKind(other.to_string())),
        }
    }
}

/// Scoping key for a job record (the credential / account it belongs to).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(String);

impl ContextId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContextId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ContextId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Lifecycle status of a job record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Opaque handle the remote side issued for a running operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobHandle {
    /// Server-side job id, polled through the status endpoint.
    JobId(String),
    /// "Not ready yet" token, polled by resubmitting the original request.
    PendingToken(String),
}

impl JobHandle {
    pub fn as_str(&self) -> &str {
        match self {
            Self::JobId(id) | Self::PendingToken(id) => id,
        }
    }
}

/// State of one supervised operation for a (kind, context) pair.
///
/// Mutated only through the crate-private transition methods below, which
/// keep `completed_at`, `result` and `error` consistent with `status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub kind: JobKind,
    pub context: ContextId,
    pub status: JobStatus,
    pub job_id: Option<String>,
    pub pending_token: Option<String>,
    pub step: Option<String>,
    pub progress_pct: u8,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn idle(kind: JobKind, context: ContextId) -> Self {
        Self {
            kind,
            context,
            status: JobStatus::Idle,
            job_id: None,
            pending_token: None,
            step: None,
            progress_pct: 0,
            result: None,
            error: None,
            completed_at: None,
        }
    }

    /// The handle currently being polled, if any.
    pub fn handle(&self) -> Option<JobHandle> {
        self.job_id
            .clone()
            .map(JobHandle::JobId)
            .or_else(|| self.pending_token.clone().map(JobHandle::PendingToken))
    }

    pub(crate) fn begin(&mut self) {
        self.status = JobStatus::Running;
        self.job_id = None;
        self.pending_token = None;
        self.step = Some(STARTING_STEP.to_string());
        self.progress_pct = 0;
        self.result = None;
        self.error = None;
        self.completed_at = None;
    }

    pub(crate) fn adopt(&mut self, handle: &JobHandle, step: Option<String>, progress_pct: Option<u8>) {
        self.begin();
        self.record_progress(handle, step, progress_pct);
    }

    /// Apply a non-terminal poll answer. Returns false unless running.
    pub(crate) fn record_progress(
        &mut self,
        handle: &JobHandle,
        step: Option<String>,
        progress_pct: Option<u8>,
    ) -> bool {
        if self.status != JobStatus::Running {
            return false;
        }
        match handle {
            JobHandle::JobId(id) => self.job_id = Some(id.clone()),
            JobHandle::PendingToken(token) => self.pending_token = Some(token.clone()),
        }
        if let Some(step) = step {
            self.step = Some(step);
        }
        if let Some(pct) = progress_pct {
            self.progress_pct = pct.min(100);
        }
        true
    }

    pub(crate) fn complete(&mut self, result: Value, at: DateTime<Utc>) -> bool {
        if self.status != JobStatus::Running {
            return false;
        }
        self.status = JobStatus::Completed;
        self.result = Some(result);
        self.error = None;
        self.completed_at = Some(at);
        true
    }

    /// Empty messages fall back to "<label> failed".
    pub(crate) fn fail(&mut self, error: impl Into<String>, at: DateTime<Utc>) -> bool {
        if self.status != JobStatus::Running {
            return false;
        }
        let error = error.into();
        let error = if error.trim().is_empty() {
            format!("{} failed", self.kind.label())
        } else {
            error
        };
        self.status = JobStatus::Failed;
        self.result = None;
        self.error = Some(error);
        self.completed_at = Some(at);
        true
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::idle(self.kind, self.context.clone());
    }
}

/// A record as shown to consumers, with the completion display window applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    #[serde(flatten)]
    pub record: JobRecord,
    pub visible: bool,
}
