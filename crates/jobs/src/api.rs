// crates/jobs/src/api.rs
//! JobApi trait: the remote job-control operations the coordinator drives.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::JobApiError;
use crate::types::{ContextId, JobKind};

/// Remote job-control API consumed by the coordinator.
///
/// Implementations include:
/// - `HttpJobApi` in `adsdesk-server` — reqwest against the dashboard backend
/// - scripted fakes in tests
#[async_trait]
pub trait JobApi: Send + Sync {
    /// Issue a new remote operation and return its server-side id.
    async fn start(&self, kind: JobKind, context: &ContextId) -> Result<StartedJob, JobApiError>;

    /// Status-query transport: current state of a job by id.
    async fn status(&self, job_id: &str) -> Result<RemoteJob, JobApiError>;

    /// Latest job of this kind for this context, if the backend knows one.
    async fn latest(&self, kind: JobKind, context: &ContextId) -> Result<Option<RemoteJob>, JobApiError>;

    /// Resubmission transport: request (or re-request) the operation,
    /// carrying forward a pending token from a previous answer.
    async fn generate(
        &self,
        kind: JobKind,
        context: &ContextId,
        pending_token: Option<&str>,
    ) -> Result<GenerateResponse, JobApiError>;
}

/// Answer to `start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartedJob {
    #[serde(alias = "id")]
    pub job_id: String,
}

/// Status as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    #[serde(alias = "queued")]
    Pending,
    #[serde(alias = "processing")]
    Running,
    #[serde(alias = "synced")]
    Completed,
    #[serde(alias = "error")]
    Failed,
}

impl RemoteStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

/// One job as described by the backend (status and latest endpoints).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteJob {
    #[serde(default, alias = "id")]
    pub job_id: Option<String>,
    #[serde(default, alias = "pending_report_id")]
    pub pending_token: Option<String>,
    pub status: RemoteStatus,
    #[serde(default)]
    pub step: Option<String>,
    #[serde(default)]
    pub progress_pct: Option<u8>,
    #[serde(default, alias = "stats")]
    pub result: Option<Value>,
    #[serde(default, alias = "error_message")]
    pub error: Option<String>,
}

/// Answer to `generate`.
///
/// Backends answer either with an explicit `pending` flag or with a
/// `status` of `pending`/`completed`/`error`; both decode to this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "GenerateBody")]
pub struct GenerateResponse {
    pub pending: bool,
    pub pending_token: Option<String>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

#[derive(Deserialize)]
struct GenerateBody {
    #[serde(default)]
    pending: Option<bool>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, alias = "pending_report_id", alias = "_pending_report_id")]
    pending_token: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    /// Anything else; a status-style completion carries its counts here.
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl From<GenerateBody> for GenerateResponse {
    fn from(body: GenerateBody) -> Self {
        let status = body.status.unwrap_or_default();
        let pending = body
            .pending
            .unwrap_or(matches!(status.as_str(), "pending" | "processing" | "running"));
        // An error status always fails, even without a message.
        let error = match status.as_str() {
            "error" | "failed" => Some(body.error.or(body.message).unwrap_or_default()),
            _ => body.error,
        };
        let result = match body.result {
            Some(result) => Some(result),
            None if status == "completed" && !body.rest.is_empty() => Some(Value::Object(body.rest)),
            None => None,
        };
        Self {
            pending,
            pending_token: body.pending_token,
            result,
            error,
        }
    }
}
