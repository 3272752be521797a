// crates/jobs/src/transport.rs
//! Poll transports: how a job kind is started, polled and rediscovered.
//!
//! The scheduler loop only ever sees [`Progress`]; whether that came from a
//! status endpoint or from resubmitting the original request is decided here.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::api::{GenerateResponse, JobApi, RemoteJob, RemoteStatus};
use crate::config::TransportKind;
use crate::error::JobApiError;
use crate::types::{ContextId, JobHandle, JobKind};

/// Step shown while a resubmission-style job reports "still processing".
pub const PENDING_STEP: &str = "Waiting for results…";

/// One answer from the remote side, normalised across transports.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Running {
        handle: JobHandle,
        step: Option<String>,
        progress_pct: Option<u8>,
    },
    Completed(Value),
    /// Backend-reported failure; message passed through verbatim.
    Failed(String),
}

#[async_trait]
pub trait PollTransport: Send + Sync {
    /// Transport name for logging.
    fn name(&self) -> &'static str;

    /// Issue the remote start.
    async fn begin(&self, context: &ContextId) -> Result<Progress, JobApiError>;

    /// Fetch the next answer for a running job.
    async fn poll(&self, context: &ContextId, handle: &JobHandle) -> Result<Progress, JobApiError>;

    /// Look for a job already in flight for this context. Only live jobs
    /// come back as `Some`; nothing or a terminal job is `None`.
    async fn find_live(&self, context: &ContextId) -> Result<Option<Progress>, JobApiError>;
}

/// Build the transport configured for `kind`.
pub fn for_kind(kind: JobKind, transport: TransportKind, api: Arc<dyn JobApi>) -> Arc<dyn PollTransport> {
    match transport {
        TransportKind::StatusQuery => Arc::new(StatusQueryTransport::new(kind, api)),
        TransportKind::Resubmit => Arc::new(ResubmitTransport::new(kind, api)),
    }
}

/// Start once, then ask a dedicated status endpoint by job id.
pub struct StatusQueryTransport {
    kind: JobKind,
    api: Arc<dyn JobApi>,
}

impl StatusQueryTransport {
    pub fn new(kind: JobKind, api: Arc<dyn JobApi>) -> Self {
        Self { kind, api }
    }

    fn progress_from(&self, job_id: &str, job: RemoteJob) -> Progress {
        match job.status {
            RemoteStatus::Pending | RemoteStatus::Running => Progress::Running {
                handle: JobHandle::JobId(job.job_id.unwrap_or_else(|| job_id.to_string())),
                step: job.step,
                progress_pct: job.progress_pct,
            },
            RemoteStatus::Completed => Progress::Completed(job.result.unwrap_or(Value::Null)),
            RemoteStatus::Failed => Progress::Failed(job.error.unwrap_or_default()),
        }
    }
}

#[async_trait]
impl PollTransport for StatusQueryTransport {
    fn name(&self) -> &'static str {
        "status-query"
    }

    async fn begin(&self, context: &ContextId) -> Result<Progress, JobApiError> {
        let started = self.api.start(self.kind, context).await?;
        Ok(Progress::Running {
            handle: JobHandle::JobId(started.job_id),
            step: None,
            progress_pct: None,
        })
    }

    async fn poll(&self, _context: &ContextId, handle: &JobHandle) -> Result<Progress, JobApiError> {
        let job_id = handle.as_str();
        let job = self.api.status(job_id).await?;
        Ok(self.progress_from(job_id, job))
    }

    async fn find_live(&self, context: &ContextId) -> Result<Option<Progress>, JobApiError> {
        let Some(job) = self.api.latest(self.kind, context).await? else {
            return Ok(None);
        };
        if !job.status.is_live() {
            return Ok(None);
        }
        let Some(job_id) = job.job_id.clone() else {
            return Ok(None);
        };
        Ok(Some(self.progress_from(&job_id, job)))
    }
}

/// Poll by resubmitting the original request with the last pending token.
pub struct ResubmitTransport {
    kind: JobKind,
    api: Arc<dyn JobApi>,
}

impl ResubmitTransport {
    pub fn new(kind: JobKind, api: Arc<dyn JobApi>) -> Self {
        Self { kind, api }
    }

    /// A pending answer may omit the token, meaning "same one as before".
    fn progress_from(&self, previous: Option<&str>, resp: GenerateResponse) -> Result<Progress, JobApiError> {
        if resp.pending {
            let token = resp
                .pending_token
                .or_else(|| previous.map(str::to_string))
                .ok_or_else(|| {
                    JobApiError::Protocol(format!(
                        "{} is still processing but no pending token was returned",
                        self.kind.label()
                    ))
                })?;
            return Ok(Progress::Running {
                handle: JobHandle::PendingToken(token),
                step: Some(PENDING_STEP.to_string()),
                progress_pct: None,
            });
        }
        if let Some(error) = resp.error {
            return Ok(Progress::Failed(error));
        }
        Ok(Progress::Completed(resp.result.unwrap_or(Value::Null)))
    }
}

#[async_trait]
impl PollTransport for ResubmitTransport {
    fn name(&self) -> &'static str {
        "resubmit"
    }

    async fn begin(&self, context: &ContextId) -> Result<Progress, JobApiError> {
        let resp = self.api.generate(self.kind, context, None).await?;
        self.progress_from(None, resp)
    }

    async fn poll(&self, context: &ContextId, handle: &JobHandle) -> Result<Progress, JobApiError> {
        let token = handle.as_str();
        let resp = self.api.generate(self.kind, context, Some(token)).await?;
        self.progress_from(Some(token), resp)
    }

    async fn find_live(&self, context: &ContextId) -> Result<Option<Progress>, JobApiError> {
        let Some(job) = self.api.latest(self.kind, context).await? else {
            return Ok(None);
        };
        if !job.status.is_live() {
            return Ok(None);
        }
        let Some(token) = job.pending_token.or(job.job_id) else {
            return Ok(None);
        };
        Ok(Some(Progress::Running {
            handle: JobHandle::PendingToken(token),
            step: job.step.or_else(|| Some(PENDING_STEP.to_string())),
            progress_pct: job.progress_pct,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::StartedJob;
    use serde_json::json;
    use std::sync::Mutex;

    /// Answers from fixed queues and records what was asked.
    #[derive(Default)]
    struct ScriptedApi {
        statuses: Mutex<Vec<RemoteJob>>,
        generated: Mutex<Vec<GenerateResponse>>,
        latest: Mutex<Option<RemoteJob>>,
        tokens_seen: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl JobApi for ScriptedApi {
        async fn start(&self, _kind: JobKind, _context: &ContextId) -> Result<StartedJob, JobApiError> {
            Ok(StartedJob { job_id: "job-1".into() })
        }

        async fn status(&self, _job_id: &str) -> Result<RemoteJob, JobApiError> {
            Ok(self.statuses.lock().unwrap().remove(0))
        }

        async fn latest(&self, _kind: JobKind, _context: &ContextId) -> Result<Option<RemoteJob>, JobApiError> {
            Ok(self.latest.lock().unwrap().clone())
        }

        async fn generate(
            &self,
            _kind: JobKind,
            _context: &ContextId,
            pending_token: Option<&str>,
        ) -> Result<GenerateResponse, JobApiError> {
            self.tokens_seen
                .lock()
                .unwrap()
                .push(pending_token.map(str::to_string));
            Ok(self.generated.lock().unwrap().remove(0))
        }
    }

    fn remote(status: RemoteStatus) -> RemoteJob {
        RemoteJob {
            job_id: Some("job-1".into()),
            pending_token: None,
            status,
            step: None,
            progress_pct: None,
            result: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_status_query_maps_remote_states() {
        let api = Arc::new(ScriptedApi::default());
        *api.statuses.lock().unwrap() = vec![
            RemoteJob {
                step: Some("Syncing".into()),
                progress_pct: Some(55),
                ..remote(RemoteStatus::Running)
            },
            RemoteJob {
                error: Some("Quota exceeded".into()),
                ..remote(RemoteStatus::Failed)
            },
        ];
        let transport = StatusQueryTransport::new(JobKind::DataSync, api);
        let ctx = ContextId::from("c1");

        let begun = transport.begin(&ctx).await.unwrap();
        let Progress::Running { handle, .. } = begun else {
            panic!("expected running");
        };
        assert_eq!(handle, JobHandle::JobId("job-1".into()));

        let next = transport.poll(&ctx, &handle).await.unwrap();
        assert_eq!(
            next,
            Progress::Running {
                handle: JobHandle::JobId("job-1".into()),
                step: Some("Syncing".into()),
                progress_pct: Some(55),
            }
        );

        let last = transport.poll(&ctx, &handle).await.unwrap();
        assert_eq!(last, Progress::Failed("Quota exceeded".into()));
    }

    #[tokio::test]
    async fn test_resubmit_carries_token_forward() {
        let api = Arc::new(ScriptedApi::default());
        *api.generated.lock().unwrap() = vec![
            GenerateResponse {
                pending: true,
                pending_token: Some("tok-a".into()),
                result: None,
                error: None,
            },
            GenerateResponse {
                pending: true,
                pending_token: None,
                result: None,
                error: None,
            },
            GenerateResponse {
                pending: false,
                pending_token: None,
                result: Some(json!({"campaigns": []})),
                error: None,
            },
        ];
        let transport = ResubmitTransport::new(JobKind::ReportGeneration, api.clone());
        let ctx = ContextId::from("c1");

        let Progress::Running { handle, .. } = transport.begin(&ctx).await.unwrap() else {
            panic!("expected pending");
        };
        assert_eq!(handle, JobHandle::PendingToken("tok-a".into()));

        let Progress::Running { handle, .. } = transport.poll(&ctx, &handle).await.unwrap() else {
            panic!("expected pending");
        };
        assert_eq!(handle, JobHandle::PendingToken("tok-a".into()));

        let done = transport.poll(&ctx, &handle).await.unwrap();
        assert_eq!(done, Progress::Completed(json!({"campaigns": []})));

        let seen = api.tokens_seen.lock().unwrap().clone();
        assert_eq!(seen, vec![None, Some("tok-a".into()), Some("tok-a".into())]);
    }

    #[tokio::test]
    async fn test_resubmit_pending_without_token_is_protocol_error() {
        let api = Arc::new(ScriptedApi::default());
        *api.generated.lock().unwrap() = vec![GenerateResponse {
            pending: true,
            pending_token: None,
            result: None,
            error: None,
        }];
        let transport = ResubmitTransport::new(JobKind::SearchTermSync, api);
        let err = transport.begin(&ContextId::from("c1")).await.unwrap_err();
        assert!(matches!(err, JobApiError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_find_live_ignores_terminal_jobs() {
        let api = Arc::new(ScriptedApi::default());
        *api.latest.lock().unwrap() = Some(remote(RemoteStatus::Completed));
        let transport = StatusQueryTransport::new(JobKind::DataSync, api.clone());
        assert!(transport.find_live(&ContextId::from("c1")).await.unwrap().is_none());

        *api.latest.lock().unwrap() = Some(RemoteJob {
            job_id: None,
            pending_token: Some("tok-z".into()),
            ..remote(RemoteStatus::Pending)
        });
        let resubmit = ResubmitTransport::new(JobKind::ReportGeneration, api);
        let found = resubmit.find_live(&ContextId::from("c1")).await.unwrap();
        assert_eq!(
            found,
            Some(Progress::Running {
                handle: JobHandle::PendingToken("tok-z".into()),
                step: Some(PENDING_STEP.into()),
                progress_pct: None,
            })
        );
    }
}
