// crates/server/src/routes/jobs.rs
//! API routes for supervised background jobs.
//!
//! - GET    /jobs/{context}              — Views of every kind (first call resumes)
//! - POST   /jobs/{context}/{kind}/start — Start a job (no-op while running)
//! - POST   /jobs/{context}/{kind}/resume — Re-attach to a job running remotely
//! - DELETE /jobs/{context}/{kind}       — Dismiss: stop tracking, reset to idle
//! - GET    /jobs/stream                 — SSE of job views and notifications

use std::convert::Infallible;
use std::sync::Arc;

use adsdesk_jobs::{ContextId, DisplayWindow, JobKind, JobRecord, JobStatus, JobView};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct StartResponse {
    /// False when a job of this kind was already running.
    pub started: bool,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct ResumeResponse {
    pub adopted: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamParams {
    /// Only forward events for this context.
    pub context: Option<String>,
}

fn parse_context(raw: &str) -> ApiResult<ContextId> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest("context must not be blank".to_string()));
    }
    Ok(ContextId::new(trimmed))
}

/// GET /api/jobs/{context} — One view per kind, display window applied.
async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Path(context): Path<String>,
) -> ApiResult<Json<Vec<JobView>>> {
    let context = parse_context(&context)?;
    let adopted = state.jobs.ensure_tracked(&context).await;
    if adopted > 0 {
        tracing::info!(context = %context, adopted, "Resumed jobs on first contact");
    }
    Ok(Json(state.jobs.views(&context, Utc::now())))
}

/// POST /api/jobs/{context}/{kind}/start
async fn start_job(
    State(state): State<Arc<AppState>>,
    Path((context, kind)): Path<(String, String)>,
) -> ApiResult<(StatusCode, Json<StartResponse>)> {
    let context = parse_context(&context)?;
    let kind: JobKind = kind.parse()?;
    let started = state.jobs.start(kind, &context);
    Ok((StatusCode::ACCEPTED, Json(StartResponse { started })))
}

/// POST /api/jobs/{context}/{kind}/resume
async fn resume_job(
    State(state): State<Arc<AppState>>,
    Path((context, kind)): Path<(String, String)>,
) -> ApiResult<Json<ResumeResponse>> {
    let context = parse_context(&context)?;
    let kind: JobKind = kind.parse()?;
    let adopted = state.jobs.resume(kind, &context).await;
    Ok(Json(ResumeResponse { adopted }))
}

/// DELETE /api/jobs/{context}/{kind}
async fn dismiss_job(
    State(state): State<Arc<AppState>>,
    Path((context, kind)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let context = parse_context(&context)?;
    let kind: JobKind = kind.parse()?;
    state.jobs.dismiss(kind, &context);
    Ok(StatusCode::NO_CONTENT)
}

fn json_event<T: Serialize>(name: &str, value: &T) -> Event {
    let json = serde_json::to_string(value).unwrap_or_default();
    Event::default().event(name).data(json)
}

/// Report a completion once more when it leaves the display window, so
/// stream consumers can hide it without polling.
fn watch_expiry(
    window: DisplayWindow,
    record: JobRecord,
    completed_at: DateTime<Utc>,
    expired: mpsc::UnboundedSender<JobRecord>,
    token: CancellationToken,
) {
    tokio::spawn(async move {
        let mut record = Some(record);
        let refresh = window.refresh_until_expired(completed_at, Utc::now, |visible| {
            if visible {
                return;
            }
            if let Some(record) = record.take() {
                // Receiver gone means the stream ended.
                let _ = expired.send(record);
            }
        });
        tokio::select! {
            _ = token.cancelled() => {}
            _ = refresh => {}
        }
    });
}

/// GET /api/jobs/stream — `job` events carrying a view for every committed
/// record change (and again when a completion expires from display),
/// `notification` events for every terminal transition.
async fn stream_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StreamParams>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let jobs = Arc::clone(&state.jobs);
    let window = jobs.display_window();
    let mut jobs_rx = jobs.subscribe();
    let mut notices_rx = state.notifications.subscribe();
    let (expired_tx, mut expired_rx) = mpsc::unbounded_channel::<JobRecord>();
    let filter = params.context.map(ContextId::new);

    // Ends with the server, or when the client drops the stream.
    let token = state.shutdown.child_token();
    let guard = token.clone().drop_guard();

    let stream = async_stream::stream! {
        let _guard = guard;
        loop {
            let event = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                record = jobs_rx.recv() => match record {
                    Ok(record) if filter.as_ref().map_or(true, |c| *c == record.context) => {
                        if let (JobStatus::Completed, Some(completed_at)) = (record.status, record.completed_at) {
                            watch_expiry(window, record.clone(), completed_at, expired_tx.clone(), token.clone());
                        }
                        let visible = window.is_visible(&record, Utc::now());
                        json_event("job", &JobView { record, visible })
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Job stream subscriber lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                expired = expired_rx.recv() => match expired {
                    Some(expired) => {
                        let view = jobs.view(expired.kind, &expired.context, Utc::now());
                        // Restarted or dismissed since: that change had its own event.
                        if view.record.status != JobStatus::Completed
                            || view.record.completed_at != expired.completed_at
                        {
                            continue;
                        }
                        json_event("job", &view)
                    }
                    None => break,
                },
                notice = notices_rx.recv() => match notice {
                    Ok(notice) if filter.as_ref().map_or(true, |c| *c == notice.context) => {
                        json_event("notification", &notice)
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Notification stream subscriber lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
            };
            yield Ok(event);
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Build the jobs router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs/stream", get(stream_jobs))
        .route("/jobs/{context}", get(list_jobs))
        .route("/jobs/{context}/{kind}", delete(dismiss_job))
        .route("/jobs/{context}/{kind}/start", post(start_job))
        .route("/jobs/{context}/{kind}/resume", post(resume_job))
}
