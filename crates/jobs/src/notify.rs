// crates/jobs/src/notify.rs
//! Notification dispatch on terminal transitions.
//!
//! Only the step *into* `completed` or `failed` produces a notification.
//! Re-reading a terminal record, or a late poll that lands on an already
//! terminal record, produces nothing.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::state::Transition;
use crate::types::{ContextId, JobKind, JobRecord, JobStatus};

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A user-facing notification about one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: JobKind,
    pub context: ContextId,
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
    /// True for the OS-level copy of a notification.
    pub os: bool,
    pub timestamp: String,
}

/// Where notifications end up.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// In-app notification.
    fn notify(&self, notice: &Notification);

    /// OS-level notification. Only called once permission was granted.
    fn os_notify(&self, notice: &Notification);

    /// Ask the user for OS notification permission.
    async fn request_permission(&self) -> bool;
}

const PERMISSION_UNKNOWN: u8 = 0;
const PERMISSION_GRANTED: u8 = 1;
const PERMISSION_DENIED: u8 = 2;

/// Turns terminal transitions into notifications.
pub struct NotificationDispatcher {
    sink: Arc<dyn NotificationSink>,
    permission: Arc<AtomicU8>,
}

impl NotificationDispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            sink,
            permission: Arc::new(AtomicU8::new(PERMISSION_UNKNOWN)),
        }
    }

    pub fn permission_granted(&self) -> bool {
        self.permission.load(Ordering::Relaxed) == PERMISSION_GRANTED
    }

    /// Best-effort, non-blocking permission request. Once granted it is not
    /// asked again.
    pub fn request_permission(&self) {
        if self.permission_granted() {
            return;
        }
        let sink = Arc::clone(&self.sink);
        let permission = Arc::clone(&self.permission);
        tokio::spawn(async move {
            let granted = sink.request_permission().await;
            let value = if granted { PERMISSION_GRANTED } else { PERMISSION_DENIED };
            permission.store(value, Ordering::Relaxed);
            if !granted {
                tracing::debug!("OS notification permission not granted");
            }
        });
    }

    /// Fire for `transition` if it entered a terminal state. Returns whether
    /// anything was sent.
    pub fn observe(&self, transition: &Transition) -> bool {
        if !transition.entered_terminal() {
            return false;
        }
        let Some(notice) = compose(&transition.record) else {
            return false;
        };
        tracing::info!(
            kind = %notice.kind,
            context = %notice.context,
            title = %notice.title,
            "Job notification"
        );
        self.sink.notify(&notice);
        if self.permission_granted() {
            let os_notice = Notification { os: true, ..notice };
            self.sink.os_notify(&os_notice);
        }
        true
    }
}

/// Build the notification for a terminal record. `None` for non-terminal.
pub fn compose(record: &JobRecord) -> Option<Notification> {
    let (level, title, message) = match record.status {
        JobStatus::Completed => {
            let result = record.result.as_ref().unwrap_or(&Value::Null);
            let (title, message) = completed_message(record.kind, result);
            (NoticeLevel::Success, title, message)
        }
        JobStatus::Failed => (
            NoticeLevel::Error,
            format!("{} failed", record.kind.label()),
            record.error.clone().unwrap_or_default(),
        ),
        JobStatus::Idle | JobStatus::Running => return None,
    };
    Some(Notification {
        kind: record.kind,
        context: record.context.clone(),
        level,
        title,
        message,
        os: false,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

fn completed_message(kind: JobKind, result: &Value) -> (String, String) {
    // The sync endpoint nests its counts under "stats".
    let summary = result.get("stats").unwrap_or(result);
    let count = |key: &str| summary.get(key).and_then(Value::as_u64).unwrap_or(0);
    match kind {
        JobKind::DataSync => (
            "Sync complete".to_string(),
            format!(
                "Synced {} campaigns, {} ad groups, {} targets, {} ads",
                count("campaigns"),
                count("ad_groups"),
                count("targets"),
                count("ads"),
            ),
        ),
        JobKind::SearchTermSync => (
            "Search terms synced".to_string(),
            format!("{} search term rows stored", count("rows_stored")),
        ),
        JobKind::ReportGeneration => {
            let message = match summary.get("campaigns").and_then(Value::as_array) {
                Some(campaigns) => format!(
                    "Performance report generated for {} campaigns",
                    campaigns.len()
                ),
                None => "Performance report generated".to_string(),
            };
            ("Report ready".to_string(), message)
        }
    }
}

/// Default sink: publishes every notification on a broadcast channel for UI
/// consumers (SSE) and logs it.
pub struct BroadcastSink {
    tx: broadcast::Sender<Notification>,
    os_enabled: bool,
}

impl BroadcastSink {
    pub fn new(capacity: usize, os_enabled: bool) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, os_enabled }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl NotificationSink for BroadcastSink {
    fn notify(&self, notice: &Notification) {
        let _ = self.tx.send(notice.clone());
    }

    fn os_notify(&self, notice: &Notification) {
        let _ = self.tx.send(notice.clone());
    }

    async fn request_permission(&self) -> bool {
        self.os_enabled
    }
}
