// crates/jobs/src/lib.rs
//! Background job coordinator for the adsdesk dashboard.
//!
//! Supervises long-running backend operations (data sync, search term sync,
//! report generation) after the user starts them, keeps polling while the
//! UI navigates elsewhere, re-attaches after a reload, and notifies exactly
//! once per finished or failed job.
//!
//! Provides:
//! - `JobRegistry` — the shared coordinator (start / resume / dismiss / snapshot)
//! - `JobApi` — the remote job-control operations it drives
//! - `PollTransport` — status-query and resubmission polling behind one trait
//! - `NotificationSink` — where terminal-transition notifications go
//! - `DisplayWindow` — how long a completed job stays on screen

pub mod api;
pub mod config;
pub mod display;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod registry;
mod scheduler;
pub mod state;
pub mod transport;
pub mod types;

pub use api::{GenerateResponse, JobApi, RemoteJob, RemoteStatus, StartedJob};
pub use config::{CoordinatorConfig, KindConfig, TransportKind};
pub use display::DisplayWindow;
pub use error::{JobApiError, JobError};
pub use notify::{BroadcastSink, NoticeLevel, Notification, NotificationDispatcher, NotificationSink};
pub use registry::JobRegistry;
pub use state::SchedulerPhase;
pub use transport::{PollTransport, Progress};
pub use types::{ContextId, JobHandle, JobKind, JobRecord, JobStatus, JobView};
