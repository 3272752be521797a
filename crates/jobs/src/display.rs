// crates/jobs/src/display.rs
//! Completion display window.
//!
//! A completed record stays visible for a fixed window after `completed_at`,
//! then reads as dismissed. This is computed at display time only; the record
//! itself is never touched.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::{JobRecord, JobStatus};

/// Refresh cadence cap while a completion is still on screen.
const MAX_REFRESH: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayWindow {
    window: Duration,
}

impl DisplayWindow {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Time left before a completion stops showing, or `None` once expired.
    pub fn remaining(&self, completed_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
        // A clock that went backwards reads as "just completed".
        let elapsed = (now - completed_at).to_std().unwrap_or_default();
        self.window.checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    /// `now - completed_at < window`.
    pub fn is_within(&self, completed_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.remaining(completed_at, now).is_some()
    }

    /// Idle never shows, running and failed always do, completed only
    /// inside the window.
    pub fn is_visible(&self, record: &JobRecord, now: DateTime<Utc>) -> bool {
        match record.status {
            JobStatus::Idle => false,
            JobStatus::Running | JobStatus::Failed => true,
            JobStatus::Completed => record
                .completed_at
                .is_some_and(|at| self.is_within(at, now)),
        }
    }

    /// Delay until the next visibility recheck: at most one second, never
    /// past expiry. `None` once there is nothing left to refresh.
    pub fn next_refresh(&self, completed_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
        self.remaining(completed_at, now).map(|d| d.min(MAX_REFRESH))
    }

    /// Call `on_tick(visible)` at the refresh cadence until the window closes.
    /// The final call reports `false`; no wakeups are scheduled after it.
    pub async fn refresh_until_expired<C, F>(&self, completed_at: DateTime<Utc>, now: C, mut on_tick: F)
    where
        C: Fn() -> DateTime<Utc>,
        F: FnMut(bool),
    {
        while let Some(delay) = self.next_refresh(completed_at, now()) {
            on_tick(true);
            tokio::time::sleep(delay).await;
        }
        on_tick(false);
    }
}

impl Default for DisplayWindow {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_DISPLAY_WINDOW)
    }
}
