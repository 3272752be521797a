// crates/jobs/src/error.rs
//! Error types for the job coordinator.

use thiserror::Error;

/// Errors returned by a [`crate::api::JobApi`] implementation.
///
/// Any of these during `start` or a poll fetch moves the job straight to
/// `failed` with the error's display text. There is no retry.
#[derive(Debug, Error)]
pub enum JobApiError {
    /// Connection refused, DNS failure, timeout and the like.
    #[error("Network error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status. `message` is the
    /// backend's own detail text when it sent one.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// The backend answered, but not with anything we could decode.
    #[error("Unexpected response from job API: {0}")]
    Decode(String),

    /// The answer decoded but broke the job-control contract
    /// (e.g. "pending" without a token to resubmit).
    #[error("{0}")]
    Protocol(String),
}

/// Coordinator-level errors surfaced to callers.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Unknown job kind: {0}")]
    UnknownKind(String),
}
