//! Error taxonomy shared across the workspace.

use thiserror::Error;

/// Result type for irbridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types surfaced to callers.
#[derive(Debug, Error)]
pub enum Error {
    /// Name normalizes to an empty slug.
    #[error("invalid name: {0:?} normalizes to an empty identifier")]
    InvalidName(String),

    /// Device creation collided with an existing id.
    #[error("device id already exists: {0}")]
    DuplicateId(String),

    /// Device or command lookup failed.
    #[error("not found: {0}")]
    NotFound(String),

    /// Hub could not be reached during session preparation.
    #[error("hub unreachable: {0}")]
    HubUnreachable(String),

    /// A capture session for this (device, command) pair is already running.
    #[error("a learning session for {device_id}/{command_name} is already in progress")]
    SessionInProgress {
        device_id: String,
        command_name: String,
    },

    /// Capture session hit its deadline.
    #[error("capture timed out during {phase}")]
    CaptureTimeout { phase: String },

    /// Capture session was cancelled by the caller.
    #[error("capture cancelled")]
    CaptureCancelled,

    /// Hub reported a failure mid-capture.
    #[error("hub error: {0}")]
    Hub(String),

    /// Underlying storage failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl Error {
    /// Check whether the error is a terminal session outcome (no data persisted).
    pub fn is_session_terminal(&self) -> bool {
        matches!(
            self,
            Error::CaptureTimeout { .. } | Error::CaptureCancelled | Error::HubUnreachable(_)
        )
    }

    /// Check whether the caller can recover by correcting input.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InvalidName(_)
                | Error::DuplicateId(_)
                | Error::NotFound(_)
                | Error::SessionInProgress { .. }
        )
    }
}
