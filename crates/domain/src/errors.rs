//! Error types used throughout the application

use thiserror::Error;

/// Main error type for CrossCal
#[derive(Error, Debug)]
pub enum SyncError {
    /// Transient failure talking to one of the three stores (timeout, 5xx).
    /// The event is skipped and will reappear on the next pass.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed upstream data. Dropped, never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The incremental-sync cursor is too old for the calendar collaborator.
    /// Callers fall back to a full listing; this is not a failure.
    #[error("sync cursor expired")]
    CursorExpired,

    /// An expected mirror record is missing downstream.
    #[error("not found: {0}")]
    NotFound(String),

    /// Durable state store read/write failure.
    #[error("state store error: {0}")]
    State(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Stable label for logging and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            SyncError::Network(_) => "network",
            SyncError::InvalidInput(_) => "invalid_input",
            SyncError::CursorExpired => "cursor_expired",
            SyncError::NotFound(_) => "not_found",
            SyncError::State(_) => "state",
            SyncError::Config(_) => "config",
            SyncError::Internal(_) => "internal",
        }
    }
}

/// Result type alias for CrossCal operations
pub type Result<T> = std::result::Result<T, SyncError>;
