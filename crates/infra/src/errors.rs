//! Conversions from foreign error types into the domain taxonomy
//!
//! The newtype exists to satisfy the orphan rule: foreign errors convert
//! into `InfraError`, which in turn converts into `SyncError`.

use crosscal_domain::SyncError;

/// Wrapper carrying a domain error produced from an infrastructure failure.
#[derive(Debug)]
pub struct InfraError(pub SyncError);

impl From<reqwest::Error> for InfraError {
    fn from(err: reqwest::Error) -> Self {
        InfraError(SyncError::Network(format!("http transport error: {err}")))
    }
}

impl From<std::io::Error> for InfraError {
    fn from(err: std::io::Error) -> Self {
        InfraError(SyncError::State(format!("state file i/o error: {err}")))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(err: serde_json::Error) -> Self {
        InfraError(SyncError::State(format!("state serialisation error: {err}")))
    }
}

impl From<InfraError> for SyncError {
    fn from(err: InfraError) -> Self {
        err.0
    }
}
