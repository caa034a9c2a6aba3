//! Error types surfaced by the monitoring core

use std::time::Duration;
use thiserror::Error;

/// Errors raised while scoring or deriving alerts
#[derive(Debug, Error)]
pub enum DetectionError {
    /// Empty or malformed batch; caller error, never retried
    #[error("invalid batch: {0}")]
    InvalidBatch(String),

    /// Paired inputs disagree in length
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Delivery failure reported by a notifier transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("authentication rejected: {0}")]
    AuthFailure(String),

    #[error("connection failed: {0}")]
    ConnectionFailure(String),

    #[error("notification timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),
}

impl NotifyError {
    /// Short machine-readable kind used in logs and metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            NotifyError::AuthFailure(_) => "auth_failure",
            NotifyError::ConnectionFailure(_) => "connection_failure",
            NotifyError::Timeout(_) => "timeout",
            NotifyError::InvalidRecipient(_) => "invalid_recipient",
        }
    }
}

/// Failure that aborts an orchestrator pass
#[derive(Debug, Error)]
pub enum PassError {
    #[error("metric collection failed: {0:#}")]
    Collection(anyhow::Error),

    #[error(transparent)]
    Detection(#[from] DetectionError),
}
