//! Error types for the sync engine.

use liftlog_model::ModelError;
use liftlog_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error talking to the remote store.
    #[error("remote error: {message}")]
    Remote {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The remote store answered with a non-success status.
    #[error("remote rejected request with status {status}: {message}")]
    Rejected {
        /// HTTP-style status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The device is offline or the client refused to connect.
    #[error("not connected to remote store")]
    NotConnected,

    /// Input rejected before any state was touched.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ModelError),

    /// Local durable storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A request or response body could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// Configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Creates a retryable remote error.
    pub fn remote_retryable(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable remote error.
    pub fn remote_fatal(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if the failure is expected to clear on its own.
    ///
    /// Queued writes are retried regardless; this only classifies the
    /// failure for logging and for callers of the gateway.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Remote { retryable, .. } => *retryable,
            SyncError::Rejected { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            SyncError::NotConnected => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Codec(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::remote_retryable("connection reset").is_retryable());
        assert!(!SyncError::remote_fatal("bad certificate").is_retryable());
        assert!(SyncError::NotConnected.is_retryable());
        assert!(SyncError::Rejected {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());
        assert!(!SyncError::Rejected {
            status: 409,
            message: "conflict".into()
        }
        .is_retryable());
        assert!(!SyncError::Codec("eof".into()).is_retryable());
    }

    #[test]
    fn error_display() {
        assert_eq!(SyncError::NotConnected.to_string(), "not connected to remote store");

        let err = SyncError::Rejected {
            status: 401,
            message: "JWT expired".into(),
        };
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("JWT expired"));
    }

    #[test]
    fn model_errors_convert_to_invalid_input() {
        let err: SyncError = ModelError::InvalidReps("x".into()).into();
        assert!(matches!(err, SyncError::InvalidInput(_)));
    }
}
