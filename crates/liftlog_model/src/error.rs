//! Error types for model validation and decoding.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors produced while validating input or decoding stored payloads.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The weight field is not a non-negative number.
    #[error("invalid weight {0:?}")]
    InvalidWeight(String),

    /// The reps field is not a non-negative integer.
    #[error("invalid reps {0:?}")]
    InvalidReps(String),

    /// A set position does not fit the remote `set_index` column.
    #[error("set index {0} out of range")]
    SetIndexOutOfRange(usize),

    /// A stored payload does not match the shape of its action.
    #[error("malformed {action} payload: {source}")]
    MalformedPayload {
        /// The action tag of the payload.
        action: &'static str,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A payload could not be encoded.
    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}
