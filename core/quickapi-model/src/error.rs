//! Error types for the model layer.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while interpreting descriptors or binding records.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The payload does not fit the entity's record shape.
    #[error("invalid record: {0}")]
    InvalidRecord(#[from] serde_json::Error),

    /// A record handler refused the payload.
    #[error("record rejected: {0}")]
    Rejected(String),

    /// A kind string that names neither storage representation.
    #[error("unknown entity kind: {0}")]
    UnknownKind(String),
}
