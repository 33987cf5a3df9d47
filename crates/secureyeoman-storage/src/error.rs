//! Storage error types.

use thiserror::Error;

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be opened.
    #[error("storage connection failed: {0}")]
    Connection(String),

    /// A namespace or key failed validation.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Value (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Backend operation failed.
    #[error("storage error: {0}")]
    Internal(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
