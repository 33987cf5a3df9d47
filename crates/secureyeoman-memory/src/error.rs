//! Memory error types.

use secureyeoman_core::{ErrorKind, YeomanError};
use thiserror::Error;

/// Errors from the memory subsystem.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Memory not found.
    #[error("memory not found: {0}")]
    NotFound(String),

    /// Vector dimensionality mismatch.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Index dimension.
        expected: usize,
        /// Supplied vector dimension.
        got: usize,
    },

    /// Sidecar or vector file I/O failed.
    #[error("index I/O error: {0}")]
    IndexIo(String),

    /// Persistence failed.
    #[error("memory storage unavailable: {0}")]
    Storage(String),

    /// Consolidation run failed.
    #[error("consolidation failed: {0}")]
    Consolidation(String),

    /// Consolidation run exceeded its timeout.
    #[error("consolidation timed out after {timeout_secs}s")]
    Timeout {
        /// Configured timeout.
        timeout_secs: u64,
    },

    /// The cron expression could not be parsed.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
}

impl From<MemoryError> for YeomanError {
    fn from(err: MemoryError) -> Self {
        let kind = match &err {
            MemoryError::NotFound(_) => ErrorKind::NotFound,
            MemoryError::DimensionMismatch { .. } | MemoryError::InvalidSchedule(_) => {
                ErrorKind::InvalidInput
            },
            MemoryError::IndexIo(_) | MemoryError::Storage(_) => ErrorKind::StorageUnavailable,
            MemoryError::Consolidation(_) => ErrorKind::Internal,
            MemoryError::Timeout { .. } => ErrorKind::Timeout,
        };
        Self::new(kind, err.to_string())
    }
}

/// Result type for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
