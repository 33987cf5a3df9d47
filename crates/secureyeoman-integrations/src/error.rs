//! Integration error types.

use secureyeoman_core::{ErrorKind, YeomanError};
use thiserror::Error;

/// Errors from the integration subsystem.
#[derive(Debug, Error)]
pub enum IntegrationError {
    /// Integration not found.
    #[error("integration not found: {0}")]
    NotFound(String),

    /// No adapter registered for the platform.
    #[error("no adapter for platform: {0}")]
    NoAdapter(String),

    /// A webhook signature failed verification.
    #[error("webhook signature invalid")]
    SignatureInvalid,

    /// Platform event could not be parsed.
    #[error("invalid platform event: {0}")]
    InvalidEvent(String),

    /// Platform send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Persistence failed.
    #[error("integration storage unavailable: {0}")]
    Storage(String),

    /// Audit recording failed.
    #[error("audit error: {0}")]
    Audit(#[from] secureyeoman_audit::AuditError),
}

impl From<IntegrationError> for YeomanError {
    fn from(err: IntegrationError) -> Self {
        let kind = match &err {
            IntegrationError::NotFound(_) => ErrorKind::NotFound,
            IntegrationError::NoAdapter(_) => ErrorKind::PreconditionFailed,
            IntegrationError::SignatureInvalid => ErrorKind::SignatureInvalid,
            IntegrationError::InvalidEvent(_) => ErrorKind::InvalidInput,
            IntegrationError::SendFailed(_) => ErrorKind::Network,
            IntegrationError::Storage(_) | IntegrationError::Audit(_) => {
                ErrorKind::StorageUnavailable
            },
        };
        Self::new(kind, err.to_string())
    }
}

/// Result type for integration operations.
pub type IntegrationResult<T> = Result<T, IntegrationError>;
