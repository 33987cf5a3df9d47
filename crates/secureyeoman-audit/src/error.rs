//! Audit error types.

use secureyeoman_core::{ErrorKind, YeomanError};
use thiserror::Error;

/// Errors from the audit subsystem.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Persistence failed; the chain is unchanged.
    #[error("audit storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Entry (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Event metadata has no deterministic canonical form.
    #[error("metadata is not canonicalizable: {0}")]
    NonCanonicalMetadata(String),

    /// An entry's signature failed verification.
    #[error("Signature verification failed at sequence {sequence}")]
    SignatureInvalid {
        /// First offending sequence number.
        sequence: u64,
    },

    /// An entry's `previous_hash` does not match its predecessor.
    #[error("Chain link broken at sequence {sequence}")]
    ChainBroken {
        /// First offending sequence number.
        sequence: u64,
    },

    /// A sequence number is missing from storage.
    #[error("Chain link broken: missing sequence {sequence}")]
    MissingSequence {
        /// The absent sequence number.
        sequence: u64,
    },
}

impl From<AuditError> for YeomanError {
    fn from(err: AuditError) -> Self {
        let kind = match &err {
            AuditError::StorageUnavailable(_) | AuditError::Serialization(_) => {
                ErrorKind::StorageUnavailable
            },
            AuditError::NonCanonicalMetadata(_) => ErrorKind::InvalidInput,
            AuditError::SignatureInvalid { .. } => ErrorKind::SignatureInvalid,
            AuditError::ChainBroken { .. } | AuditError::MissingSequence { .. } => {
                ErrorKind::ChainBroken
            },
        };
        Self::new(kind, err.to_string())
    }
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
