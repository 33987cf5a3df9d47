//! Crypto error types.

use thiserror::Error;

/// Errors from cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key material below the minimum length.
    #[error("signing key too short: {len} bytes, minimum {min}")]
    KeyTooShort {
        /// Supplied length.
        len: usize,
        /// Required minimum.
        min: usize,
    },

    /// A signature failed verification.
    #[error("signature verification failed")]
    SignatureMismatch,

    /// Hex or other decoding failed.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
