//! SecureYeoman Crypto - primitives for the audit chain and auth core.
//!
//! This crate provides:
//! - SHA-256 content hashing for audit chain linking
//! - HMAC-SHA256 signing keys and signatures
//! - Constant-time byte and string comparison
//! - Random key material generation (API keys, nonces)
//!
//! # Security Model
//!
//! The gateway holds one process-wide signing key. Every audit entry's hash
//! is signed with it; outbound webhook bodies are signed with per-webhook
//! secrets using the same HMAC construction. All secret comparisons go
//! through [`constant_time_eq`].

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod compare;
mod error;
mod hash;
mod keys;
mod signing;

pub use compare::constant_time_eq;
pub use error::{CryptoError, CryptoResult};
pub use hash::ContentHash;
pub use keys::{generate_api_key, generate_nonce, ApiKeyMaterial};
pub use signing::{HmacSignature, SigningKey};
