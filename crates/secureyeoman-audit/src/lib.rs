//! SecureYeoman Audit - tamper-evident audit chain.
//!
//! Every security-relevant event in the gateway is recorded as a
//! hash-linked, HMAC-signed entry in an append-only sequence:
//!
//! - `previous_hash` links each entry to its predecessor (zero sentinel at
//!   sequence 1)
//! - `hash` is SHA-256 over the entry's canonical JSON form
//! - `signature` is HMAC-SHA256 of the hash under the process signing key
//! - `sequence` is gap-free and strictly monotone, starting at 1
//!
//! Any modification to a persisted entry breaks the chain and is detected
//! by [`AuditChain::verify`], which reports the first offending sequence.
//!
//! # Example
//!
//! ```
//! use secureyeoman_audit::{AuditChain, AuditEvent, AuditLevel};
//! use secureyeoman_crypto::SigningKey;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let key = SigningKey::new(vec![7u8; 32]).unwrap();
//! let chain = AuditChain::in_memory(key).await.unwrap();
//!
//! chain
//!     .record(AuditEvent::new("auth_success", AuditLevel::Info, "admin logged in"))
//!     .await
//!     .unwrap();
//!
//! let report = chain.verify(None).await.unwrap();
//! assert!(report.valid);
//! assert_eq!(report.entries_checked, 1);
//! # });
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod chain;
mod entry;
mod error;
mod storage;

pub use chain::{AuditChain, VerificationReport};
pub use entry::{AuditEntry, AuditEvent, AuditLevel};
pub use error::{AuditError, AuditResult};
pub use storage::{AuditQuery, AuditStorage, KvAuditStorage};
