//! SecureYeoman Core - Foundation types for the secure agent gateway.
//!
//! This crate provides:
//! - Time-ordered opaque identifiers (UUIDv7) for every entity
//! - Millisecond-precision timestamps
//! - The process-wide error taxonomy ([`ErrorKind`]) with HTTP mapping
//! - Canonical JSON encoding for hashing and deterministic comparison

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod canonical;
pub mod error;
pub mod ids;
pub mod time;

pub use canonical::{canonical_json, canonical_json_value, CanonicalError};
pub use error::{ErrorKind, YeomanError, YeomanResult};
pub use ids::{
    ApiKeyId, EntryId, ExtensionId, IntegrationId, KnowledgeId, MemoryId, MessageId,
    PersonalityId, RoleId, SkillId, TaskId, WebhookId,
};
pub use time::Timestamp;
