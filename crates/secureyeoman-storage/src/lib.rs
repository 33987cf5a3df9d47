//! SecureYeoman Storage - namespaced key-value persistence.
//!
//! Every persistent store in the gateway (audit entries, memories, roles,
//! integrations, tasks, meta keys) lives behind the [`KvStore`] trait:
//!
//! - [`MemoryKvStore`] (always available): tests and ephemeral runs
//! - [`SurrealKvStore`] (behind the `kv` feature): embedded, versioned,
//!   ACID-compliant LSM-tree storage on disk
//!
//! # Namespacing
//!
//! All operations are scoped to a namespace such as `audit:entries` or
//! `soul:personalities`. A subsystem receives a [`ScopedKvStore`] bound to
//! its namespace and cannot reach keys outside it.
//!
//! Swapping the durable backend for the in-memory one is a constructor
//! choice, not a code change; the single process owns the data directory.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod kv;

pub use error::{StorageError, StorageResult};
pub use kv::{KvStore, MemoryKvStore, ScopedKvStore};

#[cfg(feature = "kv")]
pub use kv::SurrealKvStore;
