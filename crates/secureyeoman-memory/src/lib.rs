//! SecureYeoman Memory - vector-indexed long-term memory.
//!
//! This crate provides:
//! - Memory records with importance, access tracking, and optional expiry
//! - A pluggable vector index: an in-process flat index with unit-normalized
//!   vectors, tombstoning, compaction, and an on-disk sidecar that survives
//!   restarts
//! - A quick deduplication pass on every save (`deduped` / `flagged` /
//!   `clean`)
//! - Scheduled deep consolidation: an AI-assisted pass that merges,
//!   replaces, or updates near-duplicate memory groups, with a
//!   threshold-based fallback when no provider is configured

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod consolidation;
mod embedder;
mod error;
mod index;
mod store;
mod types;

pub use consolidation::{
    ConsolidationAction, ConsolidationActionKind, ConsolidationConfig, ConsolidationManager,
    ConsolidationSummary, parse_actions,
};
pub use embedder::{Embedder, HashingEmbedder};
pub use error::{MemoryError, MemoryResult};
pub use index::{FlatVectorIndex, SearchHit, VectorIndex};
pub use store::{MemoryStats, MemoryStore, QuickCheckOutcome, QuickCheckThresholds};
pub use types::{MemoryRecord, MemoryType};
