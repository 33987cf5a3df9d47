//! Prelude module - commonly used types for convenient import.

pub use crate::consolidation::{
    ConsolidationAction, ConsolidationActionKind, ConsolidationConfig, ConsolidationManager,
    ConsolidationSummary, parse_actions,
};
pub use crate::embedder::{Embedder, HashingEmbedder};
pub use crate::error::{MemoryError, MemoryResult};
pub use crate::index::{FlatVectorIndex, SearchHit, VectorIndex};
pub use crate::store::{MemoryStats, MemoryStore, QuickCheckOutcome, QuickCheckThresholds};
pub use crate::types::{MemoryRecord, MemoryType};
