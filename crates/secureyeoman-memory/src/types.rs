//! Memory record types.

use std::collections::HashMap;

use secureyeoman_core::{MemoryId, PersonalityId, Timestamp};
use serde::{Deserialize, Serialize};

/// Kind of memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Facts and preferences.
    Semantic,
    /// Events and experiences.
    Episodic,
    /// How-to knowledge.
    Procedural,
    /// Short-lived scratch state.
    Working,
}

/// A long-term memory record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique identifier.
    pub id: MemoryId,
    /// Owning personality; `None` = global.
    #[serde(default)]
    pub personality_id: Option<PersonalityId>,
    /// Memory kind.
    pub memory_type: MemoryType,
    /// The remembered content.
    pub content: String,
    /// Where this memory came from.
    pub source: String,
    /// Importance in `[0, 1]`.
    pub importance: f64,
    /// How many times this memory has been recalled.
    pub access_count: u64,
    /// Last recall time.
    #[serde(default)]
    pub last_accessed_at: Option<Timestamp>,
    /// Expiry, if the memory should age out.
    #[serde(default)]
    pub expires_at: Option<Timestamp>,
    /// Free-form context tags.
    #[serde(default)]
    pub context: HashMap<String, String>,
    /// Unit-normalized embedding, once computed.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last update time.
    pub updated_at: Timestamp,
}

impl MemoryRecord {
    /// Create a semantic memory with importance 0.5.
    #[must_use]
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        let now = Timestamp::now();
        Self {
            id: MemoryId::new(),
            personality_id: None,
            memory_type: MemoryType::Semantic,
            content: content.into(),
            source: source.into(),
            importance: 0.5,
            access_count: 0,
            last_accessed_at: None,
            expires_at: None,
            context: HashMap::new(),
            embedding: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the memory type.
    #[must_use]
    pub fn with_type(mut self, memory_type: MemoryType) -> Self {
        self.memory_type = memory_type;
        self
    }

    /// Set the importance (clamped to `[0, 1]`).
    #[must_use]
    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }

    /// Scope to a personality.
    #[must_use]
    pub fn for_personality(mut self, personality_id: PersonalityId) -> Self {
        self.personality_id = Some(personality_id);
        self
    }

    /// Whether the memory has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|t| t.is_past())
    }
}
