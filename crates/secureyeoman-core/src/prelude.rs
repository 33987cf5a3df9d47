//! Prelude module - commonly used types for convenient import.
//!
//! Use `use secureyeoman_core::prelude::*;` to import all essential types.

pub use crate::canonical::{canonical_json, canonical_json_value, CanonicalError};
pub use crate::error::{ErrorKind, YeomanError, YeomanResult};
pub use crate::ids::{
    ApiKeyId, EntryId, ExtensionId, IntegrationId, KnowledgeId, MemoryId, MessageId,
    PersonalityId, RoleId, SkillId, TaskId, WebhookId,
};
pub use crate::time::Timestamp;
