//! Time-ordered opaque identifiers.
//!
//! Every entity in the gateway is identified by a UUIDv7: 128 bits, with a
//! millisecond timestamp prefix so lexicographic order approximates creation
//! order. Identifiers are opaque to callers and rendered as plain UUID
//! strings on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new time-ordered ID.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Create an ID from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse an ID from its string form.
            ///
            /// # Errors
            ///
            /// Returns an error if the string is not a valid UUID.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

id_type!(
    /// Unique identifier for an audit entry.
    EntryId
);
id_type!(
    /// Unique identifier for a memory record.
    MemoryId
);
id_type!(
    /// Unique identifier for a knowledge record.
    KnowledgeId
);
id_type!(
    /// Unique identifier for a task.
    TaskId
);
id_type!(
    /// Unique identifier for a role.
    RoleId
);
id_type!(
    /// Unique identifier for an API key record.
    ApiKeyId
);
id_type!(
    /// Unique identifier for an integration.
    IntegrationId
);
id_type!(
    /// Unique identifier for a unified message.
    MessageId
);
id_type!(
    /// Unique identifier for an extension.
    ExtensionId
);
id_type!(
    /// Unique identifier for an outbound webhook.
    WebhookId
);
id_type!(
    /// Unique identifier for a personality.
    PersonalityId
);
id_type!(
    /// Unique identifier for a skill.
    SkillId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_time_ordered() {
        let a = TaskId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = TaskId::new();

        // UUIDv7 sorts lexicographically by creation time.
        assert!(a.to_string() < b.to_string());
        assert!(a < b);
    }

    #[test]
    fn test_parse_round_trip() {
        let id = MemoryId::new();
        let parsed = MemoryId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_serde_transparent() {
        let id = EntryId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
