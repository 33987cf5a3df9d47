//! Audit entry types.
//!
//! Entries are chain-linked (each carries the hash of the previous) and
//! signed by the process signing key. Hashing covers the canonical JSON
//! form of every field up to and including `previous_hash`; the signature
//! covers the hex form of the hash.

use secureyeoman_core::{EntryId, Timestamp, canonical_json_value};
use secureyeoman_crypto::{ContentHash, HmacSignature, SigningKey};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

use crate::error::{AuditError, AuditResult};

/// Severity of an audited event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    /// Fine-grained diagnostics.
    Trace,
    /// Debug detail.
    Debug,
    /// Routine events.
    Info,
    /// Denials and suspicious activity.
    Warn,
    /// Failures.
    Error,
    /// Unrecoverable failures.
    Fatal,
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
        };
        write!(f, "{s}")
    }
}

/// An event to be recorded, before chain linking.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Short event tag (`auth_failure`, `task_submitted`, …).
    pub event: String,
    /// Severity.
    pub level: AuditLevel,
    /// Human-readable message.
    pub message: String,
    /// Principal involved, if any.
    pub user_id: Option<String>,
    /// Correlates related entries (e.g. one inbound message's pipeline).
    pub correlation_id: Option<String>,
    /// Free-form structured detail. Must not contain non-integer numbers.
    pub metadata: Value,
}

impl AuditEvent {
    /// Create an event with empty metadata.
    #[must_use]
    pub fn new(event: impl Into<String>, level: AuditLevel, message: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            level,
            message: message.into(),
            user_id: None,
            correlation_id: None,
            metadata: Value::Object(serde_json::Map::new()),
        }
    }

    /// Attach the acting principal.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Attach a correlation id.
    #[must_use]
    pub fn with_correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Attach structured metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A single entry in the audit chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry identifier.
    pub id: EntryId,
    /// Position in the chain, starting at 1, gap-free.
    pub sequence: u64,
    /// When this entry was created (epoch milliseconds).
    pub timestamp: Timestamp,
    /// Short event tag.
    pub event: String,
    /// Severity.
    pub level: AuditLevel,
    /// Human-readable message.
    pub message: String,
    /// Principal involved, if any.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Correlation id, if any.
    #[serde(default)]
    pub correlation_id: Option<String>,
    /// Free-form structured detail.
    #[serde(default)]
    pub metadata: Value,
    /// Hash of the previous entry (zero sentinel at sequence 1).
    pub previous_hash: ContentHash,
    /// SHA-256 over this entry's canonical form.
    pub hash: ContentHash,
    /// HMAC-SHA256 of `hash` under the process signing key.
    pub signature: HmacSignature,
}

impl AuditEntry {
    /// Build, hash, and sign a new entry.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::NonCanonicalMetadata`] if the event metadata
    /// contains non-integer numbers (which have no deterministic encoding).
    pub fn create(
        sequence: u64,
        event: AuditEvent,
        previous_hash: ContentHash,
        signing_key: &SigningKey,
    ) -> AuditResult<Self> {
        let mut entry = Self {
            id: EntryId::new(),
            sequence,
            timestamp: Timestamp::now(),
            event: event.event,
            level: event.level,
            message: event.message,
            user_id: event.user_id,
            correlation_id: event.correlation_id,
            metadata: event.metadata,
            previous_hash,
            hash: ContentHash::zero(),
            signature: HmacSignature::from_bytes([0u8; 32]),
        };

        entry.hash = entry.content_hash()?;
        entry.signature = signing_key.sign(entry.hash.to_hex().as_bytes());
        Ok(entry)
    }

    /// The canonical JSON form that `hash` covers: every field in stable
    /// order, excluding `hash` and `signature` themselves.
    fn signing_value(&self) -> Value {
        json!({
            "id": self.id.to_string(),
            "sequence": self.sequence,
            "timestamp": self.timestamp,
            "event": self.event,
            "level": self.level,
            "message": self.message,
            "userId": self.user_id,
            "correlationId": self.correlation_id,
            "metadata": self.metadata,
            "previousHash": self.previous_hash.to_hex(),
        })
    }

    /// Recompute the content hash from the entry's fields.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::NonCanonicalMetadata`] if the metadata contains
    /// non-integer numbers.
    pub fn content_hash(&self) -> AuditResult<ContentHash> {
        let canonical = canonical_json_value(&self.signing_value())
            .map_err(|e| AuditError::NonCanonicalMetadata(e.to_string()))?;
        Ok(ContentHash::hash(canonical.as_bytes()))
    }

    /// Verify the signature over the stored hash.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::SignatureInvalid`] if verification fails.
    pub fn verify_signature(&self, signing_key: &SigningKey) -> AuditResult<()> {
        signing_key
            .verify(self.hash.to_hex().as_bytes(), &self.signature)
            .map_err(|_| AuditError::SignatureInvalid {
                sequence: self.sequence,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> SigningKey {
        SigningKey::new(vec![9u8; 32]).unwrap()
    }

    #[test]
    fn test_entry_creation_and_signature() {
        let key = test_key();
        let entry = AuditEntry::create(
            1,
            AuditEvent::new("auth_success", AuditLevel::Info, "admin logged in")
                .with_user("admin"),
            ContentHash::zero(),
            &key,
        )
        .unwrap();

        assert_eq!(entry.sequence, 1);
        assert!(entry.previous_hash.is_zero());
        assert_eq!(entry.content_hash().unwrap(), entry.hash);
        assert!(entry.verify_signature(&key).is_ok());
    }

    #[test]
    fn test_tampered_message_changes_hash() {
        let key = test_key();
        let mut entry = AuditEntry::create(
            1,
            AuditEvent::new("task_submitted", AuditLevel::Info, "original"),
            ContentHash::zero(),
            &key,
        )
        .unwrap();

        entry.message = "TAMPERED".to_string();
        assert_ne!(entry.content_hash().unwrap(), entry.hash);
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let entry = AuditEntry::create(
            1,
            AuditEvent::new("auth_failure", AuditLevel::Warn, "bad password"),
            ContentHash::zero(),
            &test_key(),
        )
        .unwrap();

        let other = SigningKey::new(vec![1u8; 32]).unwrap();
        assert!(matches!(
            entry.verify_signature(&other),
            Err(AuditError::SignatureInvalid { sequence: 1 })
        ));
    }

    #[test]
    fn test_float_metadata_rejected() {
        let result = AuditEntry::create(
            1,
            AuditEvent::new("event", AuditLevel::Info, "msg")
                .with_metadata(json!({"score": 0.7})),
            ContentHash::zero(),
            &test_key(),
        );
        assert!(matches!(result, Err(AuditError::NonCanonicalMetadata(_))));
    }

    #[test]
    fn test_integer_metadata_allowed() {
        let entry = AuditEntry::create(
            1,
            AuditEvent::new("event", AuditLevel::Info, "msg")
                .with_metadata(json!({"durationMs": 1500})),
            ContentHash::zero(),
            &test_key(),
        )
        .unwrap();
        assert_eq!(entry.content_hash().unwrap(), entry.hash);
    }
}
