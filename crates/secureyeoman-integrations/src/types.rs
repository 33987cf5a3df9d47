//! Integration records and the unified message shape.

use secureyeoman_core::{IntegrationId, MessageId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operational state of an integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    /// Configured but not started.
    Stopped,
    /// Running and healthy.
    Running,
    /// Running but failing health checks.
    Degraded,
    /// Start failed.
    Error,
}

/// A configured platform integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationRecord {
    /// Unique identifier.
    pub id: IntegrationId,
    /// Platform tag (`telegram`, `line`, `github`, …).
    pub platform: String,
    /// Display name.
    pub display_name: String,
    /// Whether inbound/outbound traffic flows.
    pub enabled: bool,
    /// Operational state.
    pub status: IntegrationStatus,
    /// Platform configuration. Contains sensitive fields; always pass
    /// through [`redact_config`] before returning to callers.
    pub config: Value,
    /// Messages processed.
    pub message_count: u64,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last update time.
    pub updated_at: Timestamp,
}

impl IntegrationRecord {
    /// Create a stopped, enabled integration.
    #[must_use]
    pub fn new(platform: impl Into<String>, display_name: impl Into<String>, config: Value) -> Self {
        let now = Timestamp::now();
        Self {
            id: IntegrationId::new(),
            platform: platform.into(),
            display_name: display_name.into(),
            enabled: true,
            status: IntegrationStatus::Stopped,
            config,
            message_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// A copy safe to return to API callers.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.config = redact_config(&self.config);
        copy
    }
}

const SENSITIVE_KEY_FRAGMENTS: &[&str] = &["token", "secret", "key", "password", "credential"];

/// Replace sensitive config values with `"***"`, recursively.
#[must_use]
pub fn redact_config(config: &Value) -> Value {
    match config {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                let lower = key.to_lowercase();
                if SENSITIVE_KEY_FRAGMENTS.iter().any(|f| lower.contains(f)) {
                    out.insert(key.clone(), Value::String("***".into()));
                } else {
                    out.insert(key.clone(), redact_config(value));
                }
            }
            Value::Object(out)
        },
        Value::Array(items) => Value::Array(items.iter().map(redact_config).collect()),
        other => other.clone(),
    }
}

/// Message direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    /// From a platform into the gateway.
    Inbound,
    /// From the gateway out to a platform.
    Outbound,
}

/// A message attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Kind tag (`image`, `audio`, `file`, …).
    pub kind: String,
    /// Platform URL, when available.
    #[serde(default)]
    pub url: Option<String>,
}

/// The platform-agnostic inbound message shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedMessage {
    /// Unique identifier.
    pub id: MessageId,
    /// Integration that produced it.
    pub integration_id: IntegrationId,
    /// Platform tag.
    pub platform: String,
    /// Direction.
    pub direction: MessageDirection,
    /// Platform-scoped sender id.
    pub sender_id: String,
    /// Sender display name.
    #[serde(default)]
    pub sender_name: Option<String>,
    /// Platform chat/channel id.
    pub chat_id: String,
    /// Message text.
    pub text: String,
    /// Attachments.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// The platform's own message id.
    #[serde(default)]
    pub platform_message_id: Option<String>,
    /// Free-form platform metadata.
    #[serde(default)]
    pub metadata: Value,
    /// When the message arrived.
    pub timestamp: Timestamp,
}

impl UnifiedMessage {
    /// Create an inbound message.
    #[must_use]
    pub fn inbound(
        integration_id: IntegrationId,
        platform: impl Into<String>,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            integration_id,
            platform: platform.into(),
            direction: MessageDirection::Inbound,
            sender_id: sender_id.into(),
            sender_name: None,
            chat_id: chat_id.into(),
            text: text.into(),
            attachments: Vec::new(),
            platform_message_id: None,
            metadata: Value::Null,
            timestamp: Timestamp::now(),
        }
    }
}

/// A response relayed back to the originating platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundReply {
    /// Task that produced the response.
    pub task_id: String,
    /// Chat to deliver into.
    pub chat_id: String,
    /// Platform message id to reply to, when supported.
    #[serde(default)]
    pub reply_to_message_id: Option<String>,
    /// Response text.
    pub text: String,
    /// Synthesized speech, when available.
    #[serde(default)]
    pub audio_base64: Option<String>,
    /// Audio container format (`ogg`, `mp3`, …).
    #[serde(default)]
    pub audio_format: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redaction_masks_sensitive_keys() {
        let config = json!({
            "botToken": "123:abc",
            "webhookSecret": "shh",
            "apiKey": "sk-1",
            "password": "pw",
            "chatId": "42",
            "nested": {"accessToken": "t", "displayName": "ok"},
        });
        let redacted = redact_config(&config);
        assert_eq!(redacted["botToken"], "***");
        assert_eq!(redacted["webhookSecret"], "***");
        assert_eq!(redacted["apiKey"], "***");
        assert_eq!(redacted["password"], "***");
        assert_eq!(redacted["chatId"], "42");
        assert_eq!(redacted["nested"]["accessToken"], "***");
        assert_eq!(redacted["nested"]["displayName"], "ok");
    }

    #[test]
    fn test_record_redacted_copy() {
        let record = IntegrationRecord::new(
            "telegram",
            "Main bot",
            json!({"botToken": "123:abc"}),
        );
        assert_eq!(record.redacted().config["botToken"], "***");
        // Original is untouched.
        assert_eq!(record.config["botToken"], "123:abc");
    }
}
