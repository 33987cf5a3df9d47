//! Persistent store for integration records and inbound messages.

use std::sync::Arc;

use secureyeoman_core::{IntegrationId, MessageId, Timestamp};
use secureyeoman_storage::{KvStore, ScopedKvStore};

use crate::error::{IntegrationError, IntegrationResult};
use crate::types::{IntegrationRecord, UnifiedMessage};

const NS_INTEGRATIONS: &str = "integrations:records";
const NS_MESSAGES: &str = "integrations:messages";

/// KV-backed store for integrations and their message history.
pub struct IntegrationStore {
    integrations: ScopedKvStore,
    messages: ScopedKvStore,
}

impl IntegrationStore {
    /// Create a store over the given KV backend.
    ///
    /// # Errors
    ///
    /// Returns an error if namespace binding fails.
    pub fn new(store: Arc<dyn KvStore>) -> IntegrationResult<Self> {
        let integrations = ScopedKvStore::new(Arc::clone(&store), NS_INTEGRATIONS)
            .map_err(|e| IntegrationError::Storage(e.to_string()))?;
        let messages = ScopedKvStore::new(store, NS_MESSAGES)
            .map_err(|e| IntegrationError::Storage(e.to_string()))?;
        Ok(Self {
            integrations,
            messages,
        })
    }

    /// Persist a new or updated integration.
    ///
    /// # Errors
    ///
    /// Returns an error if persistence fails.
    pub async fn upsert(&self, record: IntegrationRecord) -> IntegrationResult<IntegrationRecord> {
        self.integrations
            .set_json(&record.id.to_string(), &record)
            .await
            .map_err(|e| IntegrationError::Storage(e.to_string()))?;
        Ok(record)
    }

    /// Fetch an integration (unredacted; for internal use).
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::NotFound`] if the id is unknown.
    pub async fn get(&self, id: IntegrationId) -> IntegrationResult<IntegrationRecord> {
        self.integrations
            .get_json(&id.to_string())
            .await
            .map_err(|e| IntegrationError::Storage(e.to_string()))?
            .ok_or_else(|| IntegrationError::NotFound(id.to_string()))
    }

    /// List all integrations, oldest first (unredacted).
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn list(&self) -> IntegrationResult<Vec<IntegrationRecord>> {
        let keys = self
            .integrations
            .list_keys()
            .await
            .map_err(|e| IntegrationError::Storage(e.to_string()))?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(record) = self
                .integrations
                .get_json::<IntegrationRecord>(&key)
                .await
                .map_err(|e| IntegrationError::Storage(e.to_string()))?
            {
                out.push(record);
            }
        }
        out.sort_by_key(|r| r.id);
        Ok(out)
    }

    /// Delete an integration.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::NotFound`] if the id is unknown.
    pub async fn delete(&self, id: IntegrationId) -> IntegrationResult<()> {
        let existed = self
            .integrations
            .delete(&id.to_string())
            .await
            .map_err(|e| IntegrationError::Storage(e.to_string()))?;
        if !existed {
            return Err(IntegrationError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Persist an inbound message and bump the integration's counter.
    ///
    /// # Errors
    ///
    /// Returns an error if persistence fails.
    pub async fn record_message(&self, message: &UnifiedMessage) -> IntegrationResult<()> {
        self.messages
            .set_json(&message.id.to_string(), message)
            .await
            .map_err(|e| IntegrationError::Storage(e.to_string()))?;

        if let Ok(mut integration) = self.get(message.integration_id).await {
            integration.message_count = integration.message_count.saturating_add(1);
            integration.updated_at = Timestamp::now();
            self.upsert(integration).await?;
        }
        Ok(())
    }

    /// Fetch a persisted message.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn message(&self, id: MessageId) -> IntegrationResult<Option<UnifiedMessage>> {
        self.messages
            .get_json(&id.to_string())
            .await
            .map_err(|e| IntegrationError::Storage(e.to_string()))
    }
}

impl std::fmt::Debug for IntegrationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secureyeoman_storage::MemoryKvStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_crud() {
        let store = IntegrationStore::new(Arc::new(MemoryKvStore::new())).unwrap();
        let record = IntegrationRecord::new("telegram", "Main bot", json!({"botToken": "t"}));
        let id = record.id;
        store.upsert(record).await.unwrap();

        assert_eq!(store.get(id).await.unwrap().platform, "telegram");
        assert_eq!(store.list().await.unwrap().len(), 1);

        store.delete(id).await.unwrap();
        assert!(store.get(id).await.is_err());
    }

    #[tokio::test]
    async fn test_message_bumps_counter() {
        let store = IntegrationStore::new(Arc::new(MemoryKvStore::new())).unwrap();
        let record = IntegrationRecord::new("telegram", "Main bot", json!({}));
        let id = record.id;
        store.upsert(record).await.unwrap();

        let message = UnifiedMessage::inbound(id, "telegram", "u1", "c1", "hello");
        store.record_message(&message).await.unwrap();

        assert_eq!(store.get(id).await.unwrap().message_count, 1);
        assert!(store.message(message.id).await.unwrap().is_some());
    }
}
