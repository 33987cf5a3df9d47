//! Audit storage trait and KV-backed implementation.
//!
//! Entries are keyed by zero-padded sequence number so KV key order equals
//! chain order. The storage is authoritative: verification always reads
//! entries back from here, never from values returned to callers.

use std::sync::Arc;

use async_trait::async_trait;
use secureyeoman_core::Timestamp;
use secureyeoman_storage::{KvStore, MemoryKvStore, ScopedKvStore};

use crate::entry::{AuditEntry, AuditLevel};
use crate::error::{AuditError, AuditResult};

const NS_ENTRIES: &str = "audit:entries";

/// Filter for audit queries.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    /// Exact severity match.
    pub level: Option<AuditLevel>,
    /// Exact event tag match.
    pub event: Option<String>,
    /// Exact principal match.
    pub user_id: Option<String>,
    /// Inclusive lower timestamp bound.
    pub from: Option<Timestamp>,
    /// Inclusive upper timestamp bound.
    pub to: Option<Timestamp>,
    /// Maximum entries to return (newest first). Unlimited when `None`.
    pub limit: Option<usize>,
}

impl AuditQuery {
    fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(level) = self.level
            && entry.level != level
        {
            return false;
        }
        if let Some(event) = &self.event
            && &entry.event != event
        {
            return false;
        }
        if let Some(user_id) = &self.user_id
            && entry.user_id.as_deref() != Some(user_id.as_str())
        {
            return false;
        }
        if let Some(from) = self.from
            && entry.timestamp < from
        {
            return false;
        }
        if let Some(to) = self.to
            && entry.timestamp > to
        {
            return false;
        }
        true
    }
}

/// Storage backend for the audit chain.
///
/// Implementations must be thread-safe; `append` must be atomic (an entry
/// is either fully persisted or absent).
#[async_trait]
pub trait AuditStorage: Send + Sync {
    /// Persist an entry. Fails without partial effects.
    async fn append(&self, entry: &AuditEntry) -> AuditResult<()>;

    /// Get an entry by sequence number.
    async fn get_by_sequence(&self, sequence: u64) -> AuditResult<Option<AuditEntry>>;

    /// The entry with the highest sequence, if any.
    async fn head(&self) -> AuditResult<Option<AuditEntry>>;

    /// Total number of entries.
    async fn count(&self) -> AuditResult<usize>;

    /// Entries matching a filter, in sequence order (then truncated from the
    /// tail if `limit` is set).
    async fn query(&self, filter: &AuditQuery) -> AuditResult<Vec<AuditEntry>>;
}

/// KV-backed audit storage.
pub struct KvAuditStorage {
    store: ScopedKvStore,
}

impl KvAuditStorage {
    /// Create storage over the given KV backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace binding fails.
    pub fn new(store: Arc<dyn KvStore>) -> AuditResult<Self> {
        let store = ScopedKvStore::new(store, NS_ENTRIES)
            .map_err(|e| AuditError::StorageUnavailable(e.to_string()))?;
        Ok(Self { store })
    }

    /// Create in-memory storage (for tests).
    #[must_use]
    pub fn in_memory() -> Self {
        let store = ScopedKvStore::new(Arc::new(MemoryKvStore::new()), NS_ENTRIES)
            .expect("static namespace is valid");
        Self { store }
    }

    /// Zero-padded key so lexicographic order equals sequence order.
    fn sequence_key(sequence: u64) -> String {
        format!("{sequence:020}")
    }

    async fn max_sequence(&self) -> AuditResult<Option<u64>> {
        let keys = self
            .store
            .list_keys()
            .await
            .map_err(|e| AuditError::StorageUnavailable(e.to_string()))?;
        Ok(keys.iter().filter_map(|k| k.parse::<u64>().ok()).max())
    }
}

impl std::fmt::Debug for KvAuditStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvAuditStorage").finish_non_exhaustive()
    }
}

#[async_trait]
impl AuditStorage for KvAuditStorage {
    async fn append(&self, entry: &AuditEntry) -> AuditResult<()> {
        let bytes =
            serde_json::to_vec(entry).map_err(|e| AuditError::Serialization(e.to_string()))?;
        self.store
            .set(&Self::sequence_key(entry.sequence), bytes)
            .await
            .map_err(|e| AuditError::StorageUnavailable(e.to_string()))
    }

    async fn get_by_sequence(&self, sequence: u64) -> AuditResult<Option<AuditEntry>> {
        let bytes = self
            .store
            .get(&Self::sequence_key(sequence))
            .await
            .map_err(|e| AuditError::StorageUnavailable(e.to_string()))?;
        bytes
            .map(|b| {
                serde_json::from_slice(&b).map_err(|e| AuditError::Serialization(e.to_string()))
            })
            .transpose()
    }

    async fn head(&self) -> AuditResult<Option<AuditEntry>> {
        match self.max_sequence().await? {
            Some(seq) => self.get_by_sequence(seq).await,
            None => Ok(None),
        }
    }

    async fn count(&self) -> AuditResult<usize> {
        let keys = self
            .store
            .list_keys()
            .await
            .map_err(|e| AuditError::StorageUnavailable(e.to_string()))?;
        Ok(keys.len())
    }

    async fn query(&self, filter: &AuditQuery) -> AuditResult<Vec<AuditEntry>> {
        let max = self.max_sequence().await?.unwrap_or(0);
        let mut entries = Vec::new();
        for seq in 1..=max {
            if let Some(entry) = self.get_by_sequence(seq).await?
                && filter.matches(&entry)
            {
                entries.push(entry);
            }
        }
        if let Some(limit) = filter.limit
            && entries.len() > limit
        {
            let skip = entries.len().saturating_sub(limit);
            entries.drain(..skip);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::AuditEvent;
    use secureyeoman_crypto::{ContentHash, SigningKey};

    fn test_key() -> SigningKey {
        SigningKey::new(vec![3u8; 32]).unwrap()
    }

    fn make_entry(sequence: u64, prev: ContentHash, event: &str, level: AuditLevel) -> AuditEntry {
        AuditEntry::create(
            sequence,
            AuditEvent::new(event, level, format!("{event} occurred")),
            prev,
            &test_key(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_append_and_head() {
        let storage = KvAuditStorage::in_memory();
        assert!(storage.head().await.unwrap().is_none());

        let e1 = make_entry(1, ContentHash::zero(), "auth_success", AuditLevel::Info);
        let e2 = make_entry(2, e1.hash, "auth_failure", AuditLevel::Warn);
        storage.append(&e1).await.unwrap();
        storage.append(&e2).await.unwrap();

        assert_eq!(storage.count().await.unwrap(), 2);
        assert_eq!(storage.head().await.unwrap().unwrap().sequence, 2);
        assert_eq!(
            storage.get_by_sequence(1).await.unwrap().unwrap().event,
            "auth_success"
        );
    }

    #[tokio::test]
    async fn test_query_filters() {
        let storage = KvAuditStorage::in_memory();
        let e1 = make_entry(1, ContentHash::zero(), "auth_success", AuditLevel::Info);
        let e2 = make_entry(2, e1.hash, "auth_failure", AuditLevel::Warn);
        let e3 = make_entry(3, e2.hash, "auth_failure", AuditLevel::Warn);
        for e in [&e1, &e2, &e3] {
            storage.append(e).await.unwrap();
        }

        let by_event = storage
            .query(&AuditQuery {
                event: Some("auth_failure".into()),
                ..AuditQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(by_event.len(), 2);

        let by_level = storage
            .query(&AuditQuery {
                level: Some(AuditLevel::Info),
                ..AuditQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(by_level.len(), 1);

        let limited = storage
            .query(&AuditQuery {
                limit: Some(2),
                ..AuditQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].sequence, 2);
    }
}
