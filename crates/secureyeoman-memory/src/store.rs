//! The memory store: KV-backed records plus the vector index, with the
//! on-save quick deduplication pass.

use std::collections::HashSet;
use std::sync::Arc;

use secureyeoman_core::MemoryId;
use secureyeoman_core::Timestamp;
use secureyeoman_storage::{KvStore, ScopedKvStore};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::embedder::Embedder;
use crate::error::{MemoryError, MemoryResult};
use crate::index::{SearchHit, VectorIndex};
use crate::types::MemoryRecord;

const NS_RECORDS: &str = "memory:records";
const NS_META: &str = "memory:meta";

const META_FLAGGED: &str = "consolidation:flagged_ids";

/// Outcome of the on-save quick check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum QuickCheckOutcome {
    /// A near-identical memory already exists; the new one was discarded.
    Deduped {
        /// The surviving memory.
        duplicate_of: MemoryId,
        /// Similarity that triggered the dedup.
        similarity: f32,
    },
    /// Similar memories exist; flagged for deep consolidation.
    Flagged {
        /// Nearest neighbour similarity.
        similarity: f32,
    },
    /// No near neighbours.
    Clean,
}

/// Aggregate statistics over the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Total live records.
    pub total: usize,
    /// Records carrying an embedding.
    pub embedded: usize,
    /// Currently flagged for consolidation.
    pub flagged: usize,
    /// Live entries in the vector index.
    pub indexed: usize,
}

/// Quick-check thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuickCheckThresholds {
    /// At or above this similarity the new memory is discarded.
    pub auto_dedup: f32,
    /// At or above this similarity the new memory is flagged.
    pub flag: f32,
}

impl Default for QuickCheckThresholds {
    fn default() -> Self {
        Self {
            auto_dedup: 0.95,
            flag: 0.85,
        }
    }
}

/// KV-backed memory store with a vector index.
pub struct MemoryStore {
    records: ScopedKvStore,
    meta: ScopedKvStore,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    thresholds: QuickCheckThresholds,
    /// In-memory copy of the persisted flagged set.
    flagged: Mutex<HashSet<MemoryId>>,
}

impl MemoryStore {
    /// Create a store over the given backends.
    ///
    /// # Errors
    ///
    /// Returns an error if namespace binding or the flagged-set load fails.
    pub async fn new(
        store: Arc<dyn KvStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        thresholds: QuickCheckThresholds,
    ) -> MemoryResult<Self> {
        let records = ScopedKvStore::new(Arc::clone(&store), NS_RECORDS)
            .map_err(|e| MemoryError::Storage(e.to_string()))?;
        let meta = ScopedKvStore::new(store, NS_META)
            .map_err(|e| MemoryError::Storage(e.to_string()))?;

        let flagged: HashSet<MemoryId> = meta
            .get_json::<Vec<MemoryId>>(META_FLAGGED)
            .await
            .map_err(|e| MemoryError::Storage(e.to_string()))?
            .unwrap_or_default()
            .into_iter()
            .collect();

        Ok(Self {
            records,
            meta,
            index,
            embedder,
            thresholds,
            flagged: Mutex::new(flagged),
        })
    }

    /// The vector index.
    #[must_use]
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    async fn persist_flagged(&self, flagged: &HashSet<MemoryId>) -> MemoryResult<()> {
        let ids: Vec<MemoryId> = flagged.iter().copied().collect();
        self.meta
            .set_json(META_FLAGGED, &ids)
            .await
            .map_err(|e| MemoryError::Storage(e.to_string()))
    }

    /// Save a memory: embed, insert into the index, then run the quick
    /// check against the top-5 nearest existing memories.
    ///
    /// The search-then-insert pair is not atomic against a concurrent save
    /// of an identical memory; transient duplicates are caught by the next
    /// deep consolidation.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding, indexing, or persistence fails.
    pub async fn save(
        &self,
        mut record: MemoryRecord,
    ) -> MemoryResult<(MemoryRecord, QuickCheckOutcome)> {
        let embedding = self.embedder.embed(&record.content).await?;
        record.embedding = Some(embedding.clone());

        self.records
            .set_json(&record.id.to_string(), &record)
            .await
            .map_err(|e| MemoryError::Storage(e.to_string()))?;
        self.index.insert(record.id, embedding.clone()).await?;

        // Top-5 nearest, excluding the record itself.
        let neighbours: Vec<SearchHit> = self
            .index
            .search(&embedding, 6, Some(self.thresholds.flag))
            .await?
            .into_iter()
            .filter(|hit| hit.id != record.id)
            .take(5)
            .collect();

        let Some(nearest) = neighbours.first() else {
            return Ok((record, QuickCheckOutcome::Clean));
        };

        if nearest.similarity >= self.thresholds.auto_dedup {
            // Discard the newcomer; the established memory wins.
            self.records
                .delete(&record.id.to_string())
                .await
                .map_err(|e| MemoryError::Storage(e.to_string()))?;
            self.index.delete(record.id).await?;
            debug!(
                duplicate_of = %nearest.id,
                similarity = nearest.similarity,
                "Memory deduped on save"
            );
            return Ok((
                record,
                QuickCheckOutcome::Deduped {
                    duplicate_of: nearest.id,
                    similarity: nearest.similarity,
                },
            ));
        }

        let mut flagged = self.flagged.lock().await;
        flagged.insert(record.id);
        self.persist_flagged(&flagged).await?;
        debug!(id = %record.id, similarity = nearest.similarity, "Memory flagged");
        Ok((
            record,
            QuickCheckOutcome::Flagged {
                similarity: nearest.similarity,
            },
        ))
    }

    /// Fetch a memory, bumping its access count.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::NotFound`] if the id is unknown.
    pub async fn get(&self, id: MemoryId) -> MemoryResult<MemoryRecord> {
        let mut record: MemoryRecord = self
            .records
            .get_json(&id.to_string())
            .await
            .map_err(|e| MemoryError::Storage(e.to_string()))?
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))?;
        record.access_count = record.access_count.saturating_add(1);
        record.last_accessed_at = Some(Timestamp::now());
        self.records
            .set_json(&id.to_string(), &record)
            .await
            .map_err(|e| MemoryError::Storage(e.to_string()))?;
        Ok(record)
    }

    /// Fetch without touching access metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn peek(&self, id: MemoryId) -> MemoryResult<Option<MemoryRecord>> {
        self.records
            .get_json(&id.to_string())
            .await
            .map_err(|e| MemoryError::Storage(e.to_string()))
    }

    /// Apply an update closure, bumping `updated_at` and re-embedding when
    /// the content changed.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::NotFound`] if the id is unknown.
    pub async fn update(
        &self,
        id: MemoryId,
        update: impl FnOnce(&mut MemoryRecord) + Send,
    ) -> MemoryResult<MemoryRecord> {
        let mut record = self
            .peek(id)
            .await?
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))?;
        let old_content = record.content.clone();
        update(&mut record);

        if record.content != old_content {
            let embedding = self.embedder.embed(&record.content).await?;
            record.embedding = Some(embedding.clone());
            self.index.insert(record.id, embedding).await?;
            record.updated_at = Timestamp::now();
        }

        self.records
            .set_json(&id.to_string(), &record)
            .await
            .map_err(|e| MemoryError::Storage(e.to_string()))?;
        Ok(record)
    }

    /// Delete a memory from storage, index, and the flagged set.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::NotFound`] if the id is unknown.
    pub async fn delete(&self, id: MemoryId) -> MemoryResult<()> {
        let existed = self
            .records
            .delete(&id.to_string())
            .await
            .map_err(|e| MemoryError::Storage(e.to_string()))?;
        if !existed {
            return Err(MemoryError::NotFound(id.to_string()));
        }
        self.index.delete(id).await?;
        let mut flagged = self.flagged.lock().await;
        if flagged.remove(&id) {
            self.persist_flagged(&flagged).await?;
        }
        Ok(())
    }

    /// List all memories, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn list(&self) -> MemoryResult<Vec<MemoryRecord>> {
        let keys = self
            .records
            .list_keys()
            .await
            .map_err(|e| MemoryError::Storage(e.to_string()))?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(record) = self
                .records
                .get_json::<MemoryRecord>(&key)
                .await
                .map_err(|e| MemoryError::Storage(e.to_string()))?
            {
                out.push(record);
            }
        }
        out.sort_by_key(|r| r.id);
        Ok(out)
    }

    /// Search by text similarity.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or the index fails.
    pub async fn search_similar(
        &self,
        query: &str,
        k: usize,
        threshold: Option<f32>,
    ) -> MemoryResult<Vec<(MemoryRecord, f32)>> {
        let embedding = self.embedder.embed(query).await?;
        let hits = self.index.search(&embedding, k, threshold).await?;
        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            if let Some(record) = self.peek(hit.id).await? {
                out.push((record, hit.similarity));
            }
        }
        Ok(out)
    }

    /// Neighbours of an existing memory at or above a threshold.
    ///
    /// # Errors
    ///
    /// Returns an error if the index fails.
    pub async fn neighbours(
        &self,
        id: MemoryId,
        threshold: f32,
    ) -> MemoryResult<Vec<SearchHit>> {
        let Some(record) = self.peek(id).await? else {
            return Ok(Vec::new());
        };
        let Some(embedding) = record.embedding else {
            return Ok(Vec::new());
        };
        Ok(self
            .index
            .search(&embedding, 6, Some(threshold))
            .await?
            .into_iter()
            .filter(|hit| hit.id != id)
            .collect())
    }

    /// Snapshot the flagged set.
    pub async fn flagged_snapshot(&self) -> HashSet<MemoryId> {
        self.flagged.lock().await.clone()
    }

    /// Remove exactly `subset` from the flagged set, keeping ids flagged
    /// after the snapshot was taken.
    ///
    /// # Errors
    ///
    /// Returns an error if persistence fails.
    pub async fn clear_flagged(&self, subset: &HashSet<MemoryId>) -> MemoryResult<()> {
        let mut flagged = self.flagged.lock().await;
        for id in subset {
            flagged.remove(id);
        }
        self.persist_flagged(&flagged).await
    }

    /// Aggregate statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn stats(&self) -> MemoryResult<MemoryStats> {
        let records = self.list().await?;
        Ok(MemoryStats {
            total: records.len(),
            embedded: records.iter().filter(|r| r.embedding.is_some()).count(),
            flagged: self.flagged.lock().await.len(),
            indexed: self.index.count().await?,
        })
    }

    /// Rebuild the vector index from stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or the index fails.
    pub async fn reindex(&self) -> MemoryResult<usize> {
        let records = self.list().await?;
        let mut count = 0usize;
        for mut record in records {
            let embedding = self.embedder.embed(&record.content).await?;
            record.embedding = Some(embedding.clone());
            self.records
                .set_json(&record.id.to_string(), &record)
                .await
                .map_err(|e| MemoryError::Storage(e.to_string()))?;
            self.index.insert(record.id, embedding).await?;
            count = count.saturating_add(1);
        }
        self.index.compact().await?;
        info!(count, "Memory reindex complete");
        Ok(count)
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashingEmbedder;
    use crate::index::FlatVectorIndex;
    use secureyeoman_storage::MemoryKvStore;

    async fn make_store() -> MemoryStore {
        let embedder = Arc::new(HashingEmbedder::new());
        let index = Arc::new(FlatVectorIndex::in_memory(embedder.dimension()));
        MemoryStore::new(
            Arc::new(MemoryKvStore::new()),
            index,
            embedder,
            QuickCheckThresholds::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_clean_save() {
        let store = make_store().await;
        let (record, outcome) = store
            .save(MemoryRecord::new("The user prefers dark mode.", "chat"))
            .await
            .unwrap();
        assert_eq!(outcome, QuickCheckOutcome::Clean);
        assert!(record.embedding.is_some());
        assert_eq!(store.stats().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_near_identical_save_dedupes() {
        let store = make_store().await;
        let (a, _) = store
            .save(MemoryRecord::new("The user prefers dark mode.", "chat"))
            .await
            .unwrap();

        let (b, outcome) = store
            .save(MemoryRecord::new("User prefers dark mode.", "chat"))
            .await
            .unwrap();

        match outcome {
            QuickCheckOutcome::Deduped {
                duplicate_of,
                similarity,
            } => {
                assert_eq!(duplicate_of, a.id);
                assert!(similarity >= 0.95);
            },
            other => panic!("expected dedup, got {other:?}"),
        }

        // B is gone from both storage and index; A remains.
        assert!(store.peek(b.id).await.unwrap().is_none());
        assert!(store.peek(a.id).await.unwrap().is_some());
        assert_eq!(store.index().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unrelated_memories_stay_clean() {
        let store = make_store().await;
        store
            .save(MemoryRecord::new("The user prefers dark mode.", "chat"))
            .await
            .unwrap();
        let (_, outcome) = store
            .save(MemoryRecord::new(
                "Deploy failed on the staging cluster yesterday.",
                "ops",
            ))
            .await
            .unwrap();
        assert_eq!(outcome, QuickCheckOutcome::Clean);
        assert_eq!(store.stats().await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_self_is_top_hit_with_similarity_one() {
        let store = make_store().await;
        let (record, _) = store
            .save(MemoryRecord::new("Favorite color is teal.", "chat"))
            .await
            .unwrap();

        let hits = store
            .search_similar("Favorite color is teal.", 1, None)
            .await
            .unwrap();
        assert_eq!(hits[0].0.id, record.id);
        assert!((hits[0].1 - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_delete_removes_everywhere() {
        let store = make_store().await;
        let (record, _) = store
            .save(MemoryRecord::new("Temporary note.", "chat"))
            .await
            .unwrap();
        store.delete(record.id).await.unwrap();
        assert!(store.peek(record.id).await.unwrap().is_none());
        assert_eq!(store.index().count().await.unwrap(), 0);
        assert!(matches!(
            store.delete(record.id).await,
            Err(MemoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_flagged_set_snapshot_semantics() {
        let store = make_store().await;
        // Two similar-but-not-identical memories to trigger flagging.
        store
            .save(MemoryRecord::new(
                "User timezone is Europe/Berlin for scheduling.",
                "chat",
            ))
            .await
            .unwrap();
        let (flagged_record, outcome) = store
            .save(MemoryRecord::new(
                "User timezone is Europe/Berlin for meetings and scheduling.",
                "chat",
            ))
            .await
            .unwrap();

        assert!(matches!(outcome, QuickCheckOutcome::Flagged { .. }));
        let snapshot = store.flagged_snapshot().await;
        assert!(snapshot.contains(&flagged_record.id));
        store.clear_flagged(&snapshot).await.unwrap();
        assert!(store.flagged_snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_reindex_restores_search() {
        let store = make_store().await;
        let (record, _) = store
            .save(MemoryRecord::new("Reindex target memory.", "chat"))
            .await
            .unwrap();
        store.index().delete(record.id).await.unwrap();
        assert_eq!(store.index().count().await.unwrap(), 0);

        let count = store.reindex().await.unwrap();
        assert_eq!(count, 1);
        let hits = store
            .search_similar("Reindex target memory.", 1, None)
            .await
            .unwrap();
        assert_eq!(hits[0].0.id, record.id);
    }
}
