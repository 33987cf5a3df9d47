//! Vector index: trait and the in-process flat implementation.
//!
//! Vectors are stored unit-normalized in a slot-major flat buffer. Search
//! uses squared L2 distance converted to similarity via `sim = 1 - dist/2`
//! (equal to cosine similarity on unit vectors). Deleting tombstones the
//! slot by padding it with `-1`; tombstoned and padded slots never appear
//! in search results. `compact()` rebuilds the buffer from live slots.
//!
//! The on-disk form is a raw little-endian `f32` buffer plus a JSON sidecar
//! holding the id↔slot maps, `next_slot`, and the tombstone counter; both
//! survive process restarts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use secureyeoman_core::MemoryId;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::embedder::normalize;
use crate::error::{MemoryError, MemoryResult};

/// A search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Memory the vector belongs to.
    pub id: MemoryId,
    /// Similarity in `[-1, 1]`, descending in results.
    pub similarity: f32,
}

/// The vector index capability set.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Vector dimensionality.
    fn dimension(&self) -> usize;

    /// Upsert a vector. Re-inserting an existing id tombstones its old slot.
    async fn insert(&self, id: MemoryId, vector: Vec<f32>) -> MemoryResult<()>;

    /// Tombstone an id. Returns `true` if it was present.
    async fn delete(&self, id: MemoryId) -> MemoryResult<bool>;

    /// Top-`k` live entries by similarity, optionally thresholded.
    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        threshold: Option<f32>,
    ) -> MemoryResult<Vec<SearchHit>>;

    /// Number of live entries.
    async fn count(&self) -> MemoryResult<usize>;

    /// Rebuild from live slots, dropping tombstones.
    async fn compact(&self) -> MemoryResult<()>;

    /// Flush the sidecar and vector file.
    async fn close(&self) -> MemoryResult<()>;
}

/// Sidecar state persisted alongside the vector file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Sidecar {
    dimension: usize,
    next_slot: usize,
    deleted_count: usize,
    /// Memory id (string form) → slot.
    id_to_slot: HashMap<String, usize>,
}

#[derive(Debug)]
struct Inner {
    dimension: usize,
    /// Slot-major buffer, `next_slot * dimension` long. Tombstoned slots
    /// are padded with `-1`.
    data: Vec<f32>,
    id_to_slot: HashMap<MemoryId, usize>,
    slot_to_id: HashMap<usize, MemoryId>,
    next_slot: usize,
    deleted_count: usize,
    path: Option<PathBuf>,
}

impl Inner {
    fn tombstone(&mut self, slot: usize) {
        let start = slot * self.dimension;
        let end = start + self.dimension;
        if end <= self.data.len() {
            self.data[start..end].fill(-1.0);
        }
        self.deleted_count += 1;
    }

    fn slot_vector(&self, slot: usize) -> Option<&[f32]> {
        let start = slot * self.dimension;
        let end = start + self.dimension;
        self.data.get(start..end)
    }

    fn vector_path(path: &Path) -> PathBuf {
        path.with_extension("vec")
    }

    fn sidecar_path(path: &Path) -> PathBuf {
        path.with_extension("json")
    }

    fn flush(&self) -> MemoryResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut bytes = Vec::with_capacity(self.data.len() * 4);
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        std::fs::write(Self::vector_path(path), bytes)
            .map_err(|e| MemoryError::IndexIo(e.to_string()))?;

        let sidecar = Sidecar {
            dimension: self.dimension,
            next_slot: self.next_slot,
            deleted_count: self.deleted_count,
            id_to_slot: self
                .id_to_slot
                .iter()
                .map(|(id, slot)| (id.to_string(), *slot))
                .collect(),
        };
        let json = serde_json::to_vec_pretty(&sidecar)
            .map_err(|e| MemoryError::IndexIo(e.to_string()))?;
        std::fs::write(Self::sidecar_path(path), json)
            .map_err(|e| MemoryError::IndexIo(e.to_string()))?;
        Ok(())
    }
}

/// In-process flat vector index.
pub struct FlatVectorIndex {
    dimension: usize,
    inner: Mutex<Inner>,
}

impl FlatVectorIndex {
    /// Create an in-memory index.
    #[must_use]
    pub fn in_memory(dimension: usize) -> Self {
        Self {
            dimension,
            inner: Mutex::new(Inner {
                dimension,
                data: Vec::new(),
                id_to_slot: HashMap::new(),
                slot_to_id: HashMap::new(),
                next_slot: 0,
                deleted_count: 0,
                path: None,
            }),
        }
    }

    /// Open (or create) a persistent index at `path` (extension ignored;
    /// `.vec` and `.json` siblings are used).
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::IndexIo`] if existing files cannot be read,
    /// or [`MemoryError::DimensionMismatch`] if the sidecar disagrees.
    pub fn open(path: impl Into<PathBuf>, dimension: usize) -> MemoryResult<Self> {
        let path = path.into();
        let sidecar_path = Inner::sidecar_path(&path);

        let mut inner = Inner {
            dimension,
            data: Vec::new(),
            id_to_slot: HashMap::new(),
            slot_to_id: HashMap::new(),
            next_slot: 0,
            deleted_count: 0,
            path: Some(path.clone()),
        };

        if sidecar_path.exists() {
            let json = std::fs::read(&sidecar_path)
                .map_err(|e| MemoryError::IndexIo(e.to_string()))?;
            let sidecar: Sidecar =
                serde_json::from_slice(&json).map_err(|e| MemoryError::IndexIo(e.to_string()))?;
            if sidecar.dimension != dimension {
                return Err(MemoryError::DimensionMismatch {
                    expected: dimension,
                    got: sidecar.dimension,
                });
            }

            let bytes = std::fs::read(Inner::vector_path(&path))
                .map_err(|e| MemoryError::IndexIo(e.to_string()))?;
            let mut data = Vec::with_capacity(bytes.len() / 4);
            for chunk in bytes.chunks_exact(4) {
                let arr: [u8; 4] = chunk
                    .try_into()
                    .map_err(|_| MemoryError::IndexIo("truncated vector file".into()))?;
                data.push(f32::from_le_bytes(arr));
            }

            inner.next_slot = sidecar.next_slot;
            inner.deleted_count = sidecar.deleted_count;
            inner.data = data;
            for (id_str, slot) in sidecar.id_to_slot {
                let id = MemoryId::parse(&id_str)
                    .map_err(|e| MemoryError::IndexIo(format!("bad sidecar id: {e}")))?;
                inner.id_to_slot.insert(id, slot);
                inner.slot_to_id.insert(slot, id);
            }
            debug!(
                entries = inner.id_to_slot.len(),
                tombstones = inner.deleted_count,
                "Vector index loaded"
            );
        }

        Ok(Self {
            dimension,
            inner: Mutex::new(inner),
        })
    }
}

#[async_trait]
impl VectorIndex for FlatVectorIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn insert(&self, id: MemoryId, mut vector: Vec<f32>) -> MemoryResult<()> {
        let mut inner = self.inner.lock().await;
        if vector.len() != inner.dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: inner.dimension,
                got: vector.len(),
            });
        }
        normalize(&mut vector);

        // Upsert: tombstone the previous slot for this id.
        if let Some(old_slot) = inner.id_to_slot.remove(&id) {
            inner.slot_to_id.remove(&old_slot);
            inner.tombstone(old_slot);
        }

        let slot = inner.next_slot;
        inner.next_slot += 1;
        inner.data.extend_from_slice(&vector);
        inner.id_to_slot.insert(id, slot);
        inner.slot_to_id.insert(slot, id);
        Ok(())
    }

    async fn delete(&self, id: MemoryId) -> MemoryResult<bool> {
        let mut inner = self.inner.lock().await;
        let Some(slot) = inner.id_to_slot.remove(&id) else {
            return Ok(false);
        };
        inner.slot_to_id.remove(&slot);
        inner.tombstone(slot);
        Ok(true)
    }

    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        threshold: Option<f32>,
    ) -> MemoryResult<Vec<SearchHit>> {
        let inner = self.inner.lock().await;
        if vector.len() != inner.dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: inner.dimension,
                got: vector.len(),
            });
        }
        let mut query = vector.to_vec();
        normalize(&mut query);

        let mut hits = Vec::new();
        for (&slot, &id) in &inner.slot_to_id {
            let Some(candidate) = inner.slot_vector(slot) else {
                continue;
            };
            // Tombstoned and padding slots are absent from slot_to_id, but
            // guard against a torn sidecar anyway.
            if candidate.iter().all(|v| *v == -1.0) {
                continue;
            }
            let dist: f32 = query
                .iter()
                .zip(candidate)
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            let similarity = 1.0 - dist / 2.0;
            if threshold.is_none_or(|t| similarity >= t) {
                hits.push(SearchHit { id, similarity });
            }
        }

        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self) -> MemoryResult<usize> {
        Ok(self.inner.lock().await.id_to_slot.len())
    }

    async fn compact(&self) -> MemoryResult<()> {
        let mut inner = self.inner.lock().await;
        let dimension = inner.dimension;

        let mut live: Vec<(MemoryId, usize)> = inner
            .id_to_slot
            .iter()
            .map(|(id, slot)| (*id, *slot))
            .collect();
        live.sort_by_key(|(_, slot)| *slot);

        let mut data = Vec::with_capacity(live.len() * dimension);
        let mut id_to_slot = HashMap::with_capacity(live.len());
        let mut slot_to_id = HashMap::with_capacity(live.len());
        for (new_slot, (id, old_slot)) in live.iter().enumerate() {
            let Some(vector) = inner.slot_vector(*old_slot) else {
                continue;
            };
            data.extend_from_slice(vector);
            id_to_slot.insert(*id, new_slot);
            slot_to_id.insert(new_slot, *id);
        }

        inner.next_slot = id_to_slot.len();
        inner.deleted_count = 0;
        inner.data = data;
        inner.id_to_slot = id_to_slot;
        inner.slot_to_id = slot_to_id;
        inner.flush()
    }

    async fn close(&self) -> MemoryResult<()> {
        self.inner.lock().await.flush()
    }
}

impl std::fmt::Debug for FlatVectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatVectorIndex").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashingEmbedder;

    fn embed(text: &str) -> Vec<f32> {
        HashingEmbedder::new().embed_sync(text)
    }

    #[tokio::test]
    async fn test_insert_and_top1_self_similarity() {
        let index = FlatVectorIndex::in_memory(HashingEmbedder::DEFAULT_DIMENSION);
        let id = MemoryId::new();
        index.insert(id, embed("the user prefers dark mode")).await.unwrap();

        let hits = index
            .search(&embed("the user prefers dark mode"), 1, None)
            .await
            .unwrap();
        assert_eq!(hits[0].id, id);
        assert!((hits[0].similarity - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_delete_excludes_from_search() {
        let index = FlatVectorIndex::in_memory(HashingEmbedder::DEFAULT_DIMENSION);
        let id = MemoryId::new();
        index.insert(id, embed("dark mode")).await.unwrap();
        assert!(index.delete(id).await.unwrap());
        assert!(!index.delete(id).await.unwrap());

        let hits = index.search(&embed("dark mode"), 5, None).await.unwrap();
        assert!(hits.is_empty());
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reinsert_tombstones_old_slot() {
        let index = FlatVectorIndex::in_memory(HashingEmbedder::DEFAULT_DIMENSION);
        let id = MemoryId::new();
        index.insert(id, embed("first version")).await.unwrap();
        index.insert(id, embed("second version")).await.unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
        let hits = index.search(&embed("second version"), 5, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].similarity - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_threshold_filters() {
        let index = FlatVectorIndex::in_memory(HashingEmbedder::DEFAULT_DIMENSION);
        index.insert(MemoryId::new(), embed("dark mode preference")).await.unwrap();
        index
            .insert(MemoryId::new(), embed("deploy failed on staging"))
            .await
            .unwrap();

        let hits = index
            .search(&embed("dark mode preference"), 5, Some(0.85))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_compact_resets_tombstones() {
        let index = FlatVectorIndex::in_memory(HashingEmbedder::DEFAULT_DIMENSION);
        let keep = MemoryId::new();
        let drop_ = MemoryId::new();
        index.insert(keep, embed("keep this")).await.unwrap();
        index.insert(drop_, embed("drop this")).await.unwrap();
        index.delete(drop_).await.unwrap();

        index.compact().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 1);
        let hits = index.search(&embed("keep this"), 5, None).await.unwrap();
        assert_eq!(hits[0].id, keep);
    }

    #[tokio::test]
    async fn test_sidecar_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index");
        let id = MemoryId::new();

        {
            let index =
                FlatVectorIndex::open(&path, HashingEmbedder::DEFAULT_DIMENSION).unwrap();
            index.insert(id, embed("persistent memory")).await.unwrap();
            index.close().await.unwrap();
        }

        let reopened = FlatVectorIndex::open(&path, HashingEmbedder::DEFAULT_DIMENSION).unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        let hits = reopened
            .search(&embed("persistent memory"), 1, None)
            .await
            .unwrap();
        assert_eq!(hits[0].id, id);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let index = FlatVectorIndex::in_memory(8);
        let err = index.insert(MemoryId::new(), vec![1.0; 4]).await.unwrap_err();
        assert!(matches!(err, MemoryError::DimensionMismatch { .. }));
    }
}
