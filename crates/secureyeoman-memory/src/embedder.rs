//! Text embedding.
//!
//! The index contract only requires unit-normalized vectors; where they
//! come from is pluggable. [`HashingEmbedder`] is the deterministic default:
//! a feature-hashing projection that needs no remote service, so dedup and
//! search work stand-alone. Provider-backed embedders implement the same
//! trait.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use crate::error::MemoryResult;

/// Produces unit-normalized embeddings for text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embedding dimensionality.
    fn dimension(&self) -> usize;

    /// Embed a text. The result must be unit-normalized.
    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>>;
}

/// Common function words carrying no memory content.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "of", "to", "and", "or", "in",
    "on", "at", "for", "with", "that", "this", "it", "its", "as", "by",
];

/// Deterministic feature-hashing embedder.
///
/// Tokenizes on non-alphanumeric boundaries, lowercases, drops stopwords,
/// hashes each token into one of `dimension` buckets with a hash-derived
/// sign, and unit-normalizes the result. Near-identical sentences map to
/// nearly identical vectors.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Default dimensionality.
    pub const DEFAULT_DIMENSION: usize = 256;

    /// Create an embedder with the default dimension.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dimension: Self::DEFAULT_DIMENSION,
        }
    }

    /// Create an embedder with an explicit dimension.
    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Synchronous embedding (the hashing projection never suspends).
    #[must_use]
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .filter(|t| !STOPWORDS.contains(&t.as_str()))
        {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();
            let bucket = (h % self.dimension as u64) as usize;
            let sign = if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        normalize(&mut vector);
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

/// Unit-normalize a vector in place. Zero vectors are left unchanged.
pub(crate) fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_deterministic() {
        let embedder = HashingEmbedder::new();
        assert_eq!(embedder.embed_sync("dark mode"), embedder.embed_sync("dark mode"));
    }

    #[test]
    fn test_unit_normalized() {
        let embedder = HashingEmbedder::new();
        let v = embedder.embed_sync("the user prefers dark mode");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_near_identical_sentences_are_close() {
        let embedder = HashingEmbedder::new();
        let a = embedder.embed_sync("The user prefers dark mode.");
        let b = embedder.embed_sync("User prefers dark mode.");
        assert!(cosine(&a, &b) >= 0.95);
    }

    #[test]
    fn test_unrelated_sentences_are_far() {
        let embedder = HashingEmbedder::new();
        let a = embedder.embed_sync("The user prefers dark mode.");
        let b = embedder.embed_sync("Deploy failed on the staging cluster yesterday.");
        assert!(cosine(&a, &b) < 0.5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new();
        let v = embedder.embed_sync("");
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
