//! Embedding provider contract and the deterministic test provider

use crate::config::EmbedConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Sparse vector as parallel (index, value) arrays, BM25-style.
///
/// Indices are term-hash buckets; values are keyword weights. The storage
/// collaborator consumes this shape directly for sparse search.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Contract the indexing and retrieval pipeline consumes for text embedding.
///
/// Batch methods must return outputs 1:1 in input order, and an empty input
/// slice yields an empty output, never an error.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text into a dense vector.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a single text into a sparse keyword-weighted vector.
    async fn embed_one_sparse(&self, text: &str) -> Result<SparseVector>;

    /// Embed multiple texts (dense, batched).
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed multiple texts (sparse, batched).
    async fn embed_batch_sparse(&self, texts: &[String]) -> Result<Vec<SparseVector>>;

    /// Dimension of the dense vectors this provider emits.
    fn dimension(&self) -> usize;

    /// Human-readable identifier for logs and status reports.
    fn provider_name(&self) -> &str;
}

/// Deterministic, dependency-free provider for tests.
///
/// Dense vectors are derived from token hashes so that identical texts embed
/// identically and share more mass than unrelated texts; sparse vectors are
/// term-hash buckets with occurrence counts. Not a semantic model.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    config: EmbedConfig,
}

impl HashEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            config: EmbedConfig::new("hash-test-provider", dimension),
        }
    }

    fn hash_token(token: &str) -> u64 {
        // FNV-1a, stable across platforms and runs
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in token.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        hash
    }

    fn dense(&self, text: &str) -> Vec<f32> {
        let dim = self.config.dimension;
        let mut vector = vec![0.0f32; dim];
        for token in text.split_whitespace() {
            let slot = (Self::hash_token(&token.to_lowercase()) % dim as u64) as usize;
            vector[slot] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }

    fn sparse(&self, text: &str) -> SparseVector {
        let mut counts: BTreeMap<u32, f32> = BTreeMap::new();
        for token in text.split_whitespace() {
            let bucket = (Self::hash_token(&token.to_lowercase()) % 30_000) as u32;
            *counts.entry(bucket).or_insert(0.0) += 1.0;
        }
        SparseVector {
            indices: counts.keys().copied().collect(),
            values: counts.values().copied().collect(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.dense(text))
    }

    async fn embed_one_sparse(&self, text: &str) -> Result<SparseVector> {
        Ok(self.sparse(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.dense(t)).collect())
    }

    async fn embed_batch_sparse(&self, texts: &[String]) -> Result<Vec<SparseVector>> {
        Ok(texts.iter().map(|t| self.sparse(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn provider_name(&self) -> &str {
        &self.config.dense_model
    }
}
