//! Configuration for embedding providers

use crate::error::{EmbedError, Result};

/// Default dense model; 384-dimensional sentence embeddings.
pub const DEFAULT_DENSE_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Default sparse model; BM25-style keyword weighting.
pub const DEFAULT_SPARSE_MODEL: &str = "bm25";

/// Dimension of the default dense model.
pub const DEFAULT_DIMENSION: usize = 384;

/// Describes which models a concrete [`crate::EmbeddingProvider`] should load.
///
/// The pipeline only ever consumes the trait; this config travels to whatever
/// runtime implements it so that collection schemas and vectors agree on
/// dimensionality.
#[derive(Debug, Clone)]
pub struct EmbedConfig {
    /// Dense embedding model identifier
    pub dense_model: String,
    /// Sparse (keyword-weighted) model identifier
    pub sparse_model: String,
    /// Dimension of the dense vectors the provider emits
    pub dimension: usize,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            dense_model: DEFAULT_DENSE_MODEL.to_string(),
            sparse_model: DEFAULT_SPARSE_MODEL.to_string(),
            dimension: DEFAULT_DIMENSION,
        }
    }
}

impl EmbedConfig {
    /// Create a config for a specific dense model and dimension.
    pub fn new(dense_model: impl Into<String>, dimension: usize) -> Self {
        Self {
            dense_model: dense_model.into(),
            dimension,
            ..Self::default()
        }
    }

    /// Override the sparse model identifier.
    pub fn with_sparse_model(mut self, sparse_model: impl Into<String>) -> Self {
        self.sparse_model = sparse_model.into();
        self
    }

    /// Reject configs no provider could honor.
    pub fn validate(&self) -> Result<()> {
        if self.dense_model.is_empty() {
            return Err(EmbedError::invalid_config("dense model name is empty"));
        }
        if self.dimension == 0 {
            return Err(EmbedError::invalid_config("embedding dimension must be > 0"));
        }
        Ok(())
    }
}
