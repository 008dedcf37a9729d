//! # notegraph-embed
//!
//! Embedding collaborator contract for the notegraph indexing pipeline.
//!
//! The core pipeline treats the embedding runtime as an opaque collaborator:
//! given text it returns dense float vectors and sparse (index, value)
//! vectors. This crate defines that contract ([`EmbeddingProvider`]), the
//! configuration describing which models a concrete provider should load
//! ([`EmbedConfig`]), and a deterministic in-process provider
//! ([`HashEmbeddingProvider`]) used by tests.
//!
//! Batch operations preserve input order 1:1 with output order, and an empty
//! input always yields an empty output rather than an error.

pub mod config;
pub mod error;
pub mod provider;

pub use config::EmbedConfig;
pub use error::{EmbedError, Result};
pub use provider::{EmbeddingProvider, HashEmbeddingProvider, SparseVector};
