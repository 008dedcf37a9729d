//! notegraph-retriever: Hybrid semantic search over a markdown note vault
//!
//! This crate indexes a directory of markdown notes (a "vault") into a hybrid
//! dense + sparse vector index, keeps that index fresh by watching the
//! filesystem, and answers search queries enriched with the vault's wikilink
//! graph.
//!
//! ## Key Modules
//!
//! - **[`indexing_engine`]**: Rebuilds, single-note updates, and the
//!   watcher-driven change loop
//! - **[`search`]**: Query embedding, hybrid retrieval, and graph enrichment
//! - **[`parser`]** / **[`chunker`]**: Markdown metadata extraction and
//!   heading-aware chunking
//! - **[`storage`]**: The [`storage::VectorStore`] contract plus an in-memory
//!   reference implementation
//! - **[`watcher`]** / **[`debounce`]** / **[`event_log`]**: Change detection
//!   plumbing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use notegraph_retriever::config::VaultConfig;
//! use notegraph_retriever::indexing_engine::IndexEngine;
//! use notegraph_retriever::model::SearchRequest;
//! use notegraph_retriever::search::SearchEngine;
//! use notegraph_retriever::storage::MemoryVectorStore;
//! use notegraph_embed::HashEmbeddingProvider;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = VaultConfig::new("/path/to/vault");
//! let embedder = Arc::new(HashEmbeddingProvider::new(384));
//! let store = Arc::new(MemoryVectorStore::new());
//!
//! let engine = Arc::new(IndexEngine::new(
//!     config.clone(),
//!     embedder.clone(),
//!     store.clone(),
//! )?);
//! engine.initialize().await?;
//! engine.rebuild().await?;
//! engine.start_watcher()?;
//!
//! let search = SearchEngine::new(embedder, store, config.similarity_threshold);
//! let response = search.search(&SearchRequest::new("borrow checker")).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Vault files → parser → chunker → embeddings → VectorStore
//!   ↑                                               ↓
//! VaultWatcher → Debouncer → IndexEngine      SearchEngine → results
//!                                 ↓                 ↓
//!                             EventLog        wikilink graph
//! ```

pub mod chunker;
pub mod config;
pub mod debounce;
pub mod event_log;
pub mod indexing_engine;
pub mod model;
pub mod parser;
pub mod path_table;
pub mod search;
pub mod storage;
pub mod watcher;
