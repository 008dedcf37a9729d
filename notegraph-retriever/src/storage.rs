//! Vector/graph storage contract consumed by the indexing and search engines
//!
//! The real store is a remote service performing approximate nearest-neighbor
//! search, sparse keyword search, and server-side Reciprocal Rank Fusion; the
//! core only depends on this trait. Upserts are keyed by deterministic string
//! keys (chunk id, or `source::link_text` for links) so that repeating an
//! upsert overwrites instead of duplicating, and deletes are scoped by exact
//! path match. [`MemoryVectorStore`] is the in-process reference
//! implementation used by tests.

use anyhow::Result;
use async_trait::async_trait;
use notegraph_embed::SparseVector;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::model::{NoteChunk, SearchResultItem, WikiLink};

/// Direction of a link-graph relationship relative to a result note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    /// The result note links out to the related note
    Outgoing,
    /// The related note links into the result note
    Backlink,
}

impl Relationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::Outgoing => "outgoing",
            Relationship::Backlink => "backlink",
        }
    }
}

/// One edge returned by the batch link-graph query.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkEdge {
    pub related_path: String,
    pub relationship: Relationship,
}

/// Storage collaborator contract.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Idempotent schema setup for the chunk and link collections.
    async fn ensure_collections(&self) -> Result<()>;

    /// Upsert chunks (with dense embeddings attached) and their sparse
    /// vectors, keyed by chunk id. Sparse vectors are positional 1:1 with
    /// `chunks` when supplied.
    async fn bulk_upsert_chunks(
        &self,
        chunks: &[NoteChunk],
        sparse_vectors: Option<&[SparseVector]>,
    ) -> Result<()>;

    /// Upsert wikilinks keyed by `source::link_text`.
    async fn bulk_upsert_links(&self, links: &[WikiLink]) -> Result<()>;

    /// Delete every chunk belonging to `note_path`.
    async fn delete_by_note_path(&self, note_path: &str) -> Result<()>;

    /// Delete every outgoing link recorded for `source_path`.
    async fn delete_links_by_source(&self, source_path: &str) -> Result<()>;

    /// Hybrid dense+sparse search. The store prefetches a thresholded dense
    /// top-`2*top_k` and a sparse top-`2*top_k`, fuses them by RRF, and
    /// returns the final top-`top_k` scored hits.
    async fn hybrid_search(
        &self,
        dense: &[f32],
        sparse: &SparseVector,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchResultItem>>;

    /// One batch query for outgoing links and one for backlinks over
    /// `paths`; never one query per path.
    async fn get_related_notes_batch(
        &self,
        paths: &HashSet<String>,
    ) -> Result<HashMap<String, Vec<LinkEdge>>>;

    /// Total chunk count in the index.
    async fn get_chunks_count(&self) -> Result<usize>;

    /// Distinct note paths present in the chunk collection.
    async fn get_indexed_note_paths(&self) -> Result<HashSet<String>>;

    /// Whether the store is reachable.
    async fn is_healthy(&self) -> bool;
}

/// Operations a [`MemoryVectorStore`] records, for ordering assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    EnsureCollections,
    UpsertChunks { note_path: String, count: usize },
    UpsertLinks { source_path: String, count: usize },
    DeleteChunks { note_path: String },
    DeleteLinks { source_path: String },
}

#[derive(Debug, Default)]
struct MemoryInner {
    /// chunk_id -> (chunk, sparse vector)
    chunks: HashMap<String, (NoteChunk, Option<SparseVector>)>,
    /// storage key -> link
    links: HashMap<String, WikiLink>,
    ops: Vec<StoreOp>,
    healthy: bool,
}

/// In-memory [`VectorStore`] with an operation log.
///
/// Ranks by dense cosine similarity only; good enough for exercising the
/// pipeline, not a fusion engine. Every mutating call is appended to the op
/// log so tests can assert delete-before-insert ordering.
#[derive(Debug)]
pub struct MemoryVectorStore {
    inner: Mutex<MemoryInner>,
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                healthy: true,
                ..MemoryInner::default()
            }),
        }
    }

    /// Mark the store unreachable so tests can exercise failure reporting.
    pub fn set_healthy(&self, healthy: bool) {
        self.inner.lock().unwrap().healthy = healthy;
    }

    /// Snapshot of the recorded operations, oldest first.
    pub fn ops(&self) -> Vec<StoreOp> {
        self.inner.lock().unwrap().ops.clone()
    }

    /// All stored links, unordered.
    pub fn links(&self) -> Vec<WikiLink> {
        self.inner.lock().unwrap().links.values().cloned().collect()
    }

    /// All chunks stored for one note, ordered by chunk index.
    pub fn chunks_for(&self, note_path: &str) -> Vec<NoteChunk> {
        let inner = self.inner.lock().unwrap();
        let mut chunks: Vec<NoteChunk> = inner
            .chunks
            .values()
            .filter(|(c, _)| c.note_path == note_path)
            .map(|(c, _)| c.clone())
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        chunks
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            0.0
        } else {
            dot / (norm_a * norm_b)
        }
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn ensure_collections(&self) -> Result<()> {
        self.inner.lock().unwrap().ops.push(StoreOp::EnsureCollections);
        Ok(())
    }

    async fn bulk_upsert_chunks(
        &self,
        chunks: &[NoteChunk],
        sparse_vectors: Option<&[SparseVector]>,
    ) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner.lock().unwrap();
        inner.ops.push(StoreOp::UpsertChunks {
            note_path: chunks[0].note_path.clone(),
            count: chunks.len(),
        });
        for (i, chunk) in chunks.iter().enumerate() {
            let sparse = sparse_vectors.and_then(|s| s.get(i)).cloned();
            inner
                .chunks
                .insert(chunk.chunk_id.clone(), (chunk.clone(), sparse));
        }
        Ok(())
    }

    async fn bulk_upsert_links(&self, links: &[WikiLink]) -> Result<()> {
        if links.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner.lock().unwrap();
        inner.ops.push(StoreOp::UpsertLinks {
            source_path: links[0].source_path.clone(),
            count: links.len(),
        });
        for link in links {
            inner.links.insert(link.storage_key(), link.clone());
        }
        Ok(())
    }

    async fn delete_by_note_path(&self, note_path: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.ops.push(StoreOp::DeleteChunks {
            note_path: note_path.to_string(),
        });
        inner.chunks.retain(|_, (c, _)| c.note_path != note_path);
        Ok(())
    }

    async fn delete_links_by_source(&self, source_path: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.ops.push(StoreOp::DeleteLinks {
            source_path: source_path.to_string(),
        });
        inner.links.retain(|_, l| l.source_path != source_path);
        Ok(())
    }

    async fn hybrid_search(
        &self,
        dense: &[f32],
        _sparse: &SparseVector,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchResultItem>> {
        let inner = self.inner.lock().unwrap();
        let mut scored: Vec<SearchResultItem> = inner
            .chunks
            .values()
            .filter_map(|(chunk, _)| {
                let embedding = chunk.embedding.as_ref()?;
                let score = Self::cosine(dense, embedding);
                (score >= threshold).then(|| SearchResultItem {
                    chunk_id: chunk.chunk_id.clone(),
                    note_path: chunk.note_path.clone(),
                    note_title: chunk.note_title.clone(),
                    content: chunk.content.clone(),
                    score,
                    heading_context: chunk.heading_context.clone(),
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn get_related_notes_batch(
        &self,
        paths: &HashSet<String>,
    ) -> Result<HashMap<String, Vec<LinkEdge>>> {
        let inner = self.inner.lock().unwrap();
        let mut relations: HashMap<String, Vec<LinkEdge>> =
            paths.iter().map(|p| (p.clone(), Vec::new())).collect();

        for link in inner.links.values() {
            // Outgoing: source is one of the result paths
            if let Some(target) = &link.resolved_target_path {
                if let Some(edges) = relations.get_mut(&link.source_path) {
                    edges.push(LinkEdge {
                        related_path: target.clone(),
                        relationship: Relationship::Outgoing,
                    });
                }
                // Backlink: resolved target is one of the result paths
                if let Some(edges) = relations.get_mut(target) {
                    edges.push(LinkEdge {
                        related_path: link.source_path.clone(),
                        relationship: Relationship::Backlink,
                    });
                }
            }
        }
        Ok(relations)
    }

    async fn get_chunks_count(&self) -> Result<usize> {
        Ok(self.inner.lock().unwrap().chunks.len())
    }

    async fn get_indexed_note_paths(&self) -> Result<HashSet<String>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .chunks
            .values()
            .map(|(c, _)| c.note_path.clone())
            .collect())
    }

    async fn is_healthy(&self) -> bool {
        self.inner.lock().unwrap().healthy
    }
}
