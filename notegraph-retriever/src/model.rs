//! Core data model: notes, chunks, links, and search shapes

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::config::TOP_K_DEFAULT;

/// Metadata extracted from one markdown note.
///
/// Recomputed whenever the note is (re)indexed; a new value supersedes the
/// old one, it is never mutated in place.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NoteMetadata {
    /// Vault-relative path, the unique key for the note
    pub path: String,
    /// Frontmatter `title`, else first H1, else filename stem
    pub title: String,
    pub last_modified: DateTime<Utc>,
    /// Arbitrary frontmatter key-value pairs
    pub frontmatter: BTreeMap<String, serde_json::Value>,
    /// Sorted, deduplicated union of frontmatter and inline tags
    pub tags: Vec<String>,
    pub word_count: usize,
}

/// A bounded passage of one note, the unit of retrieval.
///
/// Ephemeral: produced during one indexing pass, upserted, then dropped.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NoteChunk {
    /// `"{path}#chunk{N}"` with N sequential across the whole note
    pub chunk_id: String,
    pub note_path: String,
    pub content: String,
    pub chunk_index: usize,
    /// ` > `-joined chain of active ancestor headings, if any
    pub heading_context: Option<String>,
    /// Denormalized from [`NoteMetadata`] at index time
    pub note_title: String,
    pub tags: Vec<String>,
    pub last_modified: Option<DateTime<Utc>>,
    /// Dense embedding attached after the parse/split step
    pub embedding: Option<Vec<f32>>,
}

impl NoteChunk {
    pub fn new(note_path: &str, content: String, chunk_index: usize, heading_context: Option<String>) -> Self {
        Self {
            chunk_id: format!("{note_path}#chunk{chunk_index}"),
            note_path: note_path.to_string(),
            content,
            chunk_index,
            heading_context,
            note_title: String::new(),
            tags: Vec::new(),
            last_modified: None,
            embedding: None,
        }
    }
}

/// A wikilink from one note to another, possibly unresolved.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WikiLink {
    pub source_path: String,
    /// Text before any `|` alias separator, case preserved
    pub link_text: String,
    /// None when no note matches the link text
    pub resolved_target_path: Option<String>,
    pub link_type: String,
}

impl WikiLink {
    pub fn new(source_path: &str, link_text: &str, resolved_target_path: Option<String>) -> Self {
        Self {
            source_path: source_path.to_string(),
            link_text: link_text.to_string(),
            resolved_target_path,
            link_type: "wikilink".to_string(),
        }
    }

    /// Stable key the store derives deterministic point ids from.
    pub fn storage_key(&self) -> String {
        format!("{}::{}", self.source_path, self.link_text)
    }
}

/// One search invocation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: usize,
    pub include_related: bool,
    /// Similarity floor; the configured default applies when None
    pub threshold: Option<f32>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: TOP_K_DEFAULT,
            include_related: true,
            threshold: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn without_related(mut self) -> Self {
        self.include_related = false;
        self
    }
}

/// A single fused, scored hit returned by the store.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchResultItem {
    pub chunk_id: String,
    pub note_path: String,
    pub note_title: String,
    pub content: String,
    pub score: f32,
    pub heading_context: Option<String>,
}

/// A note related to the result set via the wikilink graph.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RelatedNote {
    pub note_path: String,
    /// Filename stem, extension stripped
    pub note_title: String,
    /// "outgoing" or "backlink"; the two are never merged
    pub relationship: String,
    pub link_count: usize,
}

/// Everything one search call produces.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResultItem>,
    pub related_notes: Vec<RelatedNote>,
    /// Count after top-k and threshold filtering, not total index matches
    pub total_hits: usize,
    pub search_time_ms: f64,
}

/// Aggregate result of a completed full rebuild.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RebuildReport {
    pub status: String,
    pub notes_indexed: usize,
    pub chunks_created: usize,
    pub time_taken_seconds: f64,
}

/// Outcome of a rebuild request; a concurrent rebuild is rejected, not queued.
#[derive(Debug, Clone, PartialEq)]
pub enum RebuildOutcome {
    Completed(RebuildReport),
    AlreadyRunning,
}

/// Live index statistics, queried from the store rather than cached.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IndexStatus {
    pub indexed_notes: usize,
    pub indexed_chunks: usize,
    pub last_indexed: Option<DateTime<Utc>>,
    pub watcher_running: bool,
    pub store_healthy: bool,
}
