//! Hybrid query execution and wikilink-graph enrichment
//!
//! A query is embedded once (dense and sparse), sent to the store in a single
//! hybrid-search call, and the resulting notes are optionally enriched with
//! their one-hop neighborhood in the wikilink graph. Enrichment issues one
//! batched graph query regardless of result count.

use anyhow::Result;
use notegraph_embed::EmbeddingProvider;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::MAX_TOP_K;
use crate::model::{RelatedNote, SearchRequest, SearchResponse};
use crate::storage::{Relationship, VectorStore};

/// Executes search requests against the embedder/store pair.
pub struct SearchEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    /// Applied when a request carries no explicit threshold
    default_threshold: f32,
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("default_threshold", &self.default_threshold)
            .finish()
    }
}

impl SearchEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        default_threshold: f32,
    ) -> Self {
        Self {
            embedder,
            store,
            default_threshold,
        }
    }

    /// Run one search: embed, one hybrid store call, optional enrichment.
    ///
    /// `top_k` is clamped to `[1, MAX_TOP_K]` rather than rejected.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let started = Instant::now();
        let top_k = request.top_k.clamp(1, MAX_TOP_K);
        let threshold = request.threshold.unwrap_or(self.default_threshold);

        let dense = self.embedder.embed_one(&request.query).await?;
        let sparse = self.embedder.embed_one_sparse(&request.query).await?;
        let results = self
            .store
            .hybrid_search(&dense, &sparse, top_k, threshold)
            .await?;

        let related_notes = if request.include_related && !results.is_empty() {
            let paths: HashSet<String> =
                results.iter().map(|r| r.note_path.clone()).collect();
            self.collect_related_notes(&paths).await?
        } else {
            Vec::new()
        };

        let search_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        info!(
            "Search '{}': {} hits, {} related notes in {:.1}ms",
            request.query,
            results.len(),
            related_notes.len(),
            search_time_ms
        );

        Ok(SearchResponse {
            query: request.query.clone(),
            total_hits: results.len(),
            results,
            related_notes,
            search_time_ms,
        })
    }

    /// One-hop neighborhood of the result notes, aggregated over the whole
    /// result set.
    ///
    /// Outgoing and backlink edges to the same neighbor are counted
    /// separately, never merged; a neighbor reached from several result notes
    /// accumulates one count per edge. A neighbor that is itself one of the
    /// result paths is suppressed entirely, so two result notes linking to
    /// each other contribute nothing. Output is ordered by descending count,
    /// then path for determinism.
    async fn collect_related_notes(
        &self,
        result_paths: &HashSet<String>,
    ) -> Result<Vec<RelatedNote>> {
        let relations = self.store.get_related_notes_batch(result_paths).await?;

        let mut counts: HashMap<(String, Relationship), usize> = HashMap::new();
        for edges in relations.values() {
            for edge in edges {
                if result_paths.contains(&edge.related_path) {
                    debug!("Suppressing result-set member {}", edge.related_path);
                    continue;
                }
                *counts
                    .entry((edge.related_path.clone(), edge.relationship))
                    .or_insert(0) += 1;
            }
        }

        let mut related: Vec<RelatedNote> = counts
            .into_iter()
            .map(|((note_path, relationship), link_count)| RelatedNote {
                note_title: title_from_path(&note_path),
                note_path,
                relationship: relationship.as_str().to_string(),
                link_count,
            })
            .collect();
        related.sort_by(|a, b| {
            b.link_count
                .cmp(&a.link_count)
                .then_with(|| a.note_path.cmp(&b.note_path))
        });
        Ok(related)
    }
}

/// Filename stem with the extension stripped; related notes are not parsed,
/// so their real titles are unknown here.
fn title_from_path(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SIMILARITY_THRESHOLD;
    use crate::model::{NoteChunk, WikiLink};
    use crate::storage::MemoryVectorStore;
    use notegraph_embed::HashEmbeddingProvider;

    async fn seeded_engine() -> (SearchEngine, Arc<MemoryVectorStore>) {
        let embedder = Arc::new(HashEmbeddingProvider::new(16));
        let store = Arc::new(MemoryVectorStore::new());

        // Chunks embedded with the same provider the engine queries with, so
        // an identical query text scores 1.0 against its chunk.
        let texts = [
            ("alpha.md", "rust async runtime scheduling"),
            ("beta.md", "sourdough starter hydration"),
            ("gamma.md", "borrow checker lifetimes"),
        ];
        for (path, text) in texts {
            let mut chunk = NoteChunk::new(path, text.to_string(), 0, None);
            chunk.note_title = title_from_path(path);
            chunk.embedding = Some(embedder.embed_one(text).await.unwrap());
            store.bulk_upsert_chunks(&[chunk], None).await.unwrap();
        }

        let engine = SearchEngine::new(
            embedder,
            Arc::clone(&store) as Arc<dyn VectorStore>,
            SIMILARITY_THRESHOLD,
        );
        (engine, store)
    }

    #[tokio::test]
    async fn exact_query_ranks_its_note_first() -> Result<()> {
        let (engine, _) = seeded_engine().await;
        let response = engine
            .search(&SearchRequest::new("rust async runtime scheduling").without_related())
            .await?;

        assert!(!response.results.is_empty());
        assert_eq!(response.results[0].note_path, "alpha.md");
        assert!(response.results[0].score > 0.99);
        assert_eq!(response.total_hits, response.results.len());
        assert!(response.search_time_ms >= 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn top_k_is_clamped_not_rejected() -> Result<()> {
        let (engine, store) = seeded_engine().await;

        // Zero clamps up to one result at most
        let response = engine
            .search(
                &SearchRequest::new("rust async runtime scheduling")
                    .with_top_k(0)
                    .with_threshold(0.0)
                    .without_related(),
            )
            .await?;
        assert_eq!(response.results.len(), 1);

        // An absurd top_k clamps down to the cap
        for i in 0..30 {
            let mut chunk = NoteChunk::new(
                &format!("bulk{i}.md"),
                "rust async runtime scheduling".to_string(),
                0,
                None,
            );
            chunk.embedding = Some(
                HashEmbeddingProvider::new(16)
                    .embed_one("rust async runtime scheduling")
                    .await?,
            );
            store.bulk_upsert_chunks(&[chunk], None).await?;
        }
        let response = engine
            .search(
                &SearchRequest::new("rust async runtime scheduling")
                    .with_top_k(500)
                    .with_threshold(0.0)
                    .without_related(),
            )
            .await?;
        assert_eq!(response.results.len(), MAX_TOP_K);
        Ok(())
    }

    #[tokio::test]
    async fn explicit_threshold_overrides_the_default() -> Result<()> {
        let (engine, _) = seeded_engine().await;
        let response = engine
            .search(
                &SearchRequest::new("rust async runtime scheduling")
                    .with_threshold(1.1)
                    .without_related(),
            )
            .await?;
        assert!(response.results.is_empty());
        assert_eq!(response.total_hits, 0);
        Ok(())
    }

    #[tokio::test]
    async fn related_notes_count_per_direction_and_never_merge() -> Result<()> {
        let (engine, store) = seeded_engine().await;
        store
            .bulk_upsert_links(&[
                // alpha links out to hub twice (distinct link text)
                WikiLink::new("alpha.md", "hub", Some("hub.md".into())),
                WikiLink::new("alpha.md", "Hub Note", Some("hub.md".into())),
                // hub links back into alpha
                WikiLink::new("hub.md", "alpha", Some("alpha.md".into())),
            ])
            .await?;

        let response = engine
            .search(&SearchRequest::new("rust async runtime scheduling"))
            .await?;

        let outgoing = response
            .related_notes
            .iter()
            .find(|r| r.note_path == "hub.md" && r.relationship == "outgoing")
            .unwrap();
        assert_eq!(outgoing.link_count, 2);
        assert_eq!(outgoing.note_title, "hub");

        let backlink = response
            .related_notes
            .iter()
            .find(|r| r.note_path == "hub.md" && r.relationship == "backlink")
            .unwrap();
        assert_eq!(backlink.link_count, 1);

        // Descending by count
        assert!(response.related_notes[0].link_count >= response.related_notes[1].link_count);
        Ok(())
    }

    #[tokio::test]
    async fn mutually_linked_result_notes_are_suppressed() -> Result<()> {
        let (engine, store) = seeded_engine().await;
        store
            .bulk_upsert_links(&[
                // alpha and gamma link to each other and both land in the
                // result set below
                WikiLink::new("alpha.md", "gamma", Some("gamma.md".into())),
                WikiLink::new("gamma.md", "alpha", Some("alpha.md".into())),
            ])
            .await?;

        // Zero threshold pulls all seeded notes into the results
        let response = engine
            .search(&SearchRequest::new("rust async").with_threshold(0.0).with_top_k(10))
            .await?;
        let result_paths: Vec<&str> =
            response.results.iter().map(|r| r.note_path.as_str()).collect();
        assert!(result_paths.contains(&"alpha.md"));
        assert!(result_paths.contains(&"gamma.md"));

        assert!(
            response.related_notes.is_empty(),
            "notes already in the result set must not reappear as related: {:?}",
            response.related_notes
        );
        Ok(())
    }

    #[tokio::test]
    async fn self_references_are_suppressed() -> Result<()> {
        let (engine, store) = seeded_engine().await;
        store
            .bulk_upsert_links(&[WikiLink::new("alpha.md", "alpha", Some("alpha.md".into()))])
            .await?;

        let response = engine
            .search(&SearchRequest::new("rust async runtime scheduling"))
            .await?;
        assert!(
            response
                .related_notes
                .iter()
                .all(|r| r.note_path != "alpha.md"),
            "a note must not appear as related to itself"
        );
        Ok(())
    }

    #[tokio::test]
    async fn enrichment_is_skipped_when_disabled_or_empty() -> Result<()> {
        let (engine, store) = seeded_engine().await;
        store
            .bulk_upsert_links(&[WikiLink::new("alpha.md", "hub", Some("hub.md".into()))])
            .await?;

        let response = engine
            .search(&SearchRequest::new("rust async runtime scheduling").without_related())
            .await?;
        assert!(response.related_notes.is_empty());

        // Nothing above an impossible threshold: no graph query either
        let response = engine
            .search(&SearchRequest::new("rust async runtime scheduling").with_threshold(1.1))
            .await?;
        assert!(response.results.is_empty());
        assert!(response.related_notes.is_empty());
        Ok(())
    }
}
