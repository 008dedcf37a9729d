//! Orchestration of the indexing pipeline: rebuilds, single-note updates,
//! and the watcher-driven change loop
//!
//! ## Pipeline flow
//!
//! ```text
//! VaultWatcher → Debouncer / direct → IndexEngine
//!                                        ├── PathTable (wikilink resolution)
//!                                        ├── parser → chunker
//!                                        ├── EmbeddingProvider (dense + sparse, batched per note)
//!                                        └── VectorStore (delete-before-insert upserts)
//! ```
//!
//! A full rebuild is guarded by an atomic compare-and-set: a second rebuild
//! request while one runs is rejected with
//! [`RebuildOutcome::AlreadyRunning`], never queued or blocked. Single-note
//! operations are deliberately NOT gated by that flag and may interleave with
//! a rebuild; deletes and upserts are idempotent and keyed by deterministic
//! chunk/link ids, so the worst interleaving costs redundant work, not
//! corruption.

use anyhow::Result;
use chrono::{DateTime, Utc};
use notegraph_embed::EmbeddingProvider;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::chunker::Chunker;
use crate::config::VaultConfig;
use crate::debounce::{DebounceCallback, Debouncer};
use crate::event_log::{EventLog, WatcherEvent, WatcherEventKind};
use crate::model::{IndexStatus, RebuildOutcome, RebuildReport};
use crate::parser;
use crate::path_table::PathTable;
use crate::storage::VectorStore;
use crate::watcher::VaultWatcher;

/// How long shutdown waits for the dispatcher before detaching.
const WATCHER_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Releases the rebuild flag on every exit path, including early `?` returns.
struct RebuildGuard<'a>(&'a AtomicBool);

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Running watcher pipeline: notify watcher, dispatch task, debouncer.
struct WatchHandle {
    debouncer: Arc<Debouncer>,
    watcher: VaultWatcher,
    dispatcher: tokio::task::JoinHandle<()>,
}

/// Owns the reindex state machine and all index mutations.
///
/// Collaborators are injected; there are no process-wide singletons, so tests
/// substitute an in-memory store and a deterministic embedder freely.
pub struct IndexEngine {
    config: VaultConfig,
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    path_table: RwLock<PathTable>,
    event_log: Arc<EventLog>,
    rebuilding: AtomicBool,
    last_indexed: Mutex<Option<DateTime<Utc>>>,
    watch: Mutex<Option<WatchHandle>>,
}

impl std::fmt::Debug for IndexEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexEngine")
            .field("vault_root", &self.config.vault_root)
            .field("rebuilding", &self.rebuilding.load(Ordering::SeqCst))
            .finish()
    }
}

impl IndexEngine {
    pub fn new(
        config: VaultConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        config.validate()?;
        let chunker = Chunker::new(config.chunk_size, config.chunk_overlap);
        let path_table = RwLock::new(PathTable::new(
            &config.vault_root,
            config.watch_extensions.clone(),
        ));
        let event_log = Arc::new(EventLog::new(config.event_log_capacity));
        Ok(Self {
            config,
            chunker,
            embedder,
            store,
            path_table,
            event_log,
            rebuilding: AtomicBool::new(false),
            last_indexed: Mutex::new(None),
            watch: Mutex::new(None),
        })
    }

    /// Scan the path table and make sure the backing collections exist.
    pub async fn initialize(&self) -> Result<()> {
        self.path_table.write().unwrap().scan();
        self.store.ensure_collections().await
    }

    /// Full re-index of every watched file under the vault root.
    ///
    /// Rejected immediately with [`RebuildOutcome::AlreadyRunning`] if a
    /// rebuild is in flight. Files are processed in sorted relative-path
    /// order; a file that fails to read is skipped with a warning. There is
    /// no cross-file atomicity: a query racing the rebuild may observe a
    /// partially updated index.
    pub async fn rebuild(&self) -> Result<RebuildOutcome> {
        if self
            .rebuilding
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("Rebuild requested while one is already running, rejecting");
            return Ok(RebuildOutcome::AlreadyRunning);
        }
        let _guard = RebuildGuard(&self.rebuilding);

        let started = Instant::now();
        self.path_table.write().unwrap().scan();
        self.store.ensure_collections().await?;

        let note_files = self.collect_note_files();
        let mut notes_indexed = 0usize;
        let mut chunks_created = 0usize;

        for rel_path in &note_files {
            // Stale chunks must never outlive a reindex of their note
            self.store.delete_by_note_path(rel_path).await?;
            self.store.delete_links_by_source(rel_path).await?;
            chunks_created += self.index_file(rel_path).await?;
            notes_indexed += 1;
        }

        let elapsed = started.elapsed().as_secs_f64();
        *self.last_indexed.lock().unwrap() = Some(Utc::now());
        info!(
            "Rebuild complete: {} notes, {} chunks in {:.1}s",
            notes_indexed, chunks_created, elapsed
        );

        Ok(RebuildOutcome::Completed(RebuildReport {
            status: "success".to_string(),
            notes_indexed,
            chunks_created,
            time_taken_seconds: (elapsed * 10.0).round() / 10.0,
        }))
    }

    /// Index or update a single note. A vanished file is skipped with a
    /// warning; this is the normal race with deletion.
    pub async fn index_single_note(&self, note_path: &str) -> Result<()> {
        let abs_path = self.config.vault_root.join(note_path);
        if !abs_path.exists() {
            warn!("File not found, skipping: {note_path}");
            return Ok(());
        }

        self.store.delete_by_note_path(note_path).await?;
        self.store.delete_links_by_source(note_path).await?;
        self.index_file(note_path).await?;
        Ok(())
    }

    /// Remove a note's chunks and links from storage and drop it from the
    /// path table.
    pub async fn delete_note(&self, note_path: &str) -> Result<()> {
        self.store.delete_by_note_path(note_path).await?;
        self.store.delete_links_by_source(note_path).await?;
        self.path_table.write().unwrap().remove(note_path);
        info!("Deleted note from index: {note_path}");
        Ok(())
    }

    /// Handle a rename/move: purge the old path, patch the table, reindex
    /// the new path.
    pub async fn rename_note(&self, old_path: &str, new_path: &str) -> Result<()> {
        self.store.delete_by_note_path(old_path).await?;
        self.store.delete_links_by_source(old_path).await?;
        self.path_table
            .write()
            .unwrap()
            .update(Some(old_path), new_path);
        self.index_single_note(new_path).await?;
        info!("Renamed note in index: {old_path} -> {new_path}");
        Ok(())
    }

    /// Debounced-change entry point: classify, record, patch the table,
    /// reindex.
    pub async fn on_note_changed(&self, note_path: &str) -> Result<()> {
        let kind = if self.path_table.read().unwrap().has(note_path) {
            WatcherEventKind::Modified
        } else {
            WatcherEventKind::Created
        };
        self.event_log.record(WatcherEvent::new(kind, note_path));
        self.path_table.write().unwrap().update(None, note_path);
        self.index_single_note(note_path).await
    }

    /// Live index statistics, counted from storage rather than cached.
    pub async fn get_status(&self) -> IndexStatus {
        let indexed_chunks = self.store.get_chunks_count().await.unwrap_or(0);
        let indexed_notes = self
            .store
            .get_indexed_note_paths()
            .await
            .map(|paths| paths.len())
            .unwrap_or(0);
        IndexStatus {
            indexed_notes,
            indexed_chunks,
            last_indexed: *self.last_indexed.lock().unwrap(),
            watcher_running: self.watcher_running(),
            store_healthy: self.store.is_healthy().await,
        }
    }

    /// Start the watcher pipeline: filesystem events → debouncer → reindex.
    /// Idempotent; a second start while running is a no-op.
    pub fn start_watcher(self: &Arc<Self>) -> Result<()> {
        let mut watch = self.watch.lock().unwrap();
        if watch.is_some() {
            return Ok(());
        }

        let weak = Arc::downgrade(self);
        let callback: DebounceCallback = Arc::new(move |note_path: String| {
            let weak = weak.clone();
            Box::pin(async move {
                match weak.upgrade() {
                    Some(engine) => engine.on_note_changed(&note_path).await,
                    None => Ok(()),
                }
            })
        });
        let debouncer = Arc::new(Debouncer::new(self.config.debounce_delay, callback));

        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<WatcherEvent>();
        let watcher = VaultWatcher::start(
            &self.config.vault_root,
            self.config.watch_extensions.clone(),
            events_tx,
        )?;

        let dispatcher = tokio::spawn({
            let weak = Arc::downgrade(self);
            let debouncer = Arc::clone(&debouncer);
            async move {
                while let Some(event) = events_rx.recv().await {
                    let Some(engine) = weak.upgrade() else { break };
                    match event.kind {
                        // Creates and modifies coalesce through the debouncer;
                        // classification happens when the timer fires.
                        WatcherEventKind::Created | WatcherEventKind::Modified => {
                            debouncer.trigger(&event.path);
                        }
                        WatcherEventKind::Deleted => {
                            engine.event_log.record(event.clone());
                            if let Err(err) = engine.delete_note(&event.path).await {
                                error!("Failed to delete {}: {err:#}", event.path);
                            }
                        }
                        WatcherEventKind::Moved => {
                            engine.event_log.record(event.clone());
                            if let Some(dest) = event.dest_path.as_deref() {
                                if let Err(err) = engine.rename_note(&event.path, dest).await {
                                    error!(
                                        "Failed to rename {} -> {dest}: {err:#}",
                                        event.path
                                    );
                                }
                            }
                        }
                    }
                }
            }
        });

        *watch = Some(WatchHandle {
            debouncer,
            watcher,
            dispatcher,
        });
        info!("Watcher pipeline started");
        Ok(())
    }

    /// Stop the watcher pipeline: cancel pending debounce timers, stop the
    /// notify watcher, and wait a bounded time for the dispatcher to drain.
    /// In-flight indexing operations are not interrupted.
    pub async fn stop_watcher(&self) {
        let handle = self.watch.lock().unwrap().take();
        let Some(mut handle) = handle else { return };

        handle.debouncer.cancel_all();
        handle.watcher.stop();
        if tokio::time::timeout(WATCHER_JOIN_TIMEOUT, handle.dispatcher)
            .await
            .is_err()
        {
            warn!("Watcher dispatcher did not stop in time, detaching");
        }
        info!("Watcher pipeline stopped");
    }

    pub fn watcher_running(&self) -> bool {
        self.watch
            .lock()
            .unwrap()
            .as_ref()
            .map(|h| h.watcher.is_running())
            .unwrap_or(false)
    }

    /// Recent watcher events, newest first.
    pub fn recent_events(&self, limit: usize) -> Vec<WatcherEvent> {
        self.event_log.get_recent(limit)
    }

    /// Resolve wikilink text against the current path table.
    pub fn resolve_link(&self, link_text: &str) -> Option<String> {
        self.path_table
            .read()
            .unwrap()
            .resolve(link_text)
            .map(str::to_string)
    }

    /// Watched files under the vault root, as sorted relative paths.
    fn collect_note_files(&self) -> Vec<String> {
        let mut files: Vec<String> = WalkDir::new(&self.config.vault_root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| self.config.is_watched(&e.file_name().to_string_lossy()))
            .filter_map(|e| {
                e.path()
                    .strip_prefix(&self.config.vault_root)
                    .ok()
                    .map(|rel| rel.to_string_lossy().to_string())
            })
            .collect();
        files.sort();
        files
    }

    /// Parse, chunk, embed, and upsert one file. Returns the chunk count.
    /// Read failures are skipped with a warning; collaborator failures
    /// propagate and abort this file's processing.
    async fn index_file(&self, rel_path: &str) -> Result<usize> {
        let abs_path = self.config.vault_root.join(rel_path);
        let content = match tokio::fs::read_to_string(&abs_path).await {
            Ok(content) => content,
            Err(err) => {
                warn!("Failed to read file {}: {err}", abs_path.display());
                return Ok(0);
            }
        };
        let last_modified = file_mtime(&abs_path).await;

        let (metadata, links) = {
            let table = self.path_table.read().unwrap();
            parser::parse(rel_path, &content, last_modified, &table)
        };

        let body = parser::body_of(&content);
        let mut chunks = self.chunker.chunk(rel_path, body);
        if chunks.is_empty() {
            return Ok(0);
        }

        // Denormalize note-level metadata into each chunk's payload
        for chunk in &mut chunks {
            chunk.note_title = metadata.title.clone();
            chunk.tags = metadata.tags.clone();
            chunk.last_modified = Some(metadata.last_modified);
        }

        // One dense and one sparse batch per note
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let dense = self.embedder.embed_batch(&texts).await?;
        let sparse = self.embedder.embed_batch_sparse(&texts).await?;
        for (chunk, embedding) in chunks.iter_mut().zip(dense) {
            chunk.embedding = Some(embedding);
        }

        self.store.bulk_upsert_chunks(&chunks, Some(&sparse)).await?;
        self.store.bulk_upsert_links(&links).await?;
        Ok(chunks.len())
    }
}

async fn file_mtime(path: &Path) -> Option<DateTime<Utc>> {
    tokio::fs::metadata(path)
        .await
        .ok()
        .and_then(|m| m.modified().ok())
        .map(DateTime::<Utc>::from)
}
