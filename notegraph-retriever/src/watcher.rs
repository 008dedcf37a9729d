//! Filesystem watching: raw notify events normalized to vault events

use anyhow::Result;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::event_log::{WatcherEvent, WatcherEventKind};

/// Turns raw notify events into normalized [`WatcherEvent`]s scoped to the
/// watched extensions, with absolute paths translated to vault-relative ones.
///
/// Cross-extension moves follow the scope rules: a move out of scope becomes
/// a delete of the source, a move into scope becomes a create of the
/// destination.
#[derive(Debug, Clone)]
pub struct EventNormalizer {
    vault_root: PathBuf,
    watch_extensions: Vec<String>,
}

impl EventNormalizer {
    pub fn new(vault_root: impl Into<PathBuf>, watch_extensions: Vec<String>) -> Self {
        Self {
            vault_root: vault_root.into(),
            watch_extensions,
        }
    }

    fn is_watched(&self, path: &Path) -> bool {
        let name = path.to_string_lossy();
        self.watch_extensions.iter().any(|ext| name.ends_with(ext))
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.vault_root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    }

    /// Map one raw event to at most one normalized event.
    pub fn normalize(&self, kind: &EventKind, paths: &[PathBuf]) -> Option<WatcherEvent> {
        match kind {
            EventKind::Create(_) => {
                let path = paths.first().filter(|p| self.is_watched(p))?;
                Some(WatcherEvent::new(WatcherEventKind::Created, self.relative(path)))
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                let (from, to) = match paths {
                    [from, to, ..] => (from, to),
                    _ => return None,
                };
                match (self.is_watched(from), self.is_watched(to)) {
                    (true, true) => Some(WatcherEvent::moved(self.relative(from), self.relative(to))),
                    // Renamed out of watch scope: the source is gone
                    (true, false) => {
                        Some(WatcherEvent::new(WatcherEventKind::Deleted, self.relative(from)))
                    }
                    // Renamed into watch scope: the destination appeared
                    (false, true) => {
                        Some(WatcherEvent::new(WatcherEventKind::Created, self.relative(to)))
                    }
                    (false, false) => None,
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                let path = paths.first().filter(|p| self.is_watched(p))?;
                Some(WatcherEvent::new(WatcherEventKind::Deleted, self.relative(path)))
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                let path = paths.first().filter(|p| self.is_watched(p))?;
                Some(WatcherEvent::new(WatcherEventKind::Created, self.relative(path)))
            }
            EventKind::Modify(_) => {
                let path = paths.first().filter(|p| self.is_watched(p))?;
                Some(WatcherEvent::new(WatcherEventKind::Modified, self.relative(path)))
            }
            EventKind::Remove(_) => {
                let path = paths.first().filter(|p| self.is_watched(p))?;
                Some(WatcherEvent::new(WatcherEventKind::Deleted, self.relative(path)))
            }
            _ => None,
        }
    }
}

/// Watches a vault recursively and ships normalized events over a channel.
///
/// The notify callback runs on the watcher's own thread; events cross into
/// async land through the unbounded sender, so the callback never blocks.
pub struct VaultWatcher {
    vault_root: PathBuf,
    watcher: Option<RecommendedWatcher>,
}

impl std::fmt::Debug for VaultWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultWatcher")
            .field("vault_root", &self.vault_root)
            .field("running", &self.is_running())
            .finish()
    }
}

impl VaultWatcher {
    /// Start watching `vault_root` recursively, emitting normalized events on
    /// `events_tx`.
    pub fn start(
        vault_root: impl Into<PathBuf>,
        watch_extensions: Vec<String>,
        events_tx: mpsc::UnboundedSender<WatcherEvent>,
    ) -> Result<Self> {
        let vault_root = vault_root.into();
        let normalizer = EventNormalizer::new(&vault_root, watch_extensions);

        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if let Some(normalized) = normalizer.normalize(&event.kind, &event.paths) {
                        debug!("Watcher event: {normalized:?}");
                        if events_tx.send(normalized).is_err() {
                            debug!("Watcher event dropped: dispatcher is gone");
                        }
                    }
                }
                Err(err) => warn!("Watcher error: {err}"),
            })?;
        watcher.watch(&vault_root, RecursiveMode::Recursive)?;
        info!("File watcher started for: {}", vault_root.display());

        Ok(Self {
            vault_root,
            watcher: Some(watcher),
        })
    }

    /// Stop watching. Idempotent.
    pub fn stop(&mut self) {
        if self.watcher.take().is_some() {
            info!("File watcher stopped for: {}", self.vault_root.display());
        }
    }

    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    fn normalizer() -> EventNormalizer {
        EventNormalizer::new("/vault", vec![".md".to_string()])
    }

    fn path(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    #[test]
    fn create_and_modify_map_to_relative_paths() {
        let n = normalizer();

        let created = n
            .normalize(&EventKind::Create(CreateKind::File), &[path("/vault/sub/a.md")])
            .unwrap();
        assert_eq!(created.kind, WatcherEventKind::Created);
        assert_eq!(created.path, "sub/a.md");

        let modified = n
            .normalize(
                &EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                &[path("/vault/a.md")],
            )
            .unwrap();
        assert_eq!(modified.kind, WatcherEventKind::Modified);
        assert_eq!(modified.path, "a.md");
    }

    #[test]
    fn unwatched_extensions_are_ignored() {
        let n = normalizer();
        assert!(n
            .normalize(&EventKind::Create(CreateKind::File), &[path("/vault/a.png")])
            .is_none());
        assert!(n
            .normalize(&EventKind::Remove(RemoveKind::File), &[path("/vault/notes.txt")])
            .is_none());
    }

    #[test]
    fn remove_maps_to_deleted() {
        let event = normalizer()
            .normalize(&EventKind::Remove(RemoveKind::File), &[path("/vault/gone.md")])
            .unwrap();
        assert_eq!(event.kind, WatcherEventKind::Deleted);
        assert_eq!(event.path, "gone.md");
    }

    #[test]
    fn rename_within_scope_is_a_move() {
        let event = normalizer()
            .normalize(
                &EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &[path("/vault/old.md"), path("/vault/new.md")],
            )
            .unwrap();
        assert_eq!(event.kind, WatcherEventKind::Moved);
        assert_eq!(event.path, "old.md");
        assert_eq!(event.dest_path.as_deref(), Some("new.md"));
    }

    #[test]
    fn rename_out_of_scope_is_a_delete_of_the_source() {
        let event = normalizer()
            .normalize(
                &EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &[path("/vault/note.md"), path("/vault/note.txt")],
            )
            .unwrap();
        assert_eq!(event.kind, WatcherEventKind::Deleted);
        assert_eq!(event.path, "note.md");
    }

    #[test]
    fn rename_into_scope_is_a_create_of_the_destination() {
        let event = normalizer()
            .normalize(
                &EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &[path("/vault/draft.txt"), path("/vault/draft.md")],
            )
            .unwrap();
        assert_eq!(event.kind, WatcherEventKind::Created);
        assert_eq!(event.path, "draft.md");
    }

    #[test]
    fn rename_entirely_out_of_scope_is_ignored() {
        assert!(normalizer()
            .normalize(
                &EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &[path("/vault/a.txt"), path("/vault/b.txt")],
            )
            .is_none());
    }
}
