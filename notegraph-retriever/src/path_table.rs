//! Vault-wide filename-stem to relative-path lookup for wikilink resolution

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Case-insensitive `stem -> vault-relative path` table.
///
/// Rebuilt wholesale by [`scan`](PathTable::scan) and patched incrementally on
/// single-file changes. At most one path per stem; on collision the most
/// recently scanned path wins and the collision is logged, never fatal.
/// Directory-walk order decides collision outcomes and is not guaranteed
/// stable across platforms.
#[derive(Debug)]
pub struct PathTable {
    vault_root: PathBuf,
    watch_extensions: Vec<String>,
    map: HashMap<String, String>,
}

impl PathTable {
    pub fn new(vault_root: impl Into<PathBuf>, watch_extensions: Vec<String>) -> Self {
        Self {
            vault_root: vault_root.into(),
            watch_extensions,
            map: HashMap::new(),
        }
    }

    /// Number of files currently tracked.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Walk the vault and replace the entire table.
    ///
    /// Old entries are discarded even for untouched files, so a deletion that
    /// happened while unobserved cannot leave a stale entry behind.
    pub fn scan(&mut self) {
        self.map.clear();
        for entry in WalkDir::new(&self.vault_root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let file_name = entry.file_name().to_string_lossy();
            if !self.is_watched(&file_name) {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.vault_root) else {
                continue;
            };
            let rel_path = rel.to_string_lossy().to_string();
            let stem = Self::stem_of(&file_name);
            if let Some(previous) = self.map.get(&stem) {
                warn!(
                    "PathTable name collision: '{}' resolves to both '{}' and '{}' (keeping latter)",
                    stem, previous, rel_path
                );
            }
            self.map.insert(stem, rel_path);
        }
        info!("PathTable scanned {} files", self.map.len());
    }

    /// Resolve `[[Link]]` text to a vault-relative path.
    ///
    /// Strips any `#heading` anchor and matches case-insensitively.
    pub fn resolve(&self, link_text: &str) -> Option<&str> {
        let key = link_text
            .split('#')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        self.map.get(&key).map(String::as_str)
    }

    /// Patch the table when a file is created, moved, or renamed.
    pub fn update(&mut self, old_path: Option<&str>, new_path: &str) {
        if let Some(old) = old_path {
            self.map.remove(&Self::stem_of_path(old));
        }
        self.map
            .insert(Self::stem_of_path(new_path), new_path.to_string());
    }

    /// Drop the entry for a deleted file.
    pub fn remove(&mut self, path: &str) {
        self.map.remove(&Self::stem_of_path(path));
    }

    /// Whether a file is tracked, keyed by its filename stem.
    pub fn has(&self, path: &str) -> bool {
        self.map.contains_key(&Self::stem_of_path(path))
    }

    fn is_watched(&self, file_name: &str) -> bool {
        self.watch_extensions
            .iter()
            .any(|ext| file_name.ends_with(ext))
    }

    fn stem_of(file_name: &str) -> String {
        Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    fn stem_of_path(path: &str) -> String {
        Path::new(path)
            .file_name()
            .map(|n| Self::stem_of(&n.to_string_lossy()))
            .unwrap_or_default()
    }
}
