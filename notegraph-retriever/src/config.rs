//! Process-wide defaults and the vault configuration

use anyhow::{Result, bail};
use std::path::PathBuf;
use std::time::Duration;

/// Characters per chunk.
pub const CHUNK_SIZE: usize = 512;

/// Overlap between consecutive windows of an oversized section.
pub const CHUNK_OVERLAP: usize = 128;

/// Minimum similarity for a dense prefetch candidate to survive.
pub const SIMILARITY_THRESHOLD: f32 = 0.3;

/// Default number of search results.
pub const TOP_K_DEFAULT: usize = 5;

/// Hard cap on requested results.
pub const MAX_TOP_K: usize = 20;

/// Quiet period before a changed note is reindexed.
pub const DEBOUNCE_DELAY: Duration = Duration::from_secs(2);

/// File extensions the watcher and scanner consider.
pub const WATCH_EXTENSIONS: &[&str] = &[".md"];

/// Ring buffer capacity for recent watcher events.
pub const EVENT_LOG_CAPACITY: usize = 100;

/// Configuration for one vault's indexing pipeline.
///
/// Built with `VaultConfig::new(root)` plus builder methods, then validated
/// once when the engine is constructed.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Root directory of the markdown vault
    pub vault_root: PathBuf,
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between fixed-size windows, in characters
    pub chunk_overlap: usize,
    /// Quiet period for the change debouncer
    pub debounce_delay: Duration,
    /// Extensions (with leading dot) treated as notes
    pub watch_extensions: Vec<String>,
    /// Default similarity floor applied when a query supplies none
    pub similarity_threshold: f32,
    /// Capacity of the watcher event ring buffer
    pub event_log_capacity: usize,
}

impl VaultConfig {
    pub fn new(vault_root: impl Into<PathBuf>) -> Self {
        Self {
            vault_root: vault_root.into(),
            chunk_size: CHUNK_SIZE,
            chunk_overlap: CHUNK_OVERLAP,
            debounce_delay: DEBOUNCE_DELAY,
            watch_extensions: WATCH_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            similarity_threshold: SIMILARITY_THRESHOLD,
            event_log_capacity: EVENT_LOG_CAPACITY,
        }
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn with_chunk_overlap(mut self, overlap: usize) -> Self {
        self.chunk_overlap = overlap;
        self
    }

    pub fn with_debounce_delay(mut self, delay: Duration) -> Self {
        self.debounce_delay = delay;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// True if `path` (any representation) ends with a watched extension.
    pub fn is_watched(&self, path: &str) -> bool {
        self.watch_extensions.iter().any(|ext| path.ends_with(ext))
    }

    /// Overlap must be strictly below chunk size or the window split never advances.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("chunk_size must be > 0");
        }
        if self.chunk_overlap >= self.chunk_size {
            bail!(
                "chunk_overlap ({}) must be strictly less than chunk_size ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        if self.watch_extensions.is_empty() {
            bail!("at least one watched extension is required");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(VaultConfig::new("/tmp/vault").validate().is_ok());
    }

    #[test]
    fn overlap_not_below_size_is_rejected() {
        let config = VaultConfig::new("/tmp/vault")
            .with_chunk_size(100)
            .with_chunk_overlap(100);
        assert!(config.validate().is_err());

        let config = VaultConfig::new("/tmp/vault")
            .with_chunk_size(100)
            .with_chunk_overlap(150);
        assert!(config.validate().is_err());
    }

    #[test]
    fn watched_extension_check() {
        let config = VaultConfig::new("/tmp/vault");
        assert!(config.is_watched("notes/today.md"));
        assert!(!config.is_watched("notes/today.md.bak"));
        assert!(!config.is_watched("image.png"));
    }
}
