//! Ring-buffered history of recent watcher events

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Default number of events returned by [`EventLog::get_recent`].
pub const RECENT_EVENTS_DEFAULT: usize = 50;

/// What happened to a file, as seen by the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatcherEventKind {
    Created,
    Modified,
    Deleted,
    Moved,
}

/// A single normalized file-watcher event. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WatcherEvent {
    pub kind: WatcherEventKind,
    /// Vault-relative path
    pub path: String,
    pub timestamp: DateTime<Utc>,
    /// Destination path, set for moves only
    pub dest_path: Option<String>,
}

impl WatcherEvent {
    pub fn new(kind: WatcherEventKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            timestamp: Utc::now(),
            dest_path: None,
        }
    }

    pub fn moved(path: impl Into<String>, dest_path: impl Into<String>) -> Self {
        Self {
            kind: WatcherEventKind::Moved,
            path: path.into(),
            timestamp: Utc::now(),
            dest_path: Some(dest_path.into()),
        }
    }
}

/// Fixed-capacity ring buffer of recent watcher events.
///
/// Appends evict oldest-first once full. Safe for concurrent append/read from
/// watcher-callback and request-handling threads; the lock covers only buffer
/// mutation, never caller logic.
#[derive(Debug)]
pub struct EventLog {
    capacity: usize,
    buffer: Mutex<VecDeque<WatcherEvent>>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append an event, evicting the oldest entry once full.
    pub fn record(&self, event: WatcherEvent) {
        let mut buffer = self.buffer.lock().unwrap();
        if buffer.len() == self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(event);
    }

    /// Up to `limit` most recent events, newest first.
    pub fn get_recent(&self, limit: usize) -> Vec<WatcherEvent> {
        let buffer = self.buffer.lock().unwrap();
        buffer.iter().rev().take(limit).cloned().collect()
    }

    /// [`get_recent`](Self::get_recent) with the standard limit of
    /// [`RECENT_EVENTS_DEFAULT`].
    pub fn get_recent_default(&self) -> Vec<WatcherEvent> {
        self.get_recent(RECENT_EVENTS_DEFAULT)
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn capacity_is_never_exceeded_and_oldest_evicts_first() {
        let log = EventLog::new(3);
        for i in 0..5 {
            log.record(WatcherEvent::new(
                WatcherEventKind::Modified,
                format!("note{i}.md"),
            ));
        }
        assert_eq!(log.len(), 3);

        let recent = log.get_recent(10);
        let paths: Vec<&str> = recent.iter().map(|e| e.path.as_str()).collect();
        // Newest first; note0 and note1 were evicted
        assert_eq!(paths, vec!["note4.md", "note3.md", "note2.md"]);
    }

    #[test]
    fn get_recent_caps_at_limit() {
        let log = EventLog::new(10);
        for i in 0..6 {
            log.record(WatcherEvent::new(
                WatcherEventKind::Created,
                format!("n{i}.md"),
            ));
        }
        let recent = log.get_recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].path, "n5.md");
        assert_eq!(recent[1].path, "n4.md");
    }

    #[test]
    fn default_limit_caps_the_recent_view() {
        let log = EventLog::new(80);
        for i in 0..70 {
            log.record(WatcherEvent::new(
                WatcherEventKind::Modified,
                format!("n{i}.md"),
            ));
        }
        let recent = log.get_recent_default();
        assert_eq!(recent.len(), RECENT_EVENTS_DEFAULT);
        assert_eq!(recent[0].path, "n69.md");
    }

    #[test]
    fn moved_events_carry_a_destination() {
        let log = EventLog::new(4);
        log.record(WatcherEvent::moved("old.md", "new.md"));
        let recent = log.get_recent(1);
        assert_eq!(recent[0].kind, WatcherEventKind::Moved);
        assert_eq!(recent[0].dest_path.as_deref(), Some("new.md"));
    }

    #[test]
    fn concurrent_appends_stay_within_capacity() {
        let log = Arc::new(EventLog::new(8));
        let mut handles = Vec::new();
        for t in 0..4 {
            let log = Arc::clone(&log);
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    log.record(WatcherEvent::new(
                        WatcherEventKind::Modified,
                        format!("t{t}-{i}.md"),
                    ));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(log.len(), 8);
        assert_eq!(log.get_recent(50).len(), 8);
    }
}
