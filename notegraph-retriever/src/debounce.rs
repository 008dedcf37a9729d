//! Per-key coalescing of rapid change notifications

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Callback invoked with the key once per quiet period.
pub type DebounceCallback =
    Arc<dyn Fn(String) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Coalesces rapid `trigger(key)` calls into one callback per quiet period.
///
/// Triggering a key that already has a pending timer cancels and restarts it,
/// so a storm of saves produces a single downstream call. Callback errors are
/// logged here and never propagate; a failing callback leaves the timer table
/// fully usable. The key-to-timer map sits behind one mutex, and the callback
/// itself always runs outside that mutex so reentrant triggers cannot
/// deadlock.
pub struct Debouncer {
    delay: Duration,
    callback: DebounceCallback,
    timers: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl Debouncer {
    pub fn new(delay: Duration, callback: DebounceCallback) -> Self {
        Self {
            delay,
            callback,
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Schedule (or reschedule) the callback for `key` after the quiet period.
    ///
    /// Must be called from within a tokio runtime.
    pub fn trigger(&self, key: &str) {
        let delay = self.delay;
        let callback = Arc::clone(&self.callback);
        let timers = Arc::clone(&self.timers);
        let task_key = key.to_string();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Drop our own entry before running the callback; a trigger
            // arriving during the callback starts a fresh quiet period.
            timers.lock().unwrap().remove(&task_key);
            info!("Debounce fired for: {task_key}");
            if let Err(err) = (callback)(task_key.clone()).await {
                warn!("Debounce callback failed for {task_key}: {err:#}");
            }
        });

        let mut timers = self.timers.lock().unwrap();
        if let Some(previous) = timers.insert(key.to_string(), task) {
            previous.abort();
            debug!("Debounce reset for: {key}");
        }
    }

    /// Cancel every pending timer. Safe to call from any thread; used at
    /// shutdown.
    pub fn cancel_all(&self) {
        let mut timers = self.timers.lock().unwrap();
        for (_, task) in timers.drain() {
            task.abort();
        }
        info!("All debounce timers cancelled");
    }

    /// Number of keys with an outstanding timer.
    pub fn pending_count(&self) -> usize {
        self.timers.lock().unwrap().len()
    }
}
