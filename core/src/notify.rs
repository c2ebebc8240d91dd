use std::sync::Mutex;

use agora_types::InvalidationNotifier;

/// Logs each invalidation. Useful when no view cache is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl InvalidationNotifier for TracingNotifier {
    fn invalidate(&self, path: &str) {
        tracing::info!(path, "Invalidated view path");
    }
}

/// Collects invalidated paths in order, for embedders that flush them in batches.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    paths: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths recorded so far, oldest first.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.paths
            .lock()
            .map(|paths| paths.clone())
            .unwrap_or_default()
    }

    /// Drain recorded paths.
    pub fn take(&self) -> Vec<String> {
        self.paths
            .lock()
            .map(|mut paths| std::mem::take(&mut *paths))
            .unwrap_or_default()
    }
}

impl InvalidationNotifier for RecordingNotifier {
    fn invalidate(&self, path: &str) {
        match self.paths.lock() {
            Ok(mut paths) => paths.push(path.to_string()),
            Err(_) => tracing::warn!(path, "Invalidation dropped: recorder lock poisoned"),
        }
    }
}
