//! Size- and age-bounded LRU shell cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use ppr_core::StaticShell;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::backend::{CacheCounters, CacheStats, PprCache};
use crate::error::CacheResult;

#[derive(Debug)]
struct LruEntry {
    shell: Arc<StaticShell>,
    stored_at: Instant,
}

/// LRU shell cache with a fixed capacity and a maximum entry age.
///
/// Entries are kept in access order: the front of the map is the
/// least-recently-used entry and is evicted first.
#[derive(Debug)]
pub struct LruShellCache {
    entries: Mutex<IndexMap<String, LruEntry>>,
    max_size: usize,
    max_age: Duration,
    counters: CacheCounters,
}

impl LruShellCache {
    /// Create a cache holding at most `max_size` entries (minimum 1), each
    /// for at most `max_age`.
    pub fn new(max_size: usize, max_age: Duration) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            max_size: max_size.max(1),
            max_age,
            counters: CacheCounters::default(),
        }
    }

    /// Capacity.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Maximum entry age.
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Cached paths from least to most recently used.
    pub async fn paths(&self) -> Vec<String> {
        self.entries.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl PprCache for LruShellCache {
    async fn get(&self, path: &str) -> Option<Arc<StaticShell>> {
        let mut entries = self.entries.lock().await;

        let Some(entry) = entries.shift_remove(path) else {
            self.counters.record(false);
            return None;
        };

        if entry.stored_at.elapsed() > self.max_age {
            debug!(path, "LRU entry expired");
            self.counters.record(false);
            return None;
        }

        let shell = entry.shell.clone();
        entries.insert(path.to_string(), entry);
        self.counters.record(true);
        Some(shell)
    }

    async fn set(&self, path: &str, shell: Arc<StaticShell>) -> CacheResult<()> {
        let mut entries = self.entries.lock().await;

        entries.shift_remove(path);
        while entries.len() >= self.max_size {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                debug!(path = %evicted, "LRU evicted");
            }
        }

        entries.insert(
            path.to_string(),
            LruEntry {
                shell,
                stored_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn has(&self, path: &str) -> bool {
        let entries = self.entries.lock().await;
        entries
            .get(path)
            .is_some_and(|e| e.stored_at.elapsed() <= self.max_age)
    }

    async fn invalidate(&self, path: &str) -> CacheResult<()> {
        self.entries.lock().await.shift_remove(path);
        Ok(())
    }

    async fn invalidate_all(&self) -> CacheResult<()> {
        self.entries.lock().await.clear();
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().await;
        let bytes = entries.values().map(|e| e.shell.approximate_size()).sum();
        self.counters.stats(entries.len(), bytes)
    }
}
