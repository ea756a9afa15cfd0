//! Unbounded in-process shell cache.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ppr_core::StaticShell;
use tokio::sync::RwLock;

use crate::backend::{CacheCounters, CacheStats, PprCache};
use crate::error::CacheResult;

/// In-memory shell cache for development and tests.
///
/// Entries live for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryShellCache {
    entries: RwLock<HashMap<String, Arc<StaticShell>>>,
    counters: CacheCounters,
}

impl MemoryShellCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached paths, unordered.
    pub async fn paths(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl PprCache for MemoryShellCache {
    async fn get(&self, path: &str) -> Option<Arc<StaticShell>> {
        let shell = self.entries.read().await.get(path).cloned();
        self.counters.record(shell.is_some());
        shell
    }

    async fn set(&self, path: &str, shell: Arc<StaticShell>) -> CacheResult<()> {
        self.entries.write().await.insert(path.to_string(), shell);
        Ok(())
    }

    async fn has(&self, path: &str) -> bool {
        self.entries.read().await.contains_key(path)
    }

    async fn invalidate(&self, path: &str) -> CacheResult<()> {
        self.entries.write().await.remove(path);
        Ok(())
    }

    async fn invalidate_all(&self) -> CacheResult<()> {
        self.entries.write().await.clear();
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        let bytes = entries.values().map(|s| s.approximate_size()).sum();
        self.counters.stats(entries.len(), bytes)
    }
}
