//! Shell cache over a distributed key-value store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ppr_core::StaticShell;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::backend::{glob_match, CacheCounters, CacheStats, PprCache};
use crate::error::{CacheError, CacheResult};

/// Default key namespace.
pub const DEFAULT_NAMESPACE: &str = "ppr:";

/// Minimal key-value store capability (Redis, Workers KV and the like).
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Write a value with an optional TTL.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> anyhow::Result<()>;

    /// Delete a key. Missing keys are not an error.
    async fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// Keys starting with `prefix`.
    async fn keys(&self, prefix: &str) -> anyhow::Result<Vec<String>>;

    /// Reset a key's TTL. Returns false if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> anyhow::Result<bool>;
}

#[derive(Debug, Clone)]
struct KvEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl KvEntry {
    fn is_live(&self) -> bool {
        self.expires_at.map_or(true, |at| Instant::now() < at)
    }
}

/// In-process `KvStore` with TTL support.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, KvEntry>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live())
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> anyhow::Result<()> {
        let entry = KvEntry {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| e.is_live());
        Ok(entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> anyhow::Result<bool> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(key).filter(|e| e.is_live()) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Shell cache backed by a `KvStore`, with namespaced keys and per-entry TTL.
pub struct KvShellCache {
    store: Arc<dyn KvStore>,
    namespace: String,
    ttl: Option<Duration>,
    counters: CacheCounters,
}

impl KvShellCache {
    /// Create a cache over `store` using the default namespace and no TTL.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            namespace: DEFAULT_NAMESPACE.to_string(),
            ttl: None,
            counters: CacheCounters::default(),
        }
    }

    /// Set the key namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the per-entry TTL.
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Store key for a path.
    pub fn key(&self, path: &str) -> String {
        format!("{}{}", self.namespace, path)
    }

    fn path_of<'k>(&self, key: &'k str) -> &'k str {
        key.strip_prefix(self.namespace.as_str()).unwrap_or(key)
    }

    /// Drop every entry whose path matches a glob. Returns the count removed.
    pub async fn invalidate_pattern(&self, pattern: &str) -> CacheResult<usize> {
        let keys = self.store.keys(&self.namespace).await.map_err(CacheError::storage)?;
        let mut removed = 0;
        for key in keys {
            if glob_match(pattern, self.path_of(&key)) {
                self.store.delete(&key).await.map_err(CacheError::storage)?;
                removed += 1;
            }
        }
        debug!(pattern, removed, "KV pattern invalidation");
        Ok(removed)
    }

    /// Reset the TTL of an entry without rewriting it. Returns false when
    /// the entry does not exist or no TTL is configured.
    pub async fn touch(&self, path: &str) -> CacheResult<bool> {
        let Some(ttl) = self.ttl else {
            return Ok(false);
        };
        self.store
            .expire(&self.key(path), ttl)
            .await
            .map_err(CacheError::storage)
    }
}

#[async_trait]
impl PprCache for KvShellCache {
    async fn get(&self, path: &str) -> Option<Arc<StaticShell>> {
        let shell = match self.store.get(&self.key(path)).await {
            Ok(Some(raw)) => match serde_json::from_str::<StaticShell>(&raw) {
                Ok(shell) => Some(Arc::new(shell)),
                Err(e) => {
                    warn!(path, error = %e, "Malformed KV cache entry, treating as miss");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(path, error = %e, "KV cache read failed, treating as miss");
                None
            }
        };
        self.counters.record(shell.is_some());
        shell
    }

    async fn set(&self, path: &str, shell: Arc<StaticShell>) -> CacheResult<()> {
        let raw = serde_json::to_string(shell.as_ref())?;
        self.store
            .set(&self.key(path), raw, self.ttl)
            .await
            .map_err(CacheError::storage)
    }

    async fn has(&self, path: &str) -> bool {
        matches!(self.store.get(&self.key(path)).await, Ok(Some(_)))
    }

    async fn invalidate(&self, path: &str) -> CacheResult<()> {
        self.store
            .delete(&self.key(path))
            .await
            .map_err(CacheError::storage)
    }

    async fn invalidate_all(&self) -> CacheResult<()> {
        let keys = self.store.keys(&self.namespace).await.map_err(CacheError::storage)?;
        for key in keys {
            self.store.delete(&key).await.map_err(CacheError::storage)?;
        }
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        let keys = match self.store.keys(&self.namespace).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "KV cache stats unavailable");
                return self.counters.stats(0, 0);
            }
        };

        let mut bytes = 0;
        for key in &keys {
            if let Ok(Some(raw)) = self.store.get(key).await {
                bytes += raw.len();
            }
        }
        self.counters.stats(keys.len(), bytes)
    }
}
