//! Cache configuration and backend selection.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backend::PprCache;
use crate::disk::DiskShellCache;
use crate::error::{CacheError, CacheResult};
use crate::kv::{KvShellCache, KvStore, DEFAULT_NAMESPACE};
use crate::lru::LruShellCache;
use crate::memory::MemoryShellCache;

/// Consistency strategy applied by the edge cache controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheStrategy {
    /// Serve cached, fetch on miss.
    CacheFirst,
    /// Always fetch, fall back to cache on failure.
    NetworkFirst,
    /// Serve cached or fail.
    CacheOnly,
    /// Serve cached, refresh in the background once stale.
    #[default]
    StaleWhileRevalidate,
}

impl std::fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CacheFirst => write!(f, "cache-first"),
            Self::NetworkFirst => write!(f, "network-first"),
            Self::CacheOnly => write!(f, "cache-only"),
            Self::StaleWhileRevalidate => write!(f, "stale-while-revalidate"),
        }
    }
}

/// Edge cache controller settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeCacheConfig {
    /// Strategy.
    pub strategy: CacheStrategy,
    /// Age after which a cached shell is revalidated in the background.
    pub stale_ttl_secs: u64,
    /// `max-age` directive.
    pub max_age_secs: u64,
    /// `stale-while-revalidate` directive.
    pub stale_while_revalidate_secs: u64,
    /// `stale-if-error` directive, omitted when unset.
    pub stale_if_error_secs: Option<u64>,
}

impl Default for EdgeCacheConfig {
    fn default() -> Self {
        Self {
            strategy: CacheStrategy::default(),
            stale_ttl_secs: 60,
            max_age_secs: 60,
            stale_while_revalidate_secs: 3600,
            stale_if_error_secs: None,
        }
    }
}

impl EdgeCacheConfig {
    /// Config using the given strategy and default timings.
    pub fn with_strategy(strategy: CacheStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Staleness threshold.
    pub fn stale_ttl(&self) -> Duration {
        Duration::from_secs(self.stale_ttl_secs)
    }
}

fn default_lru_size() -> usize {
    100
}

fn default_lru_age() -> u64 {
    3600
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// Which shell cache backend to construct.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CacheBackendConfig {
    /// Unbounded in-process map.
    #[default]
    Memory,
    /// Bounded LRU.
    Lru {
        #[serde(default = "default_lru_size")]
        max_size: usize,
        #[serde(default = "default_lru_age")]
        max_age_secs: u64,
    },
    /// One file per path under `dir`.
    Disk { dir: PathBuf },
    /// Distributed key-value store.
    Kv {
        #[serde(default = "default_namespace")]
        namespace: String,
        #[serde(default)]
        ttl_secs: Option<u64>,
    },
}

impl CacheBackendConfig {
    /// Backend name for display.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Lru { .. } => "lru",
            Self::Disk { .. } => "disk",
            Self::Kv { .. } => "kv",
        }
    }
}

/// Construct the configured backend.
///
/// The `kv` backend needs a store handle; other backends ignore `kv`.
pub fn build_cache(
    config: &CacheBackendConfig,
    kv: Option<Arc<dyn KvStore>>,
) -> CacheResult<Arc<dyn PprCache>> {
    let cache: Arc<dyn PprCache> = match config {
        CacheBackendConfig::Memory => Arc::new(MemoryShellCache::new()),
        CacheBackendConfig::Lru {
            max_size,
            max_age_secs,
        } => Arc::new(LruShellCache::new(
            *max_size,
            Duration::from_secs(*max_age_secs),
        )),
        CacheBackendConfig::Disk { dir } => Arc::new(DiskShellCache::new(dir.clone())),
        CacheBackendConfig::Kv {
            namespace,
            ttl_secs,
        } => {
            let store = kv.ok_or_else(|| {
                CacheError::Storage("kv backend configured without a store".to_string())
            })?;
            Arc::new(
                KvShellCache::new(store)
                    .with_namespace(namespace.clone())
                    .with_ttl(ttl_secs.map(Duration::from_secs)),
            )
        }
    };

    info!(backend = config.name(), "Shell cache ready");
    Ok(cache)
}
