//! Edge cache controller: consistency strategies over a shell cache.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use http::HeaderMap;
use ppr_core::{NoopRevalidationObserver, RevalidationObserver, StaticShell, WorkerPool};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backend::PprCache;
use crate::config::{CacheStrategy, EdgeCacheConfig};
use crate::error::{CacheError, CacheResult};
use crate::headers::shell_headers;

/// Outcome of an edge cache lookup.
#[derive(Debug, Clone)]
pub struct EdgeCacheResult {
    /// Shell to serve.
    pub shell: Arc<StaticShell>,
    /// Whether the shell is older than the configured freshness window, or
    /// was served after a failed fetch.
    pub stale: bool,
    /// Whether a background refresh is running for the path.
    pub revalidating: bool,
}

impl EdgeCacheResult {
    fn fresh(shell: Arc<StaticShell>) -> Self {
        Self {
            shell,
            stale: false,
            revalidating: false,
        }
    }
}

/// Counts from a cache warm-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmResult {
    /// Paths fetched and stored.
    pub success: usize,
    /// Paths whose fetch or store failed.
    pub failed: usize,
}

/// Serves shells from a `PprCache` according to a `CacheStrategy`.
///
/// The fetcher is supplied per call and produces a fresh shell for the path.
pub struct EdgeCacheController {
    cache: Arc<dyn PprCache>,
    config: EdgeCacheConfig,
    observer: Arc<dyn RevalidationObserver>,
    revalidating: Arc<Mutex<HashSet<String>>>,
}

impl EdgeCacheController {
    /// Create a controller over `cache`.
    pub fn new(cache: Arc<dyn PprCache>, config: EdgeCacheConfig) -> Self {
        Self {
            cache,
            config,
            observer: Arc::new(NoopRevalidationObserver),
            revalidating: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Receive background revalidation outcomes.
    pub fn with_observer(mut self, observer: Arc<dyn RevalidationObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Underlying cache.
    pub fn cache(&self) -> &Arc<dyn PprCache> {
        &self.cache
    }

    /// Active configuration.
    pub fn config(&self) -> &EdgeCacheConfig {
        &self.config
    }

    /// Response headers for serving `shell` under this controller's strategy.
    pub fn headers(&self, shell: &StaticShell) -> HeaderMap {
        shell_headers(shell, &self.config)
    }

    /// Whether a background refresh is currently running for `path`.
    pub async fn is_revalidating(&self, path: &str) -> bool {
        self.revalidating.lock().await.contains(path)
    }

    /// Resolve a shell for `path`.
    pub async fn get<F, Fut>(&self, path: &str, fetcher: F) -> CacheResult<EdgeCacheResult>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<StaticShell>> + Send + 'static,
    {
        match self.config.strategy {
            CacheStrategy::CacheFirst => match self.cache.get(path).await {
                Some(shell) => Ok(EdgeCacheResult::fresh(shell)),
                None => self.fetch_and_store(path, fetcher).await,
            },
            CacheStrategy::NetworkFirst => match fetcher().await {
                Ok(shell) => {
                    let shell = Arc::new(shell);
                    self.cache.set(path, shell.clone()).await?;
                    Ok(EdgeCacheResult::fresh(shell))
                }
                Err(error) => match self.cache.get(path).await {
                    Some(shell) => {
                        warn!(path, error = %error, "Fetch failed, serving cached shell");
                        Ok(EdgeCacheResult {
                            shell,
                            stale: true,
                            revalidating: false,
                        })
                    }
                    None => Err(CacheError::Fetch {
                        path: path.to_string(),
                        source: error,
                    }),
                },
            },
            CacheStrategy::CacheOnly => self
                .cache
                .get(path)
                .await
                .map(EdgeCacheResult::fresh)
                .ok_or_else(|| CacheError::Miss(path.to_string())),
            CacheStrategy::StaleWhileRevalidate => {
                let Some(shell) = self.cache.get(path).await else {
                    return self.fetch_and_store(path, fetcher).await;
                };

                if shell.age() <= self.config.stale_ttl() {
                    return Ok(EdgeCacheResult::fresh(shell));
                }

                self.revalidate(path, fetcher).await;
                Ok(EdgeCacheResult {
                    shell,
                    stale: true,
                    revalidating: true,
                })
            }
        }
    }

    async fn fetch_and_store<F, Fut>(&self, path: &str, fetcher: F) -> CacheResult<EdgeCacheResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<StaticShell>>,
    {
        let shell = fetcher().await.map_err(|source| CacheError::Fetch {
            path: path.to_string(),
            source,
        })?;
        let shell = Arc::new(shell);
        self.cache.set(path, shell.clone()).await?;
        Ok(EdgeCacheResult::fresh(shell))
    }

    /// Spawn a background refresh unless one is already running for the path.
    async fn revalidate<F, Fut>(&self, path: &str, fetcher: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<StaticShell>> + Send + 'static,
    {
        if !self.revalidating.lock().await.insert(path.to_string()) {
            debug!(path, "Revalidation already in flight");
            return;
        }

        let path = path.to_string();
        let cache = self.cache.clone();
        let observer = self.observer.clone();
        let in_flight = self.revalidating.clone();

        tokio::spawn(async move {
            let outcome = match fetcher().await {
                Ok(shell) => {
                    let shell = Arc::new(shell);
                    cache
                        .set(&path, shell.clone())
                        .await
                        .map(|_| shell)
                        .map_err(anyhow::Error::from)
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(shell) => {
                    debug!(path = %path, "Revalidated shell");
                    observer.on_revalidated(&path, &shell);
                }
                Err(error) => {
                    warn!(path = %path, error = %error, "Background revalidation failed");
                    observer.on_revalidation_failed(&path, &error);
                }
            }

            in_flight.lock().await.remove(&path);
        });
    }

    /// Pre-populate the cache for many paths with bounded concurrency.
    ///
    /// Individual failures are logged and counted, never returned.
    pub async fn warm_cache<I, F, Fut>(&self, paths: I, fetcher: F, concurrency: usize) -> WarmResult
    where
        I: IntoIterator<Item = String>,
        F: Fn(String) -> Fut,
        Fut: Future<Output = anyhow::Result<StaticShell>> + Send,
    {
        let mut pool = WorkerPool::new(concurrency);
        let cache = &self.cache;

        for path in paths {
            let fetch = fetcher(path.clone());
            pool.push(async move {
                let outcome = match fetch.await {
                    Ok(shell) => cache
                        .set(&path, Arc::new(shell))
                        .await
                        .map_err(anyhow::Error::from),
                    Err(e) => Err(e),
                };
                (path, outcome)
            });
        }

        let mut result = WarmResult::default();
        while let Some((path, outcome)) = pool.next().await {
            match outcome {
                Ok(()) => result.success += 1,
                Err(error) => {
                    warn!(path = %path, error = %error, "Cache warm-up failed");
                    result.failed += 1;
                }
            }
        }

        info!(
            success = result.success,
            failed = result.failed,
            "Cache warm-up complete"
        );
        result
    }
}
