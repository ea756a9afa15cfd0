//! Shell cache contract.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ppr_core::StaticShell;
use serde::{Deserialize, Serialize};

use crate::error::CacheResult;

/// Diagnostic snapshot of a cache, computed on each call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Entry count.
    pub size: usize,
    /// Approximate serialized size of all entries.
    pub bytes: usize,
    /// hits / (hits + misses); zero before the first lookup.
    pub hit_ratio: f64,
}

/// Storage for prerendered shells keyed by route path.
///
/// A missing key is never an error: `get` returns `None` and `invalidate`
/// succeeds. Read-side backend failures are logged and reported as a miss.
#[async_trait]
pub trait PprCache: Send + Sync {
    /// Look up the shell for a path.
    async fn get(&self, path: &str) -> Option<Arc<StaticShell>>;

    /// Store a shell, replacing any previous entry for the path.
    async fn set(&self, path: &str, shell: Arc<StaticShell>) -> CacheResult<()>;

    /// Whether a live entry exists for the path.
    async fn has(&self, path: &str) -> bool {
        self.get(path).await.is_some()
    }

    /// Drop the entry for a path.
    async fn invalidate(&self, path: &str) -> CacheResult<()>;

    /// Drop every entry.
    async fn invalidate_all(&self) -> CacheResult<()>;

    /// Current statistics.
    async fn stats(&self) -> CacheStats;
}

#[async_trait]
impl<C: PprCache + ?Sized> PprCache for Arc<C> {
    async fn get(&self, path: &str) -> Option<Arc<StaticShell>> {
        (**self).get(path).await
    }

    async fn set(&self, path: &str, shell: Arc<StaticShell>) -> CacheResult<()> {
        (**self).set(path, shell).await
    }

    async fn has(&self, path: &str) -> bool {
        (**self).has(path).await
    }

    async fn invalidate(&self, path: &str) -> CacheResult<()> {
        (**self).invalidate(path).await
    }

    async fn invalidate_all(&self) -> CacheResult<()> {
        (**self).invalidate_all().await
    }

    async fn stats(&self) -> CacheStats {
        (**self).stats().await
    }
}

/// Hit/miss counters shared by the backends.
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheCounters {
    /// Record the outcome of a lookup.
    pub fn record(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Hits so far.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Misses so far.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// hits / (hits + misses).
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Build stats from live counters and the backend's size figures.
    pub fn stats(&self, size: usize, bytes: usize) -> CacheStats {
        CacheStats {
            size,
            bytes,
            hit_ratio: self.hit_ratio(),
        }
    }
}

/// Match `text` against a glob where `*` matches any run of characters and
/// `?` matches exactly one.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((star_pi, star_ti)) = star {
            pi = star_pi + 1;
            ti = star_ti + 1;
            star = Some((star_pi, star_ti + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("/products/*", "/products/42"));
        assert!(glob_match("/products/*", "/products/a/b"));
        assert!(glob_match("/p?st", "/post"));
        assert!(glob_match("*", ""));
        assert!(!glob_match("/products/*", "/blog/1"));
        assert!(!glob_match("/p?st", "/poost"));
    }

    #[test]
    fn test_hit_ratio() {
        let counters = CacheCounters::default();
        assert_eq!(counters.hit_ratio(), 0.0);

        counters.record(true);
        counters.record(true);
        counters.record(true);
        counters.record(false);

        let stats = counters.stats(3, 120);
        assert_eq!(stats.size, 3);
        assert_eq!(stats.bytes, 120);
        assert!((stats.hit_ratio - 0.75).abs() < f64::EPSILON);
    }
}
