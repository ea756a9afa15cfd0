//! Tag to path secondary index.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::backend::PprCache;
use crate::error::CacheResult;

/// Bidirectional tag/path index used for bulk invalidation.
///
/// Not synchronized: hold it behind the same lock that serializes cache
/// writes (e.g. `tokio::sync::Mutex<CacheTagIndex>`). Entries never expire;
/// call `remove` when a path leaves the cache.
#[derive(Debug, Clone, Default)]
pub struct CacheTagIndex {
    tag_to_paths: HashMap<String, BTreeSet<String>>,
    path_to_tags: HashMap<String, BTreeSet<String>>,
}

impl CacheTagIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `path` with each tag. Idempotent.
    pub fn tag<I, S>(&mut self, path: &str, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            self.tag_to_paths
                .entry(tag.clone())
                .or_default()
                .insert(path.to_string());
            self.path_to_tags
                .entry(path.to_string())
                .or_default()
                .insert(tag);
        }
    }

    /// Paths carrying `tag`, sorted.
    pub fn paths_for_tag(&self, tag: &str) -> Vec<String> {
        self.tag_to_paths
            .get(tag)
            .map(|paths| paths.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Tags attached to `path`, sorted.
    pub fn tags_for_path(&self, path: &str) -> Vec<String> {
        self.path_to_tags
            .get(path)
            .map(|tags| tags.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Invalidate every path under `tag` in `cache`. Returns the number of
    /// paths invalidated. The index itself is left unchanged.
    pub async fn invalidate_tag(&self, tag: &str, cache: &dyn PprCache) -> CacheResult<usize> {
        let paths = self.paths_for_tag(tag);
        for path in &paths {
            cache.invalidate(path).await?;
        }
        debug!(tag, count = paths.len(), "Invalidated tag");
        Ok(paths.len())
    }

    /// Forget a path entirely.
    pub fn remove(&mut self, path: &str) {
        let Some(tags) = self.path_to_tags.remove(path) else {
            return;
        };
        for tag in tags {
            if let Some(paths) = self.tag_to_paths.get_mut(&tag) {
                paths.remove(path);
                if paths.is_empty() {
                    self.tag_to_paths.remove(&tag);
                }
            }
        }
    }

    /// Number of distinct tags.
    pub fn tag_count(&self) -> usize {
        self.tag_to_paths.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.tag_to_paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ppr_core::{DynamicBoundaryMetadata, ShellAssets, StaticShell};

    use super::*;
    use crate::memory::MemoryShellCache;

    fn shell(path: &str) -> Arc<StaticShell> {
        Arc::new(StaticShell::new(
            path,
            "<p></p>",
            Vec::<DynamicBoundaryMetadata>::new(),
            ShellAssets::default(),
        ))
    }

    #[test]
    fn test_tag_is_idempotent() {
        let mut index = CacheTagIndex::new();
        index.tag("/a", ["products", "featured"]);
        index.tag("/a", ["products"]);

        assert_eq!(index.paths_for_tag("products"), vec!["/a"]);
        assert_eq!(index.tags_for_path("/a"), vec!["featured", "products"]);
        assert!(index.paths_for_tag("unknown").is_empty());
    }

    #[test]
    fn test_remove_path() {
        let mut index = CacheTagIndex::new();
        index.tag("/a", ["products"]);
        index.tag("/b", ["products", "sale"]);

        index.remove("/b");

        assert_eq!(index.paths_for_tag("products"), vec!["/a"]);
        assert!(index.paths_for_tag("sale").is_empty());
        assert!(index.tags_for_path("/b").is_empty());
        assert_eq!(index.tag_count(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_tag() {
        let cache = MemoryShellCache::new();
        for path in ["/a", "/b", "/c"] {
            cache.set(path, shell(path)).await.unwrap();
        }

        let mut index = CacheTagIndex::new();
        index.tag("/a", ["products"]);
        index.tag("/b", ["products"]);

        let count = index.invalidate_tag("products", &cache).await.unwrap();

        assert_eq!(count, 2);
        assert!(!cache.has("/a").await);
        assert!(!cache.has("/b").await);
        assert!(cache.has("/c").await);
    }
}
