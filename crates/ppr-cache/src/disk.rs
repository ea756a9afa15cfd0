//! File-per-path shell cache.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ppr_core::{content_hash, StaticShell};
use tokio::fs;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::backend::{glob_match, CacheCounters, CacheStats, PprCache};
use crate::error::{CacheError, CacheResult};

const ENTRY_EXT: &str = "json";

/// Shell cache storing one JSON file per path.
///
/// The directory is created on the first write.
#[derive(Debug)]
pub struct DiskShellCache {
    dir: PathBuf,
    created: OnceCell<()>,
    counters: CacheCounters,
    writes: AtomicU64,
}

impl DiskShellCache {
    /// Create a cache rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            created: OnceCell::new(),
            counters: CacheCounters::default(),
            writes: AtomicU64::new(0),
        }
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds the entry for `path`.
    pub fn entry_file(&self, path: &str) -> PathBuf {
        self.dir.join(entry_file_name(path))
    }

    async fn ensure_dir(&self) -> CacheResult<()> {
        self.created
            .get_or_try_init(|| async {
                fs::create_dir_all(&self.dir)
                    .await
                    .map_err(|e| CacheError::storage(format!("{}: {}", self.dir.display(), e)))
            })
            .await?;
        Ok(())
    }

    /// Staging file for one write. Unique per write so concurrent writers
    /// of the same path never share it.
    fn staging_file(&self, path: &str) -> PathBuf {
        let seq = self.writes.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!(
            ".{}.{}-{}.tmp",
            entry_file_name(path),
            std::process::id(),
            seq
        ))
    }

    async fn entry_files(&self) -> CacheResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(CacheError::storage(e)),
        };

        while let Some(entry) = dir.next_entry().await.map_err(CacheError::storage)? {
            let file = entry.path();
            if file.extension().is_some_and(|ext| ext == ENTRY_EXT) {
                files.push(file);
            }
        }
        Ok(files)
    }

    async fn read_entry(file: &Path) -> CacheResult<Option<StaticShell>> {
        let bytes = match fs::read(file).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::storage(e)),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Every cached shell on disk. Unreadable files are skipped with a warning.
    pub async fn shells(&self) -> CacheResult<Vec<StaticShell>> {
        let mut shells = Vec::new();
        for file in self.entry_files().await? {
            match Self::read_entry(&file).await {
                Ok(Some(shell)) => shells.push(shell),
                Ok(None) => {}
                Err(e) => warn!(file = %file.display(), error = %e, "Skipping unreadable cache entry"),
            }
        }
        Ok(shells)
    }

    /// Drop every entry whose path matches a glob. Returns the count removed.
    pub async fn invalidate_pattern(&self, pattern: &str) -> CacheResult<usize> {
        let mut removed = 0;
        for shell in self.shells().await? {
            if glob_match(pattern, &shell.path) {
                self.invalidate(&shell.path).await?;
                removed += 1;
            }
        }
        debug!(pattern, removed, "Disk cache pattern invalidation");
        Ok(removed)
    }
}

/// File name for a path: a readable slug plus a hash so that distinct paths
/// never collide after sanitizing.
pub fn entry_file_name(path: &str) -> String {
    let slug: String = path
        .trim_matches('/')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let slug = if slug.is_empty() { "index".to_string() } else { slug };
    format!("{}-{}.{}", slug, &content_hash(path)[..8], ENTRY_EXT)
}

#[async_trait]
impl PprCache for DiskShellCache {
    async fn get(&self, path: &str) -> Option<Arc<StaticShell>> {
        let shell = match Self::read_entry(&self.entry_file(path)).await {
            Ok(shell) => shell,
            Err(e) => {
                warn!(path, error = %e, "Disk cache read failed, treating as miss");
                None
            }
        };
        self.counters.record(shell.is_some());
        shell.map(Arc::new)
    }

    async fn set(&self, path: &str, shell: Arc<StaticShell>) -> CacheResult<()> {
        self.ensure_dir().await?;
        let bytes = serde_json::to_vec(shell.as_ref())?;

        let file = self.entry_file(path);
        let tmp = self.staging_file(path);
        let written = match fs::write(&tmp, bytes).await {
            Ok(()) => fs::rename(&tmp, &file).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp).await;
            return Err(CacheError::storage(e));
        }

        debug!(path, file = %file.display(), "Disk cache write");
        Ok(())
    }

    async fn has(&self, path: &str) -> bool {
        fs::try_exists(self.entry_file(path)).await.unwrap_or(false)
    }

    async fn invalidate(&self, path: &str) -> CacheResult<()> {
        match fs::remove_file(self.entry_file(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::storage(e)),
        }
    }

    async fn invalidate_all(&self) -> CacheResult<()> {
        for file in self.entry_files().await? {
            match fs::remove_file(&file).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(CacheError::storage(e)),
            }
        }
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        let files = match self.entry_files().await {
            Ok(files) => files,
            Err(e) => {
                warn!(error = %e, "Disk cache stats unavailable");
                Vec::new()
            }
        };

        let mut bytes = 0;
        for file in &files {
            if let Ok(meta) = fs::metadata(file).await {
                bytes += meta.len() as usize;
            }
        }
        self.counters.stats(files.len(), bytes)
    }
}

#[cfg(test)]
mod tests {
    use ppr_core::{wrap_boundary, DynamicBoundaryMetadata, ShellAssets};
    use tempfile::TempDir;

    use super::*;

    fn shell(path: &str) -> Arc<StaticShell> {
        let html = format!("<main>{}</main>", wrap_boundary("cart", Some("...")));
        Arc::new(StaticShell::new(
            path,
            html,
            vec![DynamicBoundaryMetadata::new("cart").with_priority(5)],
            ShellAssets::default().with_css("/app.css"),
        ))
    }

    // === File Naming Tests ===

    #[test]
    fn test_entry_file_name_is_safe() {
        let name = entry_file_name("/products/../../etc?x=1");
        assert!(!name.contains('/'));
        assert!(!name.contains('?'));
        assert!(name.ends_with(".json"));
        assert!(entry_file_name("/").starts_with("index-"));
    }

    #[test]
    fn test_entry_file_name_no_collisions() {
        assert_ne!(entry_file_name("/a/b"), entry_file_name("/a_b"));
    }

    // === Persistence Tests ===

    #[tokio::test]
    async fn test_round_trip_preserves_boundaries() {
        let tmp = TempDir::new().unwrap();
        let cache = DiskShellCache::new(tmp.path().join("shells"));

        assert!(cache.get("/p").await.is_none());
        cache.set("/p", shell("/p")).await.unwrap();

        let loaded = cache.get("/p").await.unwrap();
        assert_eq!(loaded.path, "/p");
        assert_eq!(loaded.boundary("cart").unwrap().priority, 5);
        assert_eq!(loaded.assets.css, vec!["/app.css"]);
        assert!(cache.has("/p").await);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_miss() {
        let tmp = TempDir::new().unwrap();
        let cache = DiskShellCache::new(tmp.path());
        std::fs::write(cache.entry_file("/bad"), b"{not json").unwrap();

        assert!(cache.get("/bad").await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_same_path_writes() {
        let tmp = TempDir::new().unwrap();
        let cache = Arc::new(DiskShellCache::new(tmp.path()));

        for _ in 0..10 {
            let mut handles = Vec::new();
            for _ in 0..16 {
                let cache = cache.clone();
                handles.push(tokio::spawn(async move { cache.set("/a", shell("/a")).await }));
            }
            for handle in handles {
                handle.await.unwrap().unwrap();
            }
        }

        assert_eq!(cache.get("/a").await.unwrap().path, "/a");
        let leftovers = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().extension().is_some_and(|x| x == "tmp"))
            .count();
        assert_eq!(leftovers, 0);
        assert_eq!(cache.stats().await.size, 1);
    }

    #[tokio::test]
    async fn test_invalidate_and_pattern() {
        let tmp = TempDir::new().unwrap();
        let cache = DiskShellCache::new(tmp.path());
        cache.set("/products/1", shell("/products/1")).await.unwrap();
        cache.set("/products/2", shell("/products/2")).await.unwrap();
        cache.set("/about", shell("/about")).await.unwrap();

        assert_eq!(cache.invalidate_pattern("/products/*").await.unwrap(), 2);
        assert!(cache.has("/about").await);
        assert_eq!(cache.stats().await.size, 1);

        cache.invalidate_all().await.unwrap();
        assert_eq!(cache.stats().await.size, 0);
    }
}
