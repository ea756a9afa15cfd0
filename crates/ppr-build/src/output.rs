//! Build output persistence: shell files, metadata and the manifest.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ppr_cache::{CacheResult, PprCache};
use ppr_core::{
    boundary_pairs, shell_file_name, shell_meta_file_name, BoundaryMap, PprError, PprManifest,
    PprResult, ShellAssets, StaticShell, MANIFEST_FILE,
};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

/// Contents of a `<path>.shell.json` file: everything but the markup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellMetadata {
    pub path: String,
    pub build_time: DateTime<Utc>,
    pub content_hash: String,
    #[serde(with = "boundary_pairs")]
    pub boundaries: BoundaryMap,
    #[serde(default)]
    pub assets: ShellAssets,
}

impl From<&StaticShell> for ShellMetadata {
    fn from(shell: &StaticShell) -> Self {
        Self {
            path: shell.path.clone(),
            build_time: shell.build_time,
            content_hash: shell.content_hash.clone(),
            boundaries: shell.boundaries.clone(),
            assets: shell.assets.clone(),
        }
    }
}

impl ShellMetadata {
    /// Rejoin metadata with its markup.
    pub fn into_shell(self, html: String) -> StaticShell {
        StaticShell {
            path: self.path,
            html,
            boundaries: self.boundaries,
            build_time: self.build_time,
            content_hash: self.content_hash,
            assets: self.assets,
        }
    }
}

async fn write_file(file: &Path, contents: impl AsRef<[u8]>) -> PprResult<()> {
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| PprError::io(parent.display().to_string(), e))?;
    }
    fs::write(file, contents)
        .await
        .map_err(|e| PprError::io(file.display().to_string(), e))
}

async fn read_file(file: &Path) -> PprResult<String> {
    fs::read_to_string(file)
        .await
        .map_err(|e| PprError::io(file.display().to_string(), e))
}

/// Write `<path>.shell.html` and `<path>.shell.json` under `out_dir`.
pub async fn write_shell(out_dir: &Path, shell: &StaticShell) -> PprResult<()> {
    let html_file = out_dir.join(shell_file_name(&shell.path));
    let meta_file = out_dir.join(shell_meta_file_name(&shell.path));

    write_file(&html_file, &shell.html).await?;
    let meta = serde_json::to_vec_pretty(&ShellMetadata::from(shell))?;
    write_file(&meta_file, meta).await?;

    debug!(path = %shell.path, file = %html_file.display(), "Wrote shell");
    Ok(())
}

/// Write `ppr-manifest.json` under `out_dir`.
pub async fn write_manifest(out_dir: &Path, manifest: &PprManifest) -> PprResult<PathBuf> {
    let file = out_dir.join(MANIFEST_FILE);
    write_file(&file, serde_json::to_vec_pretty(manifest)?).await?;
    Ok(file)
}

/// Read `ppr-manifest.json` from `out_dir`.
pub async fn read_manifest(out_dir: &Path) -> PprResult<PprManifest> {
    let raw = read_file(&out_dir.join(MANIFEST_FILE)).await?;
    Ok(serde_json::from_str(&raw)?)
}

/// Read one shell back from its file pair.
pub async fn read_shell(out_dir: &Path, path: &str) -> PprResult<StaticShell> {
    let html = read_file(&out_dir.join(shell_file_name(path))).await?;
    let meta = read_file(&out_dir.join(shell_meta_file_name(path))).await?;
    let meta: ShellMetadata = serde_json::from_str(&meta)?;
    Ok(meta.into_shell(html))
}

/// A build read back from disk.
#[derive(Debug, Clone)]
pub struct LoadedBuild {
    pub manifest: PprManifest,
    pub shells: Vec<StaticShell>,
}

/// Load the manifest and every shell it lists.
pub async fn load_build(out_dir: impl AsRef<Path>) -> PprResult<LoadedBuild> {
    let out_dir = out_dir.as_ref();
    let manifest = read_manifest(out_dir).await?;

    let mut shells = Vec::with_capacity(manifest.len());
    for path in manifest.routes.keys() {
        shells.push(read_shell(out_dir, path).await?);
    }

    info!(dir = %out_dir.display(), shells = shells.len(), "Loaded build");
    Ok(LoadedBuild { manifest, shells })
}

/// Store loaded shells in a cache. Returns the number written.
pub async fn prime_cache(cache: &dyn PprCache, shells: Vec<StaticShell>) -> CacheResult<usize> {
    let count = shells.len();
    for shell in shells {
        let path = shell.path.clone();
        cache.set(&path, Arc::new(shell)).await?;
    }
    debug!(count, "Primed cache");
    Ok(count)
}

/// Remove `sourceMappingURL` comments from markup.
pub fn strip_source_maps(html: &str) -> String {
    const MARKERS: [&str; 2] = ["# sourceMappingURL=", "@ sourceMappingURL="];

    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    loop {
        let line_hit = MARKERS
            .iter()
            .filter_map(|m| rest.find(&format!("//{}", m)))
            .min();
        let block_hit = MARKERS
            .iter()
            .filter_map(|m| rest.find(&format!("/*{}", m)))
            .min();

        let (start, is_block) = match (line_hit, block_hit) {
            (Some(l), Some(b)) if b < l => (b, true),
            (Some(l), _) => (l, false),
            (None, Some(b)) => (b, true),
            (None, None) => break,
        };

        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let end = if is_block {
            tail.find("*/").map(|i| i + 2)
        } else {
            tail.find('\n')
        };
        match end {
            Some(end) => rest = &tail[end..],
            None => {
                rest = "";
                break;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use ppr_cache::MemoryShellCache;
    use ppr_core::{wrap_boundary, DynamicBoundaryMetadata};
    use tempfile::TempDir;

    use super::*;

    fn shell(path: &str) -> StaticShell {
        StaticShell::new(
            path,
            format!("<main>{}</main>", wrap_boundary("user", Some("guest"))),
            vec![DynamicBoundaryMetadata::new("user").with_priority(3)],
            ShellAssets::default().with_css("/site.css"),
        )
    }

    // === Source Map Tests ===

    #[test]
    fn test_strip_line_source_map() {
        let html = "<script>run()\n//# sourceMappingURL=app.js.map\n</script>";
        assert_eq!(strip_source_maps(html), "<script>run()\n\n</script>");
    }

    #[test]
    fn test_strip_block_source_map() {
        let html = "<style>a{}/*# sourceMappingURL=site.css.map */</style>";
        assert_eq!(strip_source_maps(html), "<style>a{}</style>");
    }

    #[test]
    fn test_strip_leaves_plain_markup() {
        let html = "<p>// not a source map</p>";
        assert_eq!(strip_source_maps(html), html);
    }

    // === Persistence Tests ===

    #[tokio::test]
    async fn test_write_and_load_build() {
        let tmp = TempDir::new().unwrap();
        let shells = vec![shell("/"), shell("/blog/post-1")];
        for s in &shells {
            write_shell(tmp.path(), s).await.unwrap();
        }
        write_manifest(tmp.path(), &PprManifest::from_shells("0.1.0", &shells))
            .await
            .unwrap();

        assert!(tmp.path().join("index.shell.html").exists());
        assert!(tmp.path().join("blog/post-1.shell.json").exists());

        let loaded = load_build(tmp.path()).await.unwrap();
        assert_eq!(loaded.manifest.len(), 2);
        let post = loaded.shells.iter().find(|s| s.path == "/blog/post-1").unwrap();
        assert_eq!(post.html, shells[1].html);
        assert_eq!(post.content_hash, shells[1].content_hash);
        assert_eq!(post.boundary("user").unwrap().priority, 3);
        post.validate().unwrap();
    }

    #[tokio::test]
    async fn test_metadata_boundaries_are_pairs() {
        let tmp = TempDir::new().unwrap();
        write_shell(tmp.path(), &shell("/x")).await.unwrap();

        let raw = std::fs::read_to_string(tmp.path().join("x.shell.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["boundaries"][0][0], "user");
        assert!(value.get("html").is_none());
        assert!(value.get("buildTime").is_some());
    }

    #[tokio::test]
    async fn test_prime_cache() {
        let cache = MemoryShellCache::new();
        let count = prime_cache(&cache, vec![shell("/a"), shell("/b")]).await.unwrap();
        assert_eq!(count, 2);
        assert!(cache.has("/b").await);
    }

    #[tokio::test]
    async fn test_load_missing_build_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = load_build(tmp.path().join("nope")).await.unwrap_err();
        assert!(matches!(err, PprError::Io { .. }));
    }
}
