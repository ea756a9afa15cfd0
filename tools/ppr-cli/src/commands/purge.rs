//! Disk cache invalidation.

use std::path::PathBuf;

use anyhow::{bail, Result};
use dialoguer::Confirm;
use ppr_cache::{CacheBackendConfig, DiskShellCache, PprCache};

use super::PurgeArgs;
use crate::context::Context;

/// Run the purge command.
pub async fn run(args: PurgeArgs, ctx: &Context) -> Result<()> {
    let dir = cache_dir(&args, ctx)?;
    if !dir.exists() {
        bail!("Cache directory does not exist: {}", dir.display());
    }
    let cache = DiskShellCache::new(&dir);

    let removed = if let Some(path) = &args.path {
        let present = cache.has(path).await;
        cache.invalidate(path).await?;
        usize::from(present)
    } else if let Some(pattern) = &args.pattern {
        cache.invalidate_pattern(pattern).await?
    } else {
        let size = cache.stats().await.size;
        if size == 0 {
            ctx.output.info("Cache is already empty");
            return Ok(());
        }

        if !args.yes && !ctx.output.is_json() {
            let confirmed = Confirm::new()
                .with_prompt(format!("Remove all {} entries from {}?", size, dir.display()))
                .default(false)
                .interact()?;

            if !confirmed {
                ctx.output.warn("Purge cancelled");
                return Ok(());
            }
        }

        cache.invalidate_all().await?;
        size
    };

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({
            "dir": dir.display().to_string(),
            "removed": removed,
        }));
    } else {
        ctx.output
            .success(&format!("Removed {} entr{}", removed, if removed == 1 { "y" } else { "ies" }));
    }

    Ok(())
}

fn cache_dir(args: &PurgeArgs, ctx: &Context) -> Result<PathBuf> {
    if let Some(dir) = &args.dir {
        return Ok(ctx.resolve_path(dir));
    }

    match &ctx.config.cache {
        CacheBackendConfig::Disk { dir } => Ok(ctx.resolve_path(&dir.to_string_lossy())),
        other => bail!(
            "Configured cache backend is {}; pass --dir to purge a disk cache",
            other.name()
        ),
    }
}

#[cfg(test)]
mod tests {
    use ppr_sdk::PprConfig;

    use super::*;
    use crate::output::Output;

    fn ctx(cache: CacheBackendConfig) -> Context {
        Context {
            config: PprConfig {
                cache,
                ..PprConfig::default()
            },
            config_path: None,
            output: Output::new(false, true),
            cwd: PathBuf::from("/srv/app"),
        }
    }

    fn args(dir: Option<&str>) -> PurgeArgs {
        PurgeArgs {
            dir: dir.map(str::to_string),
            path: None,
            pattern: None,
            all: true,
            yes: true,
        }
    }

    #[test]
    fn test_cache_dir_from_config() {
        let ctx = ctx(CacheBackendConfig::Disk {
            dir: PathBuf::from(".ppr-cache"),
        });
        assert_eq!(
            cache_dir(&args(None), &ctx).unwrap(),
            PathBuf::from("/srv/app/.ppr-cache")
        );
        assert_eq!(
            cache_dir(&args(Some("/tmp/c")), &ctx).unwrap(),
            PathBuf::from("/tmp/c")
        );
    }

    #[tokio::test]
    async fn test_purge_by_pattern() {
        use std::sync::Arc;

        use ppr_core::{ShellAssets, StaticShell};

        let dir = tempfile::TempDir::new().unwrap();
        let cache = DiskShellCache::new(dir.path());
        for path in ["/products/1", "/products/2", "/about"] {
            let shell = StaticShell::new(path, "<p/>", [], ShellAssets::default());
            cache.set(path, Arc::new(shell)).await.unwrap();
        }

        let ctx = ctx(CacheBackendConfig::Memory);
        let args = PurgeArgs {
            dir: Some(dir.path().to_string_lossy().into_owned()),
            path: None,
            pattern: Some("/products/*".into()),
            all: false,
            yes: true,
        };
        run(args, &ctx).await.unwrap();

        assert!(!cache.has("/products/1").await);
        assert!(!cache.has("/products/2").await);
        assert!(cache.has("/about").await);
    }

    #[test]
    fn test_cache_dir_requires_disk_backend() {
        let ctx = ctx(CacheBackendConfig::Memory);
        assert!(cache_dir(&args(None), &ctx).is_err());
    }
}
