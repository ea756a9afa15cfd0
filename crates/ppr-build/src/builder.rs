//! Shell builder.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ppr_cache::{CacheTagIndex, MemoryShellCache, PprCache};
use ppr_core::{
    shell_file_name, PprError, PprManifest, PprResult, RouteEntry, ShellRenderer, StaticShell,
    WorkerPool,
};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::BuildConfig;
use crate::output::{strip_source_maps, write_manifest, write_shell};

/// Engine version recorded in manifests.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Stage at which a route failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildErrorKind {
    /// Static path generator failed.
    Expansion,
    /// Renderer failed or produced an inconsistent shell.
    Render,
    /// Shell could not be written to the cache.
    Cache,
    /// Shell files could not be written.
    Persist,
}

/// A per-route failure recorded during a build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildError {
    /// Route pattern (expansion) or concrete path.
    pub path: String,
    /// Error message.
    pub message: String,
    /// Full error chain.
    pub stack: Option<String>,
    /// Failure stage.
    pub kind: BuildErrorKind,
}

impl BuildError {
    fn new(kind: BuildErrorKind, path: impl Into<String>, error: &anyhow::Error) -> Self {
        Self {
            path: path.into(),
            message: error.to_string(),
            stack: Some(format!("{:?}", error)),
            kind,
        }
    }
}

/// Everything a build produced.
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// Successfully built shells by path.
    pub shells: BTreeMap<String, Arc<StaticShell>>,
    /// Per-route failures.
    pub errors: Vec<BuildError>,
    /// Manifest written to the output directory.
    pub manifest: PprManifest,
    /// Wall-clock build time.
    pub duration: Duration,
}

impl BuildResult {
    /// Whether every route built.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors of one kind.
    pub fn errors_of(&self, kind: BuildErrorKind) -> impl Iterator<Item = &BuildError> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }
}

/// Renders routes to static shells.
pub struct ShellBuilder {
    routes: Vec<RouteEntry>,
    renderer: Arc<dyn ShellRenderer>,
    config: BuildConfig,
    cache: Arc<dyn PprCache>,
    tag_index: Option<Arc<Mutex<CacheTagIndex>>>,
}

impl ShellBuilder {
    /// Create a builder storing shells in an in-memory cache.
    pub fn new(routes: Vec<RouteEntry>, renderer: Arc<dyn ShellRenderer>, config: BuildConfig) -> Self {
        Self {
            routes,
            renderer,
            config,
            cache: Arc::new(MemoryShellCache::new()),
            tag_index: None,
        }
    }

    /// Store shells in `cache` instead.
    pub fn with_cache(mut self, cache: Arc<dyn PprCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Tag every produced path with its route's tags.
    pub fn with_tag_index(mut self, index: Arc<Mutex<CacheTagIndex>>) -> Self {
        self.tag_index = Some(index);
        self
    }

    /// Cache shells are written to.
    pub fn cache(&self) -> &Arc<dyn PprCache> {
        &self.cache
    }

    /// Build configuration.
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Expand, render, cache and persist every route.
    ///
    /// Per-route failures are collected in `BuildResult::errors`. Only
    /// failing to write the output directory or manifest returns `Err`.
    pub async fn build(&self) -> PprResult<BuildResult> {
        let started = Instant::now();
        info!(
            routes = self.routes.len(),
            concurrency = self.config.concurrency,
            "Starting build"
        );

        let mut errors = Vec::new();
        let targets = self.expand(&mut errors).await;
        debug!(paths = targets.len(), "Expanded routes");

        let mut shells = BTreeMap::new();
        let mut pool = WorkerPool::new(self.config.concurrency);
        for (path, route) in targets {
            pool.push(async move {
                let outcome = self.render_and_store(route, &path).await;
                (path, outcome)
            });
        }

        while let Some((path, outcome)) = pool.next().await {
            match outcome {
                Ok(shell) => {
                    shells.insert(path, shell);
                }
                Err(error) => {
                    warn!(path = %path, kind = ?error.kind, error = %error.message, "Route failed");
                    errors.push(error);
                }
            }
        }

        let manifest = self.persist(&mut shells, &mut errors).await?;

        let duration = started.elapsed();
        info!(
            shells = shells.len(),
            errors = errors.len(),
            elapsed_ms = duration.as_millis() as u64,
            "Build complete"
        );

        Ok(BuildResult {
            shells,
            errors,
            manifest,
            duration,
        })
    }

    /// Concrete `(path, route)` pairs to render.
    ///
    /// A path already claimed by an earlier route is recorded as an
    /// `Expansion` error and rendered only for the first route.
    async fn expand(&self, errors: &mut Vec<BuildError>) -> Vec<(String, &RouteEntry)> {
        let mut candidates = Vec::new();

        for route in &self.routes {
            match &route.static_paths {
                Some(generator) => match generator.static_paths().await {
                    Ok(paths) => {
                        debug!(route = %route.path, count = paths.len(), "Expanded static paths");
                        candidates.extend(paths.into_iter().map(|p| (p, route)));
                    }
                    Err(error) => {
                        warn!(route = %route.path, error = %error, "Static path generation failed");
                        errors.push(BuildError::new(BuildErrorKind::Expansion, &route.path, &error));
                    }
                },
                None if route.pattern().is_dynamic() => {
                    info!(route = %route.path, "Skipping dynamic route without static paths");
                }
                None => candidates.push((route.path.clone(), route)),
            }
        }

        let mut claimed: HashMap<String, &str> = HashMap::new();
        let mut targets = Vec::with_capacity(candidates.len());
        for (path, route) in candidates {
            if let Some(owner) = claimed.get(&path) {
                let error = anyhow::anyhow!(
                    "path '{}' from route '{}' is already produced by route '{}'",
                    path,
                    route.path,
                    owner
                );
                warn!(path = %path, route = %route.path, owner = %owner, "Duplicate path");
                errors.push(BuildError::new(BuildErrorKind::Expansion, &path, &error));
                continue;
            }
            claimed.insert(path.clone(), route.path.as_str());
            targets.push((path, route));
        }

        targets
    }

    async fn render_and_store(
        &self,
        route: &RouteEntry,
        path: &str,
    ) -> Result<Arc<StaticShell>, BuildError> {
        let shell = self
            .render_shell(route, path)
            .await
            .map_err(|e| BuildError::new(BuildErrorKind::Render, path, &e))?;
        let shell = Arc::new(shell);

        self.cache
            .set(path, shell.clone())
            .await
            .map_err(|e| BuildError::new(BuildErrorKind::Cache, path, &e.into()))?;

        if let Some(index) = &self.tag_index {
            if !route.config.tags.is_empty() {
                index.lock().await.tag(path, route.config.tags.iter().cloned());
            }
        }

        info!(path, boundaries = shell.boundary_count(), "Built shell");
        Ok(shell)
    }

    async fn render_shell(&self, route: &RouteEntry, path: &str) -> anyhow::Result<StaticShell> {
        let params = route.pattern().extract(path).ok_or_else(|| {
            anyhow::anyhow!("path '{}' does not match route '{}'", path, route.path)
        })?;
        let output = self.renderer.render(route, path, &params).await?;

        let html = if self.config.source_maps {
            output.html
        } else {
            strip_source_maps(&output.html)
        };

        let shell = StaticShell::new(path, html, output.boundaries, output.assets);
        shell.validate()?;
        Ok(shell)
    }

    /// Render one concrete path on demand against the configured routes.
    ///
    /// Nothing is cached or written; the result can be handed to an edge
    /// cache controller as its fetcher.
    pub async fn render_path(&self, path: &str) -> PprResult<StaticShell> {
        let route = self
            .routes
            .iter()
            .find(|r| r.pattern().matches(path))
            .ok_or_else(|| PprError::RouteNotFound(path.to_string()))?;

        self.render_shell(route, path)
            .await
            .map_err(|source| PprError::RenderFailed {
                path: path.to_string(),
                source,
            })
    }

    /// Write shells and the manifest. Shells whose files fail are dropped
    /// from the result and recorded as `Persist` errors.
    async fn persist(
        &self,
        shells: &mut BTreeMap<String, Arc<StaticShell>>,
        errors: &mut Vec<BuildError>,
    ) -> PprResult<PprManifest> {
        let out_dir = &self.config.out_dir;
        fs::create_dir_all(out_dir)
            .await
            .map_err(|e| PprError::io(out_dir.display().to_string(), e))?;

        let mut failed = Vec::new();
        let mut files: HashMap<String, &str> = HashMap::new();
        for (path, shell) in shells.iter() {
            let file = shell_file_name(path);
            if let Some(owner) = files.get(&file) {
                let error = anyhow::anyhow!(
                    "shell file '{}' is already written for path '{}'",
                    file,
                    owner
                );
                warn!(path = %path, file = %file, "Shell file collision");
                errors.push(BuildError::new(BuildErrorKind::Persist, path, &error));
                failed.push(path.clone());
                continue;
            }
            files.insert(file, path.as_str());

            if let Err(error) = write_shell(out_dir, shell).await {
                warn!(path = %path, error = %error, "Failed to write shell");
                errors.push(BuildError::new(BuildErrorKind::Persist, path, &error.into()));
                failed.push(path.clone());
            }
        }
        for path in failed {
            shells.remove(&path);
        }

        let manifest = PprManifest::from_shells(ENGINE_VERSION, shells.values().map(|s| s.as_ref()))
            .with_base_url(self.config.base_url.clone());
        let file = write_manifest(out_dir, &manifest).await?;
        info!(file = %file.display(), routes = manifest.len(), "Wrote manifest");

        Ok(manifest)
    }
}
