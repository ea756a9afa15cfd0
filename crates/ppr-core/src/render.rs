//! Rendering collaborators.
//!
//! The component renderer is external to the engine: it is handed in as a
//! [`ShellRenderer`] at build time and a [`BoundaryRenderer`] at request time.

use std::future::Future;

use async_trait::async_trait;

use crate::context::{RequestContext, RouteParams};
use crate::route::RouteEntry;
use crate::shell::{DynamicBoundaryMetadata, ShellAssets};

/// Output of rendering a route to a shell.
#[derive(Debug, Clone, Default)]
pub struct RenderOutput {
    /// Markup with boundary markers.
    pub html: String,
    /// Boundaries found while rendering, in document order.
    pub boundaries: Vec<DynamicBoundaryMetadata>,
    /// Head assets.
    pub assets: ShellAssets,
}

impl RenderOutput {
    /// Create render output from markup and boundaries.
    pub fn new(html: impl Into<String>, boundaries: Vec<DynamicBoundaryMetadata>) -> Self {
        Self {
            html: html.into(),
            boundaries,
            assets: ShellAssets::default(),
        }
    }

    /// Set the head assets.
    pub fn with_assets(mut self, assets: ShellAssets) -> Self {
        self.assets = assets;
        self
    }
}

/// Renders a route's component tree to static markup plus its boundary list.
#[async_trait]
pub trait ShellRenderer: Send + Sync {
    /// Render `route` for the concrete `path`.
    async fn render(
        &self,
        route: &RouteEntry,
        path: &str,
        params: &RouteParams,
    ) -> anyhow::Result<RenderOutput>;
}

/// Renders one dynamic boundary for a live request.
#[async_trait]
pub trait BoundaryRenderer: Send + Sync {
    /// Produce the boundary's markup.
    async fn render_boundary(
        &self,
        boundary: &DynamicBoundaryMetadata,
        request: &RequestContext,
    ) -> anyhow::Result<String>;
}

/// Expands a parameterized route into concrete paths.
#[async_trait]
pub trait StaticPathsGenerator: Send + Sync {
    /// Concrete paths to prerender.
    async fn static_paths(&self) -> anyhow::Result<Vec<String>>;
}

/// A fixed list of paths.
#[derive(Debug, Clone, Default)]
pub struct FixedPaths(pub Vec<String>);

impl FixedPaths {
    /// Create from any list of path-like values.
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(paths.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl StaticPathsGenerator for FixedPaths {
    async fn static_paths(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

/// Adapts an async closure into a [`StaticPathsGenerator`].
pub struct StaticPathsFn<F>(pub F);

#[async_trait]
impl<F, Fut> StaticPathsGenerator for StaticPathsFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Vec<String>>> + Send,
{
    async fn static_paths(&self) -> anyhow::Result<Vec<String>> {
        (self.0)().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_paths() {
        let paths = FixedPaths::new(["/a", "/b"]).static_paths().await.unwrap();
        assert_eq!(paths, vec!["/a".to_string(), "/b".to_string()]);
    }

    #[tokio::test]
    async fn test_static_paths_fn() {
        let generator = StaticPathsFn(|| async { Ok(vec!["/x".to_string()]) });
        assert_eq!(generator.static_paths().await.unwrap(), vec!["/x".to_string()]);

        let failing = StaticPathsFn(|| async { Err::<Vec<String>, _>(anyhow::anyhow!("db down")) });
        assert!(failing.static_paths().await.is_err());
    }
}
