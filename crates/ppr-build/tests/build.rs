//! End-to-end builder properties.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ppr_build::{load_build, prime_cache, BuildConfig, BuildErrorKind, ShellBuilder};
use ppr_cache::{CacheStrategy, EdgeCacheConfig, EdgeCacheController, LruShellCache, PprCache};
use ppr_core::{
    wrap_boundary, DynamicBoundaryMetadata, FixedPaths, RenderOutput, RouteEntry, RouteParams,
    ShellAssets, ShellRenderer, StaticPathsFn,
};
use tempfile::TempDir;

/// Renderer that tracks how many renders run at once.
#[derive(Default)]
struct CountingRenderer {
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl ShellRenderer for CountingRenderer {
    async fn render(
        &self,
        _route: &RouteEntry,
        path: &str,
        _params: &RouteParams,
    ) -> anyhow::Result<RenderOutput> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(5 + (path.len() % 4) as u64 * 3)).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(RenderOutput::new(
            format!("<main>{}</main>", wrap_boundary("cart", Some("0 items"))),
            vec![DynamicBoundaryMetadata::new("cart").with_priority(1)],
        )
        .with_assets(ShellAssets::default().with_css("/main.css")))
    }
}

fn product_route(count: usize) -> RouteEntry {
    let paths: Vec<String> = (0..count).map(|i| format!("/products/{}", i)).collect();
    RouteEntry::new("/products/:id", "Product").with_static_paths(FixedPaths(paths))
}

#[tokio::test]
async fn test_concurrency_never_exceeds_limit() {
    let tmp = TempDir::new().unwrap();
    let renderer = Arc::new(CountingRenderer::default());

    let result = ShellBuilder::new(
        vec![product_route(20)],
        renderer.clone(),
        BuildConfig::new(tmp.path()).with_concurrency(3),
    )
    .build()
    .await
    .unwrap();

    assert_eq!(result.shells.len(), 20);
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 20);
    assert!(renderer.peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(renderer.peak.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_default_concurrency_is_four() {
    let tmp = TempDir::new().unwrap();
    let renderer = Arc::new(CountingRenderer::default());

    ShellBuilder::new(vec![product_route(12)], renderer.clone(), BuildConfig::new(tmp.path()))
        .build()
        .await
        .unwrap();

    assert_eq!(renderer.peak.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_failed_generators_only_drop_their_route() {
    let tmp = TempDir::new().unwrap();
    let failing = |name: &str| {
        RouteEntry::new(format!("/{}/:id", name), name).with_static_paths(StaticPathsFn(|| async {
            Err::<Vec<String>, _>(anyhow::anyhow!("source offline"))
        }))
    };

    let routes = vec![
        product_route(2),
        failing("blog"),
        RouteEntry::new("/about", "About"),
        failing("docs"),
    ];

    let result = ShellBuilder::new(
        routes,
        Arc::new(CountingRenderer::default()),
        BuildConfig::new(tmp.path()),
    )
    .build()
    .await
    .unwrap();

    assert_eq!(result.shells.len(), 3);
    assert_eq!(result.errors.len(), 2);
    assert!(result
        .errors
        .iter()
        .all(|e| e.kind == BuildErrorKind::Expansion));
    let failed: Vec<&str> = result.errors.iter().map(|e| e.path.as_str()).collect();
    assert!(failed.contains(&"/blog/:id"));
    assert!(failed.contains(&"/docs/:id"));
}

#[tokio::test]
async fn test_build_then_serve_from_loaded_output() {
    let tmp = TempDir::new().unwrap();
    let built = ShellBuilder::new(
        vec![product_route(3), RouteEntry::new("/", "Home")],
        Arc::new(CountingRenderer::default()),
        BuildConfig::new(tmp.path()).with_base_url("https://shop.example"),
    )
    .build()
    .await
    .unwrap();
    assert_eq!(built.manifest.base_url.as_deref(), Some("https://shop.example"));

    let loaded = load_build(tmp.path()).await.unwrap();
    assert_eq!(loaded.manifest.len(), 4);
    assert_eq!(loaded.manifest.total_boundaries(), 4);

    let cache = Arc::new(LruShellCache::new(10, Duration::from_secs(600)));
    assert_eq!(prime_cache(cache.as_ref(), loaded.shells).await.unwrap(), 4);

    let edge = EdgeCacheController::new(cache.clone(), EdgeCacheConfig::with_strategy(CacheStrategy::CacheOnly));
    let served = edge
        .get("/products/1", || async { Err(anyhow::anyhow!("offline")) })
        .await
        .unwrap();
    assert_eq!(
        served.shell.content_hash,
        built.shells["/products/1"].content_hash
    );
    assert_eq!(served.shell.assets.css, vec!["/main.css"]);
    assert!(cache.has("/").await);
}
