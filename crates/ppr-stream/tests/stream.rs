//! Stream controller behaviour against instrumented boundary renderers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use ppr_core::{
    wrap_boundary, BoundaryRenderer, BoundaryResolution, DynamicBoundaryMetadata, PprError,
    RequestContext, ShellAssets, StaticShell, StreamHooks, StreamPhase, StreamStatus,
};
use ppr_stream::{HeadContent, StreamConfig, StreamController, StreamResponse, ERROR_FRAGMENT};

/// Renders `<b>{id}</b>` after a per-boundary delay and tracks concurrency.
#[derive(Default)]
struct ScriptedRenderer {
    delays_ms: HashMap<String, u64>,
    failing: Vec<String>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedRenderer {
    fn delay(mut self, id: &str, ms: u64) -> Self {
        self.delays_ms.insert(id.to_string(), ms);
        self
    }

    fn fail(mut self, id: &str) -> Self {
        self.failing.push(id.to_string());
        self
    }
}

#[async_trait]
impl BoundaryRenderer for ScriptedRenderer {
    async fn render_boundary(
        &self,
        boundary: &DynamicBoundaryMetadata,
        request: &RequestContext,
    ) -> anyhow::Result<String> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let delay = self.delays_ms.get(&boundary.id).copied().unwrap_or(5);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&boundary.id) {
            anyhow::bail!("{} backend unavailable", boundary.id);
        }
        Ok(format!("<b>{}@{}</b>", boundary.id, request.path))
    }
}

#[derive(Default)]
struct RecordingHooks {
    events: Mutex<Vec<String>>,
    complete: Mutex<Option<StreamStatus>>,
}

impl StreamHooks for RecordingHooks {
    fn on_shell_sent(&self, path: &str, _elapsed: Duration) {
        self.events.lock().unwrap().push(format!("shell:{}", path));
    }

    fn on_boundary_resolved(&self, resolution: &BoundaryResolution, _elapsed: Duration) {
        self.events.lock().unwrap().push(format!("resolved:{}", resolution.id));
    }

    fn on_error(&self, boundary_id: &str, _error: &PprError) {
        self.events.lock().unwrap().push(format!("error:{}", boundary_id));
    }

    fn on_complete(&self, status: &StreamStatus, _elapsed: Duration) {
        *self.complete.lock().unwrap() = Some(*status);
    }
}

fn shell(boundaries: &[(&str, i32)]) -> Arc<StaticShell> {
    let mut html = String::from("<main>");
    for (id, _) in boundaries {
        html.push_str(&wrap_boundary(id, Some(&format!("<i>{} loading</i>", id))));
    }
    html.push_str("</main>");

    Arc::new(StaticShell::new(
        "/page",
        html,
        boundaries
            .iter()
            .map(|(id, p)| DynamicBoundaryMetadata::new(*id).with_priority(*p)),
        ShellAssets::default().with_css("/app.css"),
    ))
}

fn controller(shell: Arc<StaticShell>, renderer: ScriptedRenderer) -> StreamController {
    StreamController::new(
        shell,
        RequestContext::new("/page").with_header("accept", "text/html"),
        Arc::new(renderer),
    )
}

fn position(body: &str, needle: &str) -> usize {
    body.find(needle)
        .unwrap_or_else(|| panic!("missing {:?} in body", needle))
}

// === Ordering Tests ===

#[tokio::test]
async fn test_emits_head_shell_register_then_boundaries() {
    let ctrl = controller(shell(&[("cart", 1)]), ScriptedRenderer::default())
        .with_head(HeadContent::new("Page"));
    let body = ctrl.create_stream().unwrap().into_string().await;

    let head = position(&body, "<title>Page</title>");
    let css = position(&body, r#"href="/app.css""#);
    let shell = position(&body, r#"<div data-ppr-id="cart"><i>cart loading</i></div>"#);
    let register = position(&body, r#"register(["cart"])"#);
    let inject = position(&body, r#"inject("cart","<b>cart@/page<\/b>",false)"#);
    let closing = position(&body, "</html>");

    assert!(head < css && css < shell && shell < register && register < inject && inject < closing);
    assert!(!body.contains("ppr:start"));
    assert!(!body.contains("ppr:fallback"));
}

#[tokio::test]
async fn test_higher_priority_group_always_first() {
    // The priority-10 boundary is slow, the priority-1 boundary is fast.
    let renderer = ScriptedRenderer::default().delay("hero", 60).delay("footer", 1);
    let ctrl = controller(shell(&[("footer", 1), ("hero", 10)]), renderer);

    let body = ctrl.create_stream().unwrap().into_string().await;

    assert!(position(&body, r#"inject("hero""#) < position(&body, r#"inject("footer""#));
}

#[tokio::test]
async fn test_within_group_completion_order() {
    let renderer = ScriptedRenderer::default().delay("slow", 60).delay("fast", 1);
    let ctrl = controller(shell(&[("slow", 5), ("fast", 5)]), renderer);

    let body = ctrl.create_stream().unwrap().into_string().await;

    assert!(position(&body, r#"inject("fast""#) < position(&body, r#"inject("slow""#));
}

// === Concurrency Tests ===

#[tokio::test]
async fn test_group_concurrency_capped() {
    let ids: Vec<String> = (0..10).map(|i| format!("b{}", i)).collect();
    let spec: Vec<(&str, i32)> = ids.iter().map(|id| (id.as_str(), 1)).collect();
    let renderer = Arc::new(ScriptedRenderer::default());

    let ctrl = StreamController::new(shell(&spec), RequestContext::new("/page"), renderer.clone());
    let body = ctrl.create_stream().unwrap().into_string().await;

    assert_eq!(body.matches("window.__PPR__.inject(").count(), 10);
    assert_eq!(renderer.peak.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_custom_concurrency() {
    let ids: Vec<String> = (0..6).map(|i| format!("b{}", i)).collect();
    let spec: Vec<(&str, i32)> = ids.iter().map(|id| (id.as_str(), 1)).collect();
    let renderer = Arc::new(ScriptedRenderer::default());

    let ctrl = StreamController::new(shell(&spec), RequestContext::new("/page"), renderer.clone())
        .with_config(StreamConfig::default().with_concurrency(1));
    ctrl.create_stream().unwrap().into_string().await;

    assert_eq!(renderer.peak.load(Ordering::SeqCst), 1);
}

// === Failure Tests ===

#[tokio::test(start_paused = true)]
async fn test_timeout_emits_error_and_continues() {
    let renderer = ScriptedRenderer::default().delay("slow", 60_000);
    let hooks = Arc::new(RecordingHooks::default());
    let ctrl = controller(shell(&[("slow", 2), ("ok", 1)]), renderer).with_hooks(hooks.clone());

    let body = ctrl.create_stream().unwrap().into_string().await;

    assert!(body.contains(r#"error("slow","Boundary 'slow' timed out after 10000ms")"#));
    assert!(body.contains(r#"inject("ok""#));

    let events = hooks.events.lock().unwrap().clone();
    assert_eq!(events, vec!["shell:/page", "error:slow", "resolved:ok"]);
    let status = hooks.complete.lock().unwrap().unwrap();
    assert_eq!(status.phase, StreamPhase::Complete);
    assert_eq!(status.resolved, 2);
    assert_eq!(status.pending, 0);
}

#[tokio::test]
async fn test_abort_on_error_skips_later_groups() {
    let renderer = ScriptedRenderer::default().fail("first");
    let ctrl = controller(shell(&[("first", 9), ("second", 1)]), renderer)
        .with_config(StreamConfig::default().with_abort_on_error(true));

    let body = ctrl.create_stream().unwrap().into_string().await;

    assert!(body.contains(r#"error("first""#));
    assert!(!body.contains(r#"inject("second""#));
    assert!(body.ends_with("</html>"));

    let status = ctrl.status();
    assert!(status.aborted);
    assert_eq!(status.phase, StreamPhase::Aborted);
    assert_eq!(status.pending, 1);
}

#[tokio::test]
async fn test_failure_without_abort_continues() {
    let renderer = ScriptedRenderer::default().fail("first");
    let ctrl = controller(shell(&[("first", 9), ("second", 1)]), renderer);

    let body = ctrl.create_stream().unwrap().into_string().await;

    assert!(body.contains(r#"error("first","Boundary 'first' failed: first backend unavailable")"#));
    assert!(body.contains(r#"inject("second""#));
    assert!(!ctrl.status().aborted);
}

// === Abort Tests ===

#[tokio::test(start_paused = true)]
async fn test_explicit_abort_stops_dispatch() {
    let renderer = ScriptedRenderer::default().delay("a", 30);
    let ctrl = controller(shell(&[("a", 3), ("b", 2), ("c", 1)]), renderer);

    let mut stream = ctrl.create_stream().unwrap();
    // head, shell, register
    for _ in 0..3 {
        stream.next().await.unwrap();
    }
    ctrl.abort();

    let mut rest = String::new();
    while let Some(chunk) = stream.next().await {
        rest.push_str(&String::from_utf8(chunk).unwrap());
    }

    assert!(!rest.contains("inject("));
    assert!(rest.contains("</html>"));
    assert_eq!(ctrl.status().phase, StreamPhase::Aborted);
}

#[tokio::test]
async fn test_dropping_stream_aborts() {
    let renderer = ScriptedRenderer::default().delay("a", 50);
    let ctrl = controller(shell(&[("a", 1)]), renderer);

    let stream = ctrl.create_stream().unwrap();
    drop(stream);

    assert!(ctrl.status().aborted);
}

#[tokio::test]
async fn test_stream_created_once() {
    let ctrl = controller(shell(&[]), ScriptedRenderer::default());
    assert_eq!(ctrl.status().phase, StreamPhase::Created);

    let body = ctrl.create_stream().unwrap().into_string().await;
    assert!(!body.contains("register("));
    assert_eq!(ctrl.status().phase, StreamPhase::Complete);
    assert!(ctrl.create_stream().is_err());
}

// === Non-streamed Tests ===

#[tokio::test]
async fn test_render_complete_injects_everything() {
    let renderer = ScriptedRenderer::default().fail("broken");
    let ctrl = controller(shell(&[("ok", 2), ("broken", 1)]), renderer);

    let html = ctrl.render_complete().await.unwrap();

    assert!(html.contains(r#"<div data-ppr-id="ok"><b>ok@/page</b></div>"#));
    assert!(html.contains(&format!(r#"<div data-ppr-id="broken">{}</div>"#, ERROR_FRAGMENT)));
    assert!(!html.contains("loading"));
    assert!(!html.contains("window.__PPR__.inject"));
    assert_eq!(ctrl.status().resolved, 2);
}

#[tokio::test]
async fn test_respond_picks_mode() {
    let streaming = controller(shell(&[("a", 1)]), ScriptedRenderer::default());
    assert!(matches!(
        streaming.respond().await.unwrap(),
        StreamResponse::Streamed(_)
    ));

    let plain = StreamController::new(
        shell(&[("a", 1)]),
        RequestContext::new("/page").with_header("accept", "application/json"),
        Arc::new(ScriptedRenderer::default()),
    );
    match plain.respond().await.unwrap() {
        StreamResponse::Complete(html) => assert!(html.contains("<b>a@/page</b>")),
        StreamResponse::Streamed(_) => panic!("expected a complete document"),
    }
}
