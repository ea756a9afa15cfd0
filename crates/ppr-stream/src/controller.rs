//! Stream controller: shell first, then boundaries by priority.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::channel::mpsc;
use futures::{Sink, Stream, StreamExt};
use ppr_core::{
    prepare_streaming_html, BoundaryRenderer, BoundaryResolution, DynamicBoundaryMetadata,
    NoopHooks, PprError, PprResult, RequestContext, StaticShell, StreamHooks, StreamPhase,
    StreamStatus, TimingContext, WorkerPool,
};
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::head::{closing_markup, HeadContent};
use crate::runtime::{error_script, inject_script, register_script};
use crate::sink::StreamingSink;

/// Progress shared between the controller, its driver task and the stream.
#[derive(Debug)]
struct StreamState {
    started: AtomicBool,
    finished: AtomicBool,
    aborted: AtomicBool,
    resolved: AtomicUsize,
    total: usize,
}

impl StreamState {
    fn new(total: usize) -> Self {
        Self {
            started: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            aborted: AtomicBool::new(false),
            resolved: AtomicUsize::new(0),
            total,
        }
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    fn status(&self) -> StreamStatus {
        let aborted = self.is_aborted();
        let resolved = self.resolved.load(Ordering::SeqCst);
        let phase = if aborted {
            StreamPhase::Aborted
        } else if self.finished.load(Ordering::SeqCst) {
            StreamPhase::Complete
        } else if self.started.load(Ordering::SeqCst) {
            StreamPhase::Streaming
        } else {
            StreamPhase::Created
        };

        StreamStatus {
            phase,
            resolved,
            pending: self.total.saturating_sub(resolved),
            aborted,
        }
    }
}

/// One settled boundary.
#[derive(Debug)]
pub(crate) struct Settled {
    pub(crate) resolution: BoundaryResolution,
    pub(crate) error: Option<PprError>,
    pub(crate) elapsed: Duration,
}

/// Serves one shell for one request.
///
/// Clones share progress: `abort` and `status` on any clone affect and
/// report the same stream.
#[derive(Clone)]
pub struct StreamController {
    pub(crate) shell: Arc<StaticShell>,
    pub(crate) request: Arc<RequestContext>,
    pub(crate) renderer: Arc<dyn BoundaryRenderer>,
    pub(crate) config: StreamConfig,
    pub(crate) hooks: Arc<dyn StreamHooks>,
    pub(crate) head: HeadContent,
    state: Arc<StreamState>,
}

impl StreamController {
    /// Create a controller for `shell` and the live `request`.
    pub fn new(
        shell: Arc<StaticShell>,
        request: RequestContext,
        renderer: Arc<dyn BoundaryRenderer>,
    ) -> Self {
        let total = shell.boundary_count();
        Self {
            shell,
            request: Arc::new(request),
            renderer,
            config: StreamConfig::default(),
            hooks: Arc::new(NoopHooks),
            head: HeadContent::default(),
            state: Arc::new(StreamState::new(total)),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    /// Set lifecycle hooks.
    pub fn with_hooks(mut self, hooks: Arc<dyn StreamHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Set head content.
    pub fn with_head(mut self, head: HeadContent) -> Self {
        self.head = head;
        self
    }

    /// Shell being served.
    pub fn shell(&self) -> &Arc<StaticShell> {
        &self.shell
    }

    /// Stop dispatching boundary work. Boundaries already resolving finish
    /// but their results are discarded; closing markup is still sent.
    pub fn abort(&self) {
        if !self.state.aborted.swap(true, Ordering::SeqCst) {
            debug!(path = %self.shell.path, "Stream aborted");
        }
    }

    /// Current progress.
    pub fn status(&self) -> StreamStatus {
        self.state.status()
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.state.is_aborted()
    }

    /// Start streaming. The returned body yields chunks as they are
    /// produced; dropping it before the end aborts the stream.
    ///
    /// Must be called from within a tokio runtime, and only once.
    pub fn create_stream(&self) -> PprResult<ShellStream> {
        if self.state.started.swap(true, Ordering::SeqCst) {
            return Err(PprError::StreamError("Stream already created".to_string()));
        }

        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        tokio::spawn(self.clone().drive(tx));

        Ok(ShellStream {
            rx,
            state: self.state.clone(),
            ended: false,
        })
    }

    async fn drive(self, tx: mpsc::Sender<Vec<u8>>) {
        let mut sink = StreamingSink::new(tx, TimingContext::new());

        if let Err(error) = self.stream(&mut sink).await {
            warn!(path = %self.shell.path, error = %error, "Stream ended early");
            self.abort();
        }

        let elapsed = sink.timing().elapsed();
        self.finish(elapsed);
        info!(
            path = %self.shell.path,
            resolved = self.state.resolved.load(Ordering::SeqCst),
            aborted = self.is_aborted(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Stream finished"
        );

        // End the body only after hooks have observed completion.
        if let Err(error) = sink.close().await {
            debug!(error = %error, "Response body already closed");
        }
    }

    async fn stream<S, E>(&self, sink: &mut StreamingSink<S, E>) -> PprResult<()>
    where
        S: Sink<Vec<u8>, Error = E> + Unpin,
        E: std::fmt::Display,
    {
        sink.send_head(&self.head.render_opening(&self.shell.assets))
            .await?;
        sink.send_shell(&prepare_streaming_html(&self.shell.html))
            .await?;
        self.hooks
            .on_shell_sent(&self.shell.path, sink.timing().elapsed());
        debug!(path = %self.shell.path, boundaries = self.state.total, "Shell sent");

        if self.state.total > 0 {
            let ids = self.shell.boundaries.keys().map(String::as_str);
            sink.send_chunk(&register_script(ids)).await?;
        }

        for (priority, group) in self.shell.priority_groups() {
            if self.is_aborted() {
                break;
            }
            debug!(priority, boundaries = group.len(), "Resolving priority group");

            let mut pool = WorkerPool::new(self.config.concurrency);
            for boundary in group {
                pool.push(self.resolve(boundary));
            }

            loop {
                if !self.is_aborted() {
                    pool.fill();
                }
                let Some(settled) = pool.next_settled().await else {
                    break;
                };
                if self.is_aborted() {
                    debug!(boundary = %settled.resolution.id, "Discarding result after abort");
                    continue;
                }
                self.emit(sink, settled).await?;
            }
        }

        sink.complete(closing_markup()).await
    }

    async fn emit<S, E>(&self, sink: &mut StreamingSink<S, E>, settled: Settled) -> PprResult<()>
    where
        S: Sink<Vec<u8>, Error = E> + Unpin,
        E: std::fmt::Display,
    {
        let Settled {
            resolution,
            error,
            elapsed,
        } = settled;

        match error {
            None => {
                sink.send_boundary(&resolution.id, &inject_script(&resolution.id, &resolution.html))
                    .await?;
                self.state.resolved.fetch_add(1, Ordering::SeqCst);
                debug!(
                    boundary = %resolution.id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Boundary resolved"
                );
                self.hooks.on_boundary_resolved(&resolution, elapsed);
            }
            Some(error) => {
                let message = error.to_string();
                sink.send_boundary(&resolution.id, &error_script(&resolution.id, &message))
                    .await?;
                self.state.resolved.fetch_add(1, Ordering::SeqCst);
                warn!(boundary = %resolution.id, error = %message, "Boundary failed");
                self.hooks.on_error(&resolution.id, &error);

                if self.config.abort_on_error {
                    self.abort();
                }
            }
        }
        Ok(())
    }

    /// Render one boundary, racing it against the configured timeout.
    pub(crate) async fn resolve(&self, boundary: &DynamicBoundaryMetadata) -> Settled {
        let started = Instant::now();
        let timeout = self.config.boundary_timeout();
        let outcome = tokio::time::timeout(
            timeout,
            self.renderer.render_boundary(boundary, &self.request),
        )
        .await;
        let elapsed = started.elapsed();

        let error = match outcome {
            Ok(Ok(html)) => {
                return Settled {
                    resolution: BoundaryResolution::resolved(&boundary.id, html),
                    error: None,
                    elapsed,
                }
            }
            Ok(Err(e)) => PprError::BoundaryFailed(boundary.id.clone(), e.to_string()),
            Err(_) => PprError::BoundaryTimeout {
                id: boundary.id.clone(),
                timeout_ms: timeout.as_millis() as u64,
            },
        };

        Settled {
            resolution: BoundaryResolution::failed(&boundary.id, error.to_string()),
            error: Some(error),
            elapsed,
        }
    }

    /// Record a settled boundary for the non-streamed path.
    pub(crate) fn record(&self, settled: &Settled) {
        self.state.resolved.fetch_add(1, Ordering::SeqCst);
        match &settled.error {
            None => self
                .hooks
                .on_boundary_resolved(&settled.resolution, settled.elapsed),
            Some(error) => self.hooks.on_error(&settled.resolution.id, error),
        }
    }

    pub(crate) fn mark_started(&self) -> PprResult<()> {
        if self.state.started.swap(true, Ordering::SeqCst) {
            return Err(PprError::StreamError("Stream already created".to_string()));
        }
        Ok(())
    }

    pub(crate) fn finish(&self, elapsed: Duration) {
        self.state.finished.store(true, Ordering::SeqCst);
        self.hooks.on_complete(&self.status(), elapsed);
    }
}

/// Streamed response body.
///
/// Dropping it before the stream completes aborts the controller.
pub struct ShellStream {
    rx: mpsc::Receiver<Vec<u8>>,
    state: Arc<StreamState>,
    ended: bool,
}

impl ShellStream {
    /// Collect the whole body. Intended for tests and non-streaming transports.
    pub async fn into_string(mut self) -> String {
        let mut body = Vec::new();
        while let Some(chunk) = self.next().await {
            body.extend_from_slice(&chunk);
        }
        String::from_utf8_lossy(&body).into_owned()
    }
}

impl Stream for ShellStream {
    type Item = Vec<u8>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let poll = self.rx.poll_next_unpin(cx);
        if let Poll::Ready(None) = poll {
            self.ended = true;
        }
        poll
    }
}

impl Drop for ShellStream {
    fn drop(&mut self) {
        if !self.ended && !self.state.finished.load(Ordering::SeqCst) {
            self.state.aborted.store(true, Ordering::SeqCst);
        }
    }
}
