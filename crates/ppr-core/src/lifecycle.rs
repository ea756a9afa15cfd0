//! Stream lifecycle tracking and hook points.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::PprError;
use crate::shell::{BoundaryResolution, StaticShell};

/// Lifecycle phases of a streamed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Controller built, nothing sent.
    Created,
    /// Shell sent, boundaries resolving.
    Streaming,
    /// Every boundary processed.
    Complete,
    /// Stopped early by `abort()` or an error with `abort_on_error`.
    Aborted,
}

/// Snapshot of a stream's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStatus {
    /// Current phase.
    pub phase: StreamPhase,
    /// Boundaries emitted (successfully or as an error fragment).
    pub resolved: usize,
    /// Boundaries not yet emitted.
    pub pending: usize,
    /// Whether the stream was aborted.
    pub aborted: bool,
}

/// Timing context for observability.
#[derive(Debug, Clone)]
pub struct TimingContext {
    start: Instant,
    marks: HashMap<String, Instant>,
}

impl TimingContext {
    /// Create a new timing context.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            marks: HashMap::new(),
        }
    }

    /// Record a timing mark.
    pub fn mark(&mut self, name: &str) {
        self.marks.insert(name.to_string(), Instant::now());
    }

    /// Mark a boundary as emitted.
    pub fn mark_boundary(&mut self, id: &str) {
        self.mark(&format!("boundary_{}", id));
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time from start to a named mark.
    pub fn since_start(&self, name: &str) -> Option<Duration> {
        self.marks.get(name).map(|t| t.duration_since(self.start))
    }

    /// Get time to shell flush.
    pub fn time_to_shell(&self) -> Option<Duration> {
        self.since_start("shell_sent")
    }

    /// Get time to the first emitted boundary.
    pub fn time_to_first_boundary(&self) -> Option<Duration> {
        self.marks
            .iter()
            .filter(|(k, _)| k.starts_with("boundary_"))
            .map(|(_, t)| t.duration_since(self.start))
            .min()
    }
}

impl Default for TimingContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Callbacks fired by the stream controller.
///
/// Every method has a no-op default.
pub trait StreamHooks: Send + Sync {
    /// The shell markup has been handed to the transport.
    fn on_shell_sent(&self, _path: &str, _elapsed: Duration) {}

    /// A boundary resolved and its injection script was emitted.
    fn on_boundary_resolved(&self, _resolution: &BoundaryResolution, _elapsed: Duration) {}

    /// A boundary failed or timed out.
    fn on_error(&self, _boundary_id: &str, _error: &PprError) {}

    /// The stream finished or was aborted.
    fn on_complete(&self, _status: &StreamStatus, _elapsed: Duration) {}
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl StreamHooks for NoopHooks {}

/// Forwards every callback to a list of hooks.
#[derive(Clone, Default)]
pub struct FanoutHooks(pub Vec<Arc<dyn StreamHooks>>);

impl FanoutHooks {
    /// Add a hook.
    pub fn with(mut self, hooks: Arc<dyn StreamHooks>) -> Self {
        self.0.push(hooks);
        self
    }
}

impl StreamHooks for FanoutHooks {
    fn on_shell_sent(&self, path: &str, elapsed: Duration) {
        self.0.iter().for_each(|h| h.on_shell_sent(path, elapsed));
    }

    fn on_boundary_resolved(&self, resolution: &BoundaryResolution, elapsed: Duration) {
        self.0
            .iter()
            .for_each(|h| h.on_boundary_resolved(resolution, elapsed));
    }

    fn on_error(&self, boundary_id: &str, error: &PprError) {
        self.0.iter().for_each(|h| h.on_error(boundary_id, error));
    }

    fn on_complete(&self, status: &StreamStatus, elapsed: Duration) {
        self.0.iter().for_each(|h| h.on_complete(status, elapsed));
    }
}

/// Observer for background stale-while-revalidate refreshes.
pub trait RevalidationObserver: Send + Sync {
    /// A background refresh replaced the cached shell.
    fn on_revalidated(&self, _path: &str, _shell: &StaticShell) {}

    /// A background refresh failed; the stale entry stays cached.
    fn on_revalidation_failed(&self, _path: &str, _error: &anyhow::Error) {}
}

/// Observer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRevalidationObserver;

impl RevalidationObserver for NoopRevalidationObserver {}
