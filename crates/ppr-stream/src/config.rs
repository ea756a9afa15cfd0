//! Stream controller configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default boundaries resolved at once within a priority group.
pub const DEFAULT_STREAM_CONCURRENCY: usize = 3;

/// Default per-boundary timeout.
pub const DEFAULT_BOUNDARY_TIMEOUT_MS: u64 = 10_000;

/// Stream controller settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Boundaries resolved concurrently within one priority group.
    pub concurrency: usize,
    /// Time allowed for one boundary before an error fragment is sent.
    pub boundary_timeout_ms: u64,
    /// Abort the whole stream on the first boundary failure.
    pub abort_on_error: bool,
    /// Chunks buffered between the resolver task and the response body.
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_STREAM_CONCURRENCY,
            boundary_timeout_ms: DEFAULT_BOUNDARY_TIMEOUT_MS,
            abort_on_error: false,
            channel_capacity: 16,
        }
    }
}

impl StreamConfig {
    /// Set the per-group concurrency.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the per-boundary timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.boundary_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Abort on the first failure.
    pub fn with_abort_on_error(mut self, abort: bool) -> Self {
        self.abort_on_error = abort;
        self
    }

    /// Per-boundary timeout.
    pub fn boundary_timeout(&self) -> Duration {
        Duration::from_millis(self.boundary_timeout_ms)
    }
}
