//! Stream lifecycle events as structured log lines.

use std::time::Duration;

use ppr_core::{BoundaryResolution, PprError, RequestId, StreamHooks, StreamStatus};
use tracing::{debug, info, warn};

/// Stream hooks that log every lifecycle event.
#[derive(Debug, Clone)]
pub struct TracingHooks {
    request_id: RequestId,
}

impl TracingHooks {
    /// Log events tagged with `request_id`.
    pub fn new(request_id: RequestId) -> Self {
        Self { request_id }
    }

    /// Request ID attached to every event.
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }
}

impl StreamHooks for TracingHooks {
    fn on_shell_sent(&self, path: &str, elapsed: Duration) {
        debug!(
            request_id = %self.request_id,
            path,
            elapsed_ms = elapsed.as_millis() as u64,
            "Shell sent"
        );
    }

    fn on_boundary_resolved(&self, resolution: &BoundaryResolution, elapsed: Duration) {
        debug!(
            request_id = %self.request_id,
            boundary = %resolution.id,
            bytes = resolution.html.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Boundary streamed"
        );
    }

    fn on_error(&self, boundary_id: &str, error: &PprError) {
        warn!(
            request_id = %self.request_id,
            boundary = boundary_id,
            error = %error,
            "Boundary error"
        );
    }

    fn on_complete(&self, status: &StreamStatus, elapsed: Duration) {
        info!(
            request_id = %self.request_id,
            phase = ?status.phase,
            resolved = status.resolved,
            pending = status.pending,
            elapsed_ms = elapsed.as_millis() as u64,
            "Stream complete"
        );
    }
}
