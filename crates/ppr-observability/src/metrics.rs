//! Streaming and revalidation metrics.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use ppr_core::{
    BoundaryResolution, PprError, RequestId, RevalidationObserver, StaticShell, StreamHooks,
    StreamStatus,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Metrics for a single streamed response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamMetrics {
    /// Request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Route path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Time to shell flush (microseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_shell_us: Option<u64>,
    /// Time to first boundary (microseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_first_boundary_us: Option<u64>,
    /// Boundary timings, keyed by boundary id.
    pub boundaries: BTreeMap<String, BoundaryMetrics>,
    /// Total stream duration (microseconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_duration_us: Option<u64>,
    /// Whether the stream was aborted.
    pub aborted: bool,
}

/// Metrics for a single boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryMetrics {
    /// Render duration (microseconds). Zero when only the failure is known.
    pub duration_us: u64,
    /// Bytes of resolved markup.
    pub bytes: usize,
    /// Error message if failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamMetrics {
    /// Number of boundaries that failed or timed out.
    pub fn failures(&self) -> usize {
        self.boundaries.values().filter(|b| b.error.is_some()).count()
    }

    /// Number of boundaries that resolved.
    pub fn resolved(&self) -> usize {
        self.boundaries.len() - self.failures()
    }

    /// Format as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Format as human-readable summary.
    pub fn to_summary(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "Stream: {}",
            self.path.as_deref().unwrap_or("<unknown>")
        ));

        if let Some(tts) = self.time_to_shell_us {
            lines.push(format!("  Time to shell: {}us ({:.2}ms)", tts, tts as f64 / 1000.0));
        }

        if let Some(ttfb) = self.time_to_first_boundary_us {
            lines.push(format!(
                "  Time to first boundary: {}us ({:.2}ms)",
                ttfb,
                ttfb as f64 / 1000.0
            ));
        }

        if let Some(total) = self.total_duration_us {
            lines.push(format!("  Total: {}us ({:.2}ms)", total, total as f64 / 1000.0));
        }

        if !self.boundaries.is_empty() {
            lines.push("  Boundaries:".to_string());
            for (id, boundary) in &self.boundaries {
                match &boundary.error {
                    None => lines.push(format!(
                        "    {}: {}us ({:.2}ms) {} bytes",
                        id,
                        boundary.duration_us,
                        boundary.duration_us as f64 / 1000.0,
                        boundary.bytes
                    )),
                    Some(error) => lines.push(format!("    {}: FAILED - {}", id, error)),
                }
            }
        }

        if self.aborted {
            lines.push("  [aborted]".to_string());
        }

        lines.join("\n")
    }
}

/// Stream hooks that collect [`StreamMetrics`].
///
/// Use one instance per request; read the result with [`MetricsHooks::snapshot`].
#[derive(Debug, Default)]
pub struct MetricsHooks {
    metrics: Mutex<StreamMetrics>,
}

impl MetricsHooks {
    /// Create a collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collector tagged with a request ID.
    pub fn for_request(request_id: &RequestId) -> Self {
        Self {
            metrics: Mutex::new(StreamMetrics {
                request_id: Some(request_id.to_string()),
                ..StreamMetrics::default()
            }),
        }
    }

    /// Metrics collected so far.
    pub fn snapshot(&self) -> StreamMetrics {
        self.with(|m| m.clone())
    }

    fn with<R>(&self, f: impl FnOnce(&mut StreamMetrics) -> R) -> R {
        let mut guard = self
            .metrics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

impl StreamHooks for MetricsHooks {
    fn on_shell_sent(&self, path: &str, elapsed: Duration) {
        self.with(|m| {
            m.path = Some(path.to_string());
            m.time_to_shell_us = Some(elapsed.as_micros() as u64);
        });
    }

    fn on_boundary_resolved(&self, resolution: &BoundaryResolution, elapsed: Duration) {
        self.with(|m| {
            // Boundary render starts once the shell is flushed.
            if m.time_to_first_boundary_us.is_none() {
                let shell = m.time_to_shell_us.unwrap_or(0);
                m.time_to_first_boundary_us = Some(shell + elapsed.as_micros() as u64);
            }
            m.boundaries.insert(
                resolution.id.clone(),
                BoundaryMetrics {
                    duration_us: elapsed.as_micros() as u64,
                    bytes: resolution.html.len(),
                    error: None,
                },
            );
        });
    }

    fn on_error(&self, boundary_id: &str, error: &PprError) {
        self.with(|m| {
            m.boundaries.insert(
                boundary_id.to_string(),
                BoundaryMetrics {
                    duration_us: 0,
                    bytes: 0,
                    error: Some(error.to_string()),
                },
            );
        });
    }

    fn on_complete(&self, status: &StreamStatus, elapsed: Duration) {
        self.with(|m| {
            m.total_duration_us = Some(elapsed.as_micros() as u64);
            m.aborted = status.aborted;
        });
    }
}

/// Counters for background stale-while-revalidate refreshes.
#[derive(Debug, Default)]
pub struct RevalidationMetrics {
    revalidated: AtomicU64,
    failed: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl RevalidationMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refreshes that replaced a cached shell.
    pub fn revalidated(&self) -> u64 {
        self.revalidated.load(Ordering::Relaxed)
    }

    /// Refreshes that failed.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Most recent failure, formatted as `path: error`.
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl RevalidationObserver for RevalidationMetrics {
    fn on_revalidated(&self, path: &str, shell: &StaticShell) {
        self.revalidated.fetch_add(1, Ordering::Relaxed);
        debug!(path, hash = %shell.content_hash, "Revalidated shell");
    }

    fn on_revalidation_failed(&self, path: &str, error: &anyhow::Error) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        *self
            .last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(format!("{}: {:#}", path, error));
    }
}
