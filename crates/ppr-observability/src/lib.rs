//! Observability for the partial-prerendering engine.
//!
//! This crate provides:
//! - `init_tracing` - Process-wide `tracing` subscriber setup
//! - `TracingHooks` - Stream lifecycle events as structured log lines
//! - `MetricsHooks` / `StreamMetrics` - Per-request streaming timings
//! - `RevalidationMetrics` - Background refresh counters

mod hooks;
mod logging;
mod metrics;

pub use hooks::*;
pub use logging::*;
pub use metrics::*;

// Re-export lifecycle types from ppr-core for convenience
pub use ppr_core::{FanoutHooks, StreamHooks, StreamStatus, TimingContext};
