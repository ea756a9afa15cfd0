//! Core abstractions for the partial-prerendering (PPR) engine.
//!
//! This crate provides the types shared by the builder, the cache layer and
//! the stream controller:
//! - `StaticShell` - Prerendered markup plus its dynamic boundary table
//! - `PprManifest` - Index written at the end of a build
//! - Placeholder protocol - `ppr:start:<id>` / `ppr:end:<id>` comment markers
//! - `RouteEntry` / `RoutePattern` - Build input and path parameter extraction
//! - `ShellRenderer` / `BoundaryRenderer` - Rendering collaborators
//! - `WorkerPool` - Bounded-concurrency task pool

mod context;
mod error;
mod lifecycle;
mod manifest;
mod markers;
mod pool;
mod render;
mod route;
mod shell;

pub use context::*;
pub use error::*;
pub use lifecycle::*;
pub use manifest::*;
pub use markers::*;
pub use pool::*;
pub use render::*;
pub use route::*;
pub use shell::*;
