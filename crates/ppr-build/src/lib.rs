//! Build-time shell generation.
//!
//! `ShellBuilder` expands route entries into concrete paths, renders each to
//! a `StaticShell` under a bounded worker pool, stores the shells in a
//! `PprCache` and writes them to disk next to a `ppr-manifest.json`.
//!
//! # Example
//!
//! ```ignore
//! use ppr_build::{BuildConfig, ShellBuilder};
//! use ppr_core::{FixedPaths, RouteEntry};
//!
//! let routes = vec![
//!     RouteEntry::new("/", "Home"),
//!     RouteEntry::new("/products/:id", "Product")
//!         .with_static_paths(FixedPaths::new(["/products/1", "/products/2"]))
//!         .with_tag("products"),
//! ];
//!
//! let result = ShellBuilder::new(routes, renderer, BuildConfig::new("dist/ppr"))
//!     .build()
//!     .await?;
//! for error in &result.errors {
//!     eprintln!("{}: {}", error.path, error.message);
//! }
//! ```

mod builder;
mod config;
mod output;

pub use builder::*;
pub use config::*;
pub use output::*;
