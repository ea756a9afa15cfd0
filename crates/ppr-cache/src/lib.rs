//! Caching layer for the partial-prerendering engine.
//!
//! This crate provides:
//! - `PprCache` - Storage contract for prerendered shells
//! - `MemoryShellCache`, `LruShellCache`, `DiskShellCache`, `KvShellCache` - Backends
//! - `CacheTagIndex` - Tag to path index for bulk invalidation
//! - `EdgeCacheController` - Consistency strategies over a shell cache
//! - Header helpers - `Cache-Control`, `ETag` and conditional requests
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ppr_cache::{CacheStrategy, EdgeCacheConfig, EdgeCacheController, LruShellCache};
//!
//! let cache = Arc::new(LruShellCache::new(500, Duration::from_secs(3600)));
//! let edge = EdgeCacheController::new(cache, EdgeCacheConfig::default());
//!
//! let result = edge.get("/products", move || render_shell("/products")).await?;
//! if result.stale {
//!     // served from cache while a refresh runs
//! }
//! ```

mod backend;
mod config;
mod disk;
mod edge;
mod error;
mod headers;
mod kv;
mod lru;
mod memory;
mod tags;

pub use backend::*;
pub use config::*;
pub use disk::*;
pub use edge::*;
pub use error::*;
pub use headers::*;
pub use kv::*;
pub use lru::*;
pub use memory::*;
pub use tags::*;
