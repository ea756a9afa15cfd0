//! Public SDK for the partial-prerendering engine.
//!
//! This crate re-exports all engine functionality:
//!
//! ```ignore
//! use ppr_sdk::prelude::*;
//!
//! let config = PprConfig::load("ppr.toml")?;
//! config.logging.init();
//!
//! let cache = config.create_cache(None)?;
//! let result = ShellBuilder::new(routes, renderer, config.build.clone())
//!     .with_cache(cache.clone())
//!     .build()
//!     .await?;
//!
//! let edge = EdgeCacheController::new(cache, config.edge.clone());
//! let shell = edge.get("/products/1", fetch).await?.shell;
//! let body = StreamController::new(shell, request, boundaries)
//!     .with_config(config.stream.clone())
//!     .create_stream()?;
//! ```

mod config;

pub use config::*;

pub use ppr_build;
pub use ppr_cache;
pub use ppr_core;
pub use ppr_observability;
pub use ppr_stream;

/// Prelude for convenient imports.
pub mod prelude {
    pub use ppr_build::*;
    pub use ppr_cache::*;
    pub use ppr_core::*;
    pub use ppr_observability::*;
    pub use ppr_stream::*;

    pub use crate::config::*;
}
