//! Build configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default number of routes rendered at once.
pub const DEFAULT_BUILD_CONCURRENCY: usize = 4;

/// Shell builder settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Output directory for shells and the manifest.
    pub out_dir: PathBuf,
    /// Maximum routes rendered concurrently.
    pub concurrency: usize,
    /// Keep `sourceMappingURL` comments in shell markup.
    pub source_maps: bool,
    /// Public base URL recorded in the manifest.
    pub base_url: Option<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("dist/ppr"),
            concurrency: DEFAULT_BUILD_CONCURRENCY,
            source_maps: false,
            base_url: None,
        }
    }
}

impl BuildConfig {
    /// Config writing to `out_dir` with default settings.
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            ..Self::default()
        }
    }

    /// Set the concurrency limit.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Keep or strip source map comments.
    pub fn with_source_maps(mut self, enabled: bool) -> Self {
        self.source_maps = enabled;
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}
