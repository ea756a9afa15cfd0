//! Cache error type.

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// No entry for the path and no way to produce one.
    #[error("cache miss for '{0}'")]
    Miss(String),

    /// Failed to serialize/deserialize a cache entry.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Fetcher failed and nothing usable was cached.
    #[error("fetch failed for '{path}': {source}")]
    Fetch {
        path: String,
        #[source]
        source: anyhow::Error,
    },
}

impl CacheError {
    /// Build a storage error from any displayable cause.
    pub fn storage(cause: impl std::fmt::Display) -> Self {
        Self::Storage(cause.to_string())
    }
}
