//! Error type for engine operations.

/// Result alias for engine operations.
pub type PprResult<T> = Result<T, PprError>;

/// Errors raised by the build and stream layers.
#[derive(Debug, thiserror::Error)]
pub enum PprError {
    #[error("Shell not sent before boundaries")]
    ShellNotSent,

    #[error("Streaming error: {0}")]
    StreamError(String),

    #[error("Render failed for '{path}': {source}")]
    RenderFailed {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Boundary '{0}' failed: {1}")]
    BoundaryFailed(String, String),

    #[error("Boundary '{id}' timed out after {timeout_ms}ms")]
    BoundaryTimeout { id: String, timeout_ms: u64 },

    #[error("Marker mismatch in shell '{path}': {detail}")]
    MarkerMismatch { path: String, detail: String },

    #[error("No route matches path '{0}'")]
    RouteNotFound(String),

    #[error("Stream aborted")]
    Aborted,

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PprError {
    /// Wrap an I/O error with the path it occurred at.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
