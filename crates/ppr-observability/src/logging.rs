//! Process-wide tracing subscriber setup.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Output format for logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format (for development).
    #[default]
    Human,
    /// JSON format (for production/log aggregation).
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Human => write!(f, "human"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// `[logging]` configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Simple level (`info`, `debug`, ...) or a full filter directive string.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Human,
        }
    }
}

impl LoggingConfig {
    /// Install the global subscriber described by this config.
    pub fn init(&self) -> bool {
        init_tracing(self.format, &self.level)
    }
}

/// Normalize a configured level into filter directives.
///
/// Simple levels are accepted in any case, `warning` is an alias for `warn`,
/// anything else is passed through as a directive string.
pub fn normalize_level(level: &str) -> String {
    let trimmed = level.trim();
    if trimmed.is_empty() {
        return "info".to_string();
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "trace" => "trace".to_string(),
        "debug" => "debug".to_string(),
        "info" => "info".to_string(),
        "warn" | "warning" => "warn".to_string(),
        "error" => "error".to_string(),
        _ => trimmed.to_string(),
    }
}

/// Build the filter for `level`, with `RUST_LOG` directives appended when set.
pub fn env_filter(level: &str) -> EnvFilter {
    let configured = normalize_level(level);
    let from_env = std::env::var("RUST_LOG")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    let directives = match from_env {
        Some(env) => format!("{},{}", configured, env),
        None => configured.clone(),
    };

    EnvFilter::try_new(directives)
        .or_else(|_| EnvFilter::try_new(configured))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// Logs go to stderr. Returns `false` when a subscriber was already
/// installed, which leaves the existing one in place.
pub fn init_tracing(format: LogFormat, level: &str) -> bool {
    let filter = env_filter(level);
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Human => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    installed.is_ok()
}
