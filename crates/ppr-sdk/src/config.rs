//! Engine configuration file.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ppr_build::BuildConfig;
use ppr_cache::{build_cache, CacheBackendConfig, CacheStrategy, EdgeCacheConfig, KvStore, PprCache};
use ppr_observability::LoggingConfig;
use ppr_stream::StreamConfig;
use serde::{Deserialize, Serialize};

/// Aggregate configuration, one section per component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PprConfig {
    /// Shell builder settings.
    #[serde(default)]
    pub build: BuildConfig,

    /// Shell cache backend.
    #[serde(default)]
    pub cache: CacheBackendConfig,

    /// Edge cache controller settings.
    #[serde(default)]
    pub edge: EdgeCacheConfig,

    /// Stream controller settings.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PprConfig {
    /// Load config from a file. `.json` files are parsed as JSON, anything
    /// else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        if is_json(path) {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
        }
    }

    /// Save config to a file, in the format implied by its extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            toml::to_string_pretty(self)?
        };

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Settings that would make a component misbehave at run time.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.build.concurrency == 0 {
            problems.push("build.concurrency must be at least 1".to_string());
        }
        if self.build.out_dir.as_os_str().is_empty() {
            problems.push("build.out_dir must not be empty".to_string());
        }

        match &self.cache {
            CacheBackendConfig::Lru { max_size: 0, .. } => {
                problems.push("cache.max_size must be at least 1".to_string());
            }
            CacheBackendConfig::Disk { dir } if dir.as_os_str().is_empty() => {
                problems.push("cache.dir must not be empty".to_string());
            }
            CacheBackendConfig::Kv { namespace, .. } if namespace.is_empty() => {
                problems.push("cache.namespace must not be empty".to_string());
            }
            _ => {}
        }

        if self.edge.strategy == CacheStrategy::StaleWhileRevalidate
            && self.edge.stale_ttl_secs == 0
        {
            problems.push(
                "edge.stale_ttl_secs of 0 revalidates on every request".to_string(),
            );
        }

        if self.stream.concurrency == 0 {
            problems.push("stream.concurrency must be at least 1".to_string());
        }
        if self.stream.boundary_timeout_ms == 0 {
            problems.push("stream.boundary_timeout_ms must be at least 1".to_string());
        }
        if self.stream.channel_capacity == 0 {
            problems.push("stream.channel_capacity must be at least 1".to_string());
        }

        problems
    }

    /// Construct the configured cache backend.
    pub fn create_cache(&self, kv: Option<Arc<dyn KvStore>>) -> Result<Arc<dyn PprCache>> {
        build_cache(&self.cache, kv)
            .with_context(|| format!("Failed to create {} cache", self.cache.name()))
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// Generate a default ppr.toml config file.
pub fn generate_default_config() -> String {
    r#"# Partial prerendering configuration

[build]
out_dir = "dist/ppr"
# Routes rendered concurrently
concurrency = 4
source_maps = false
# base_url = "https://example.com"

[cache]
# memory | lru | disk | kv
type = "lru"
max_size = 100
max_age_secs = 3600
# type = "disk"
# dir = ".ppr-cache"

[edge]
# cache-first | network-first | cache-only | stale-while-revalidate
strategy = "stale-while-revalidate"
stale_ttl_secs = 60
max_age_secs = 60
stale_while_revalidate_secs = 3600
# stale_if_error_secs = 86400

[stream]
# Boundaries resolved concurrently per priority group
concurrency = 3
boundary_timeout_ms = 10000
abort_on_error = false
channel_capacity = 16

[logging]
# trace | debug | info | warn | error, or a filter directive
level = "info"
# human | json
format = "human"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use ppr_observability::LogFormat;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_default_config_parses_to_defaults() {
        let config: PprConfig = toml::from_str(&generate_default_config()).unwrap();

        assert_eq!(config.build, BuildConfig::default());
        assert_eq!(
            config.cache,
            CacheBackendConfig::Lru {
                max_size: 100,
                max_age_secs: 3600
            }
        );
        assert_eq!(config.edge, EdgeCacheConfig::default());
        assert_eq!(config.stream, StreamConfig::default());
        assert_eq!(config.logging, LoggingConfig::default());
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: PprConfig = toml::from_str(
            r#"
            [cache]
            type = "disk"
            dir = "/var/cache/ppr"

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.cache,
            CacheBackendConfig::Disk {
                dir: PathBuf::from("/var/cache/ppr")
            }
        );
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.stream.concurrency, 3);
        assert_eq!(config.build.concurrency, 4);
    }

    #[test]
    fn test_save_and_load_by_extension() {
        let dir = TempDir::new().unwrap();
        let mut config = PprConfig::default();
        config.edge.strategy = CacheStrategy::NetworkFirst;
        config.stream.abort_on_error = true;

        for name in ["ppr.toml", "ppr.json"] {
            let path = dir.path().join(name);
            config.save(&path).unwrap();
            assert_eq!(PprConfig::load(&path).unwrap(), config);
        }

        let json = std::fs::read_to_string(dir.path().join("ppr.json")).unwrap();
        assert!(json.contains("\"network-first\""));
    }

    #[test]
    fn test_load_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[stream]\nconcurrency = \"many\"").unwrap();

        let error = PprConfig::load(&path).unwrap_err();
        assert!(error.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_validate_flags_zero_limits() {
        let mut config = PprConfig::default();
        config.stream.concurrency = 0;
        config.cache = CacheBackendConfig::Lru {
            max_size: 0,
            max_age_secs: 1,
        };

        let problems = config.validate();
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().any(|p| p.contains("stream.concurrency")));
    }

    #[test]
    fn test_create_cache() {
        let config = PprConfig::default();
        assert!(config.create_cache(None).is_ok());

        let kv = PprConfig {
            cache: CacheBackendConfig::Kv {
                namespace: "ppr:".into(),
                ttl_secs: None,
            },
            ..PprConfig::default()
        };
        assert!(kv.create_cache(None).is_err());
    }
}
