//! Route entries and path parameter extraction.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::RouteParams;
use crate::render::StaticPathsGenerator;

/// One segment of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
    CatchAll(String),
}

/// Parsed route pattern such as `/products/:id` or `/docs/*slug`.
///
/// Bracket syntax (`[id]`, `[...slug]`) is accepted as well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parse a pattern.
    pub fn parse(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                if let Some(name) = s.strip_prefix(':') {
                    Segment::Param(name.to_string())
                } else if let Some(name) = s.strip_prefix('*') {
                    Segment::CatchAll(name.to_string())
                } else if let Some(name) = s.strip_prefix("[...").and_then(|r| r.strip_suffix(']')) {
                    Segment::CatchAll(name.to_string())
                } else if let Some(name) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
                    Segment::Param(name.to_string())
                } else {
                    Segment::Static(s.to_string())
                }
            })
            .collect();

        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    /// Original pattern text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the pattern has parameters.
    pub fn is_dynamic(&self) -> bool {
        self.segments.iter().any(|s| !matches!(s, Segment::Static(_)))
    }

    /// Match a concrete path and extract its parameters.
    pub fn extract(&self, path: &str) -> Option<RouteParams> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = RouteParams::new();

        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Static(expected) => {
                    if parts.get(index) != Some(&expected.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.get(index)?;
                    params.insert(name.clone(), value.to_string());
                }
                Segment::CatchAll(name) => {
                    params.insert(name.clone(), parts[index.min(parts.len())..].join("/"));
                    return Some(params);
                }
            }
        }

        if parts.len() == self.segments.len() {
            Some(params)
        } else {
            None
        }
    }

    /// Whether a concrete path matches.
    pub fn matches(&self, path: &str) -> bool {
        self.extract(path).is_some()
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Extract parameters of `path` under `pattern`, empty if it does not match.
pub fn extract_params(pattern: &str, path: &str) -> RouteParams {
    RoutePattern::parse(pattern).extract(path).unwrap_or_default()
}

/// Per-route prerender options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Cache tags applied to every path this route produces.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A route to prerender.
#[derive(Clone)]
pub struct RouteEntry {
    /// Route pattern.
    pub path: String,
    /// Component identifier handed to the renderer.
    pub component: String,
    /// Prerender options.
    pub config: RouteConfig,
    /// Expands a dynamic pattern into concrete paths.
    pub static_paths: Option<Arc<dyn StaticPathsGenerator>>,
}

impl RouteEntry {
    /// Create a route entry.
    pub fn new(path: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            component: component.into(),
            config: RouteConfig::default(),
            static_paths: None,
        }
    }

    /// Set the prerender options.
    pub fn with_config(mut self, config: RouteConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a cache tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.config.tags.push(tag.into());
        self
    }

    /// Attach a static path generator.
    pub fn with_static_paths(mut self, generator: impl StaticPathsGenerator + 'static) -> Self {
        self.static_paths = Some(Arc::new(generator));
        self
    }

    /// Parsed pattern.
    pub fn pattern(&self) -> RoutePattern {
        RoutePattern::parse(&self.path)
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("path", &self.path)
            .field("component", &self.component)
            .field("config", &self.config)
            .field("static_paths", &self.static_paths.is_some())
            .finish()
    }
}
