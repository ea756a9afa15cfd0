//! Build output index.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shell::{content_hash, StaticShell};

/// File name of the manifest inside a build output directory.
pub const MANIFEST_FILE: &str = "ppr-manifest.json";

/// Suffix of the raw shell markup file.
pub const SHELL_HTML_SUFFIX: &str = ".shell.html";

/// Suffix of the shell metadata file.
pub const SHELL_JSON_SUFFIX: &str = ".shell.json";

/// Manifest entry for one prerendered path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// Shell markup file, relative to the output directory.
    pub shell_file: String,
    /// Number of dynamic boundaries.
    pub boundary_count: usize,
    /// Content hash of the shell markup.
    pub content_hash: String,
}

/// Index of every shell produced by a build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PprManifest {
    /// When the build ran.
    pub build_time: DateTime<Utc>,
    /// Engine version that produced the build.
    pub version: String,
    /// Public base URL the shells were built for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Path to entry.
    pub routes: BTreeMap<String, ManifestEntry>,
}

impl PprManifest {
    /// Create an empty manifest stamped with the current time.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            build_time: Utc::now(),
            version: version.into(),
            base_url: None,
            routes: BTreeMap::new(),
        }
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }

    /// Build a manifest from a set of shells.
    pub fn from_shells<'a>(
        version: impl Into<String>,
        shells: impl IntoIterator<Item = &'a StaticShell>,
    ) -> Self {
        let mut manifest = Self::new(version);
        for shell in shells {
            manifest.insert(shell);
        }
        manifest
    }

    /// Record a shell.
    pub fn insert(&mut self, shell: &StaticShell) {
        self.routes.insert(
            shell.path.clone(),
            ManifestEntry {
                shell_file: shell_file_name(&shell.path),
                boundary_count: shell.boundary_count(),
                content_hash: shell.content_hash.clone(),
            },
        );
    }

    /// Look up a path.
    pub fn get(&self, path: &str) -> Option<&ManifestEntry> {
        self.routes.get(path)
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the manifest is empty.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Total boundaries across every route.
    pub fn total_boundaries(&self) -> usize {
        self.routes.values().map(|e| e.boundary_count).sum()
    }
}

/// Relative file stem for a route path (`/` maps to `index`).
///
/// Plain paths such as `/blog/post` keep a readable stem. Any path the
/// readable form cannot reproduce exactly (trailing slash, query, `..`
/// segments, a literal `/index`) gets a suffix from the hash of the raw path
/// so that distinct paths never share a file.
pub fn shell_file_stem(path: &str) -> String {
    let trimmed = path
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_matches('/');

    let readable = trimmed
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect::<Vec<_>>()
        .join("/");

    if path == "/" {
        return "index".to_string();
    }
    if !readable.is_empty() && readable != "index" && path == format!("/{}", readable) {
        return readable;
    }

    let base = if readable.is_empty() { "index" } else { readable.as_str() };
    format!("{}-{}", base, &content_hash(path)[..8])
}

/// Relative shell markup file name for a route path.
pub fn shell_file_name(path: &str) -> String {
    format!("{}{}", shell_file_stem(path), SHELL_HTML_SUFFIX)
}

/// Relative shell metadata file name for a route path.
pub fn shell_meta_file_name(path: &str) -> String {
    format!("{}{}", shell_file_stem(path), SHELL_JSON_SUFFIX)
}
