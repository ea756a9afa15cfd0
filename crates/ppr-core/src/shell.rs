//! Static shells and their dynamic boundary table.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{PprError, PprResult};
use crate::markers::{end_marker, scan_markers, start_marker, MarkerType};

/// What kind of dynamic content a boundary holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryKind {
    /// Request-time data (cookies, headers, live prices).
    #[default]
    Dynamic,
    /// A suspended subtree waiting on async data.
    Suspense,
    /// Per-user content that must never be shared between requests.
    Personalized,
}

/// Metadata describing one dynamic boundary inside a shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicBoundaryMetadata {
    /// Boundary id, unique within a shell.
    pub id: String,
    /// Kind of content.
    #[serde(default)]
    pub kind: BoundaryKind,
    /// Higher priorities resolve first.
    #[serde(default)]
    pub priority: i32,
    /// Data sources the boundary reads.
    #[serde(default)]
    pub data_dependencies: Vec<String>,
    /// Start marker comment as it appears in the shell markup.
    pub start_marker: String,
    /// End marker comment as it appears in the shell markup.
    pub end_marker: String,
}

impl DynamicBoundaryMetadata {
    /// Create metadata for a boundary with default kind and priority.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            start_marker: start_marker(&id),
            end_marker: end_marker(&id),
            id,
            kind: BoundaryKind::default(),
            priority: 0,
            data_dependencies: Vec::new(),
        }
    }

    /// Set the boundary kind.
    pub fn with_kind(mut self, kind: BoundaryKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Add a data dependency.
    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        self.data_dependencies.push(dependency.into());
        self
    }
}

/// Assets needed to render the document head before any boundary resolves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellAssets {
    /// Stylesheet URLs.
    #[serde(default)]
    pub css: Vec<String>,
    /// Script URLs.
    #[serde(default)]
    pub js: Vec<String>,
    /// Font URLs.
    #[serde(default)]
    pub fonts: Vec<String>,
    /// Critical CSS inlined into the head.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_css: Option<String>,
}

impl ShellAssets {
    /// Add a stylesheet.
    pub fn with_css(mut self, href: impl Into<String>) -> Self {
        self.css.push(href.into());
        self
    }

    /// Add a script.
    pub fn with_js(mut self, src: impl Into<String>) -> Self {
        self.js.push(src.into());
        self
    }

    /// Add a font.
    pub fn with_font(mut self, href: impl Into<String>) -> Self {
        self.fonts.push(href.into());
        self
    }

    /// Set inline critical CSS.
    pub fn with_inline_css(mut self, css: impl Into<String>) -> Self {
        self.inline_css = Some(css.into());
        self
    }
}

/// Ordered boundary table keyed by boundary id.
pub type BoundaryMap = IndexMap<String, DynamicBoundaryMetadata>;

/// Serde adapter writing a [`BoundaryMap`] as an ordered list of `[id, metadata]` pairs.
pub mod boundary_pairs {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{BoundaryMap, DynamicBoundaryMetadata};

    pub fn serialize<S: Serializer>(map: &BoundaryMap, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(map.len()))?;
        for pair in map {
            seq.serialize_element(&pair)?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BoundaryMap, D::Error> {
        let pairs: Vec<(String, DynamicBoundaryMetadata)> = Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

/// Prerendered markup for one route plus its dynamic boundary table.
///
/// Shells are immutable: a rebuild or revalidation produces a new shell that
/// replaces the cached one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticShell {
    /// Route path this shell serves.
    pub path: String,
    /// Markup containing the boundary markers.
    pub html: String,
    /// Boundary table in document order.
    #[serde(with = "boundary_pairs")]
    pub boundaries: BoundaryMap,
    /// When the shell was produced.
    pub build_time: DateTime<Utc>,
    /// Hash of `html`, used as the ETag.
    pub content_hash: String,
    /// Head assets.
    #[serde(default)]
    pub assets: ShellAssets,
}

impl StaticShell {
    /// Create a shell stamped with the current time.
    pub fn new(
        path: impl Into<String>,
        html: impl Into<String>,
        boundaries: impl IntoIterator<Item = DynamicBoundaryMetadata>,
        assets: ShellAssets,
    ) -> Self {
        let html = html.into();
        Self {
            path: path.into(),
            content_hash: content_hash(&html),
            html,
            boundaries: boundaries.into_iter().map(|b| (b.id.clone(), b)).collect(),
            build_time: Utc::now(),
            assets,
        }
    }

    /// Override the build timestamp.
    pub fn with_build_time(mut self, build_time: DateTime<Utc>) -> Self {
        self.build_time = build_time;
        self
    }

    /// Look up a boundary by id.
    pub fn boundary(&self, id: &str) -> Option<&DynamicBoundaryMetadata> {
        self.boundaries.get(id)
    }

    /// Number of dynamic boundaries.
    pub fn boundary_count(&self) -> usize {
        self.boundaries.len()
    }

    /// Time elapsed since the shell was built.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.build_time).to_std().unwrap_or(Duration::ZERO)
    }

    /// Approximate serialized size in bytes.
    pub fn approximate_size(&self) -> usize {
        serde_json::to_vec(self)
            .map(|bytes| bytes.len())
            .unwrap_or(self.html.len())
    }

    /// Boundaries grouped by priority, highest first.
    ///
    /// Within a group boundaries keep document order.
    pub fn priority_groups(&self) -> Vec<(i32, Vec<&DynamicBoundaryMetadata>)> {
        let mut groups: Vec<(i32, Vec<&DynamicBoundaryMetadata>)> = Vec::new();
        for boundary in self.boundaries.values() {
            match groups.iter_mut().find(|(p, _)| *p == boundary.priority) {
                Some((_, members)) => members.push(boundary),
                None => groups.push((boundary.priority, vec![boundary])),
            }
        }
        groups.sort_by(|a, b| b.0.cmp(&a.0));
        groups
    }

    /// Check that markers in `html` and entries in `boundaries` correspond one-to-one.
    pub fn validate(&self) -> PprResult<()> {
        let mut starts = HashSet::new();
        let mut ends = HashSet::new();

        for marker in scan_markers(&self.html) {
            match marker.kind {
                MarkerType::Start => {
                    if !starts.insert(marker.id.clone()) {
                        return Err(self.mismatch(format!("duplicate start marker '{}'", marker.id)));
                    }
                }
                MarkerType::End => {
                    ends.insert(marker.id);
                }
                MarkerType::Fallback | MarkerType::FallbackEnd => {}
            }
        }

        for id in &starts {
            if !ends.contains(id) {
                return Err(self.mismatch(format!("missing end marker for '{}'", id)));
            }
            if !self.boundaries.contains_key(id) {
                return Err(self.mismatch(format!("marker '{}' has no boundary entry", id)));
            }
        }

        if let Some(id) = ends.iter().find(|id| !starts.contains(*id)) {
            return Err(self.mismatch(format!("end marker '{}' without start", id)));
        }

        if let Some(id) = self.boundaries.keys().find(|id| !starts.contains(*id)) {
            return Err(self.mismatch(format!("boundary '{}' has no markers", id)));
        }

        Ok(())
    }

    fn mismatch(&self, detail: String) -> PprError {
        PprError::MarkerMismatch {
            path: self.path.clone(),
            detail,
        }
    }
}

/// Hash of shell markup: the first 16 hex chars of its SHA-256 digest.
pub fn content_hash(html: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(html.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

/// Request-time result of resolving one boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryResolution {
    /// Boundary id.
    pub id: String,
    /// Resolved markup (empty when failed).
    pub html: String,
    /// Failure message.
    pub error: Option<String>,
}

impl BoundaryResolution {
    /// A successful resolution.
    pub fn resolved(id: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            html: html.into(),
            error: None,
        }
    }

    /// A failed resolution.
    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            html: String::new(),
            error: Some(error.into()),
        }
    }

    /// Whether the boundary failed.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::wrap_boundary;

    fn sample_shell() -> StaticShell {
        let html = format!(
            "<main>{}{}</main>",
            wrap_boundary("cart", Some("<i>…</i>")),
            wrap_boundary("recs", None)
        );
        StaticShell::new(
            "/products/1",
            html,
            vec![
                DynamicBoundaryMetadata::new("cart").with_priority(10),
                DynamicBoundaryMetadata::new("recs").with_priority(1),
            ],
            ShellAssets::default().with_css("/app.css"),
        )
    }

    // === Construction Tests ===

    #[test]
    fn test_shell_new_computes_hash() {
        let shell = sample_shell();
        assert_eq!(shell.content_hash, content_hash(&shell.html));
        assert_eq!(shell.content_hash.len(), 16);
        assert_eq!(shell.boundary_count(), 2);
    }

    #[test]
    fn test_content_hash_changes_with_markup() {
        assert_ne!(content_hash("<p>a</p>"), content_hash("<p>b</p>"));
        assert_eq!(content_hash("<p>a</p>"), content_hash("<p>a</p>"));
    }

    #[test]
    fn test_boundary_metadata_markers() {
        let meta = DynamicBoundaryMetadata::new("x");
        assert_eq!(meta.start_marker, "<!--ppr:start:x-->");
        assert_eq!(meta.end_marker, "<!--ppr:end:x-->");
        assert_eq!(meta.kind, BoundaryKind::Dynamic);
    }

    #[test]
    fn test_age_uses_build_time() {
        let shell = sample_shell().with_build_time(Utc::now() - chrono::Duration::seconds(120));
        assert!(shell.age() >= Duration::from_secs(119));
    }

    // === Validation Tests ===

    #[test]
    fn test_validate_accepts_matching_markers() {
        assert!(sample_shell().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_entry() {
        let shell = StaticShell::new("/", wrap_boundary("a", None), vec![], ShellAssets::default());
        assert!(matches!(shell.validate(), Err(PprError::MarkerMismatch { .. })));
    }

    #[test]
    fn test_validate_rejects_orphan_entry() {
        let shell = StaticShell::new(
            "/",
            "<p>static</p>",
            vec![DynamicBoundaryMetadata::new("ghost")],
            ShellAssets::default(),
        );
        assert!(shell.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unclosed_marker() {
        let shell = StaticShell::new(
            "/",
            start_marker("a"),
            vec![DynamicBoundaryMetadata::new("a")],
            ShellAssets::default(),
        );
        assert!(shell.validate().is_err());
    }

    // === Grouping Tests ===

    #[test]
    fn test_priority_groups_descending() {
        let html = ["a", "b", "c", "d"].iter().map(|id| wrap_boundary(id, None)).collect::<String>();
        let shell = StaticShell::new(
            "/",
            html,
            vec![
                DynamicBoundaryMetadata::new("a").with_priority(1),
                DynamicBoundaryMetadata::new("b").with_priority(5),
                DynamicBoundaryMetadata::new("c").with_priority(1),
                DynamicBoundaryMetadata::new("d").with_priority(5),
            ],
            ShellAssets::default(),
        );

        let groups = shell.priority_groups();
        let flat: Vec<(i32, Vec<&str>)> = groups
            .iter()
            .map(|(p, members)| (*p, members.iter().map(|m| m.id.as_str()).collect()))
            .collect();

        assert_eq!(flat, vec![(5, vec!["b", "d"]), (1, vec!["a", "c"])]);
    }

    // === Serialization Tests ===

    #[test]
    fn test_boundaries_serialize_as_pairs() {
        let shell = sample_shell();
        let value = serde_json::to_value(&shell).unwrap();

        let boundaries = value["boundaries"].as_array().unwrap();
        assert_eq!(boundaries.len(), 2);
        assert_eq!(boundaries[0][0], "cart");
        assert_eq!(boundaries[0][1]["priority"], 10);
        assert!(value.get("buildTime").is_some());
        assert!(value.get("contentHash").is_some());

        let restored: StaticShell = serde_json::from_value(value).unwrap();
        assert_eq!(restored, shell);
        assert_eq!(restored.boundaries.keys().collect::<Vec<_>>(), vec!["cart", "recs"]);
    }

    #[test]
    fn test_boundary_resolution_constructors() {
        assert!(!BoundaryResolution::resolved("a", "<p/>").is_error());
        let failed = BoundaryResolution::failed("a", "boom");
        assert!(failed.is_error());
        assert!(failed.html.is_empty());
    }
}
