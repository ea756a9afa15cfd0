//! Boundary placeholder protocol.
//!
//! Dynamic regions are delimited in shell markup by HTML comments:
//!
//! ```text
//! <!--ppr:start:cart-->
//! <!--ppr:fallback:cart--><div class="skeleton"></div><!--ppr:fallback-end:cart-->
//! <!--ppr:end:cart-->
//! ```

use std::collections::HashMap;

/// Prefix shared by every marker comment body.
pub const MARKER_PREFIX: &str = "ppr:";

/// Attribute carried by the element that wraps a boundary once markers are stripped.
pub const BOUNDARY_ATTR: &str = "data-ppr-id";

/// Kind of placeholder marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerType {
    /// Opens a dynamic region.
    Start,
    /// Closes a dynamic region.
    End,
    /// Opens the fallback content of a region.
    Fallback,
    /// Closes the fallback content of a region.
    FallbackEnd,
}

impl MarkerType {
    /// Marker keyword as it appears in the comment body.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
            Self::Fallback => "fallback",
            Self::FallbackEnd => "fallback-end",
        }
    }
}

/// A parsed placeholder marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    /// Marker kind.
    pub kind: MarkerType,
    /// Boundary id the marker belongs to.
    pub id: String,
}

fn marker(kind: MarkerType, id: &str) -> String {
    format!("<!--{}{}:{}-->", MARKER_PREFIX, kind.as_str(), id)
}

/// Comment opening a boundary.
pub fn start_marker(id: &str) -> String {
    marker(MarkerType::Start, id)
}

/// Comment closing a boundary.
pub fn end_marker(id: &str) -> String {
    marker(MarkerType::End, id)
}

/// Comment opening a boundary's fallback content.
pub fn fallback_marker(id: &str) -> String {
    marker(MarkerType::Fallback, id)
}

/// Comment closing a boundary's fallback content.
pub fn fallback_end_marker(id: &str) -> String {
    marker(MarkerType::FallbackEnd, id)
}

/// Wrap a boundary's placeholder in start/end markers with optional fallback markup.
pub fn wrap_boundary(id: &str, fallback: Option<&str>) -> String {
    let mut html = start_marker(id);
    if let Some(fallback) = fallback {
        html.push_str(&fallback_marker(id));
        html.push_str(fallback);
        html.push_str(&fallback_end_marker(id));
    }
    html.push_str(&end_marker(id));
    html
}

/// Parse a comment body (the text between `<!--` and `-->`) into a marker.
///
/// Returns `None` for any comment that is not part of the protocol.
pub fn parse_marker(body: &str) -> Option<Marker> {
    let rest = body.trim().strip_prefix(MARKER_PREFIX)?;
    let (kind, id) = rest.split_once(':')?;

    let kind = match kind {
        "start" => MarkerType::Start,
        "end" => MarkerType::End,
        "fallback" => MarkerType::Fallback,
        "fallback-end" => MarkerType::FallbackEnd,
        _ => return None,
    };

    if id.is_empty() {
        return None;
    }

    Some(Marker {
        kind,
        id: id.to_string(),
    })
}

/// Iterate over `(open, close, body)` for every comment in `html`.
///
/// `open` is the index of `<!--`, `close` the index just past `-->`.
fn comments(html: &str) -> impl Iterator<Item = (usize, usize, &str)> + '_ {
    let mut pos = 0;
    std::iter::from_fn(move || {
        let open = html[pos..].find("<!--")? + pos;
        let body_start = open + 4;
        let body_end = html[body_start..].find("-->")? + body_start;
        pos = body_end + 3;
        Some((open, pos, &html[body_start..body_end]))
    })
}

/// Collect every protocol marker in document order.
pub fn scan_markers(html: &str) -> Vec<Marker> {
    comments(html)
        .filter_map(|(_, _, body)| parse_marker(body))
        .collect()
}

/// Opening tag of the element that replaces a start marker.
pub fn boundary_open_tag(id: &str) -> String {
    format!(r#"<div {}="{}">"#, BOUNDARY_ATTR, escape_attr(id))
}

/// Rewrite shell markup for streaming.
///
/// Start/end markers become a wrapper element addressable by boundary id.
/// Fallback markers are dropped while the fallback content stays in place,
/// so it is what the client paints until the boundary resolves.
pub fn prepare_streaming_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len() + 64);
    let mut last = 0;

    for (open, close, body) in comments(html) {
        let Some(marker) = parse_marker(body) else {
            continue;
        };

        out.push_str(&html[last..open]);
        match marker.kind {
            MarkerType::Start => out.push_str(&boundary_open_tag(&marker.id)),
            MarkerType::End => out.push_str("</div>"),
            MarkerType::Fallback | MarkerType::FallbackEnd => {}
        }
        last = close;
    }

    out.push_str(&html[last..]);
    out
}

/// Replace every resolved boundary's region (fallback included) with its markup.
///
/// Boundaries missing from `resolved` are rendered as in
/// [`prepare_streaming_html`], keeping their fallback content.
pub fn inject_resolutions(html: &str, resolved: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    let mut skipping: Option<String> = None;

    for (open, close, body) in comments(html) {
        let Some(marker) = parse_marker(body) else {
            continue;
        };

        if let Some(id) = &skipping {
            if marker.kind == MarkerType::End && &marker.id == id {
                out.push_str("</div>");
                skipping = None;
                last = close;
            }
            continue;
        }

        out.push_str(&html[last..open]);
        match marker.kind {
            MarkerType::Start => {
                out.push_str(&boundary_open_tag(&marker.id));
                if let Some(markup) = resolved.get(&marker.id) {
                    out.push_str(markup);
                    skipping = Some(marker.id);
                }
            }
            MarkerType::End => out.push_str("</div>"),
            MarkerType::Fallback | MarkerType::FallbackEnd => {}
        }
        last = close;
    }

    if skipping.is_none() {
        out.push_str(&html[last..]);
    }
    out
}

/// Escape a value for use inside a double-quoted HTML attribute.
pub fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
