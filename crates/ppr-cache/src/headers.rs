//! Response headers and conditional request handling for shells.

use chrono::{DateTime, Utc};
use http::header::{
    HeaderMap, HeaderName, HeaderValue, CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE,
    IF_NONE_MATCH, LAST_MODIFIED, VARY,
};
use http::{Response, StatusCode};
use ppr_core::StaticShell;

use crate::config::{CacheStrategy, EdgeCacheConfig};

/// Header names emitted alongside a shell.
pub mod header_names {
    /// RFC 3339 build time of the served shell.
    pub const X_PPR_SHELL_TIME: &str = "x-ppr-shell-time";
    /// Number of dynamic boundaries in the served shell.
    pub const X_PPR_BOUNDARIES: &str = "x-ppr-boundaries";
}

/// `Vary` value for shell responses.
pub const VARY_VALUE: &str = "Accept-Encoding, Cookie";

/// Content type for shell responses.
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Timing directives for `Cache-Control`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheControlOptions {
    /// `max-age` in seconds.
    pub max_age: u64,
    /// `stale-while-revalidate` in seconds.
    pub stale_while_revalidate: u64,
    /// `stale-if-error` in seconds.
    pub stale_if_error: Option<u64>,
}

impl From<&EdgeCacheConfig> for CacheControlOptions {
    fn from(config: &EdgeCacheConfig) -> Self {
        Self {
            max_age: config.max_age_secs,
            stale_while_revalidate: config.stale_while_revalidate_secs,
            stale_if_error: config.stale_if_error_secs,
        }
    }
}

/// Build the `Cache-Control` value for a strategy.
pub fn cache_control_header(strategy: CacheStrategy, options: &CacheControlOptions) -> String {
    let mut parts = vec!["public".to_string()];

    match strategy {
        CacheStrategy::StaleWhileRevalidate => {
            parts.push(format!("max-age={}", options.max_age));
            parts.push(format!(
                "stale-while-revalidate={}",
                options.stale_while_revalidate
            ));
            if let Some(sie) = options.stale_if_error {
                parts.push(format!("stale-if-error={}", sie));
            }
        }
        CacheStrategy::CacheFirst => {
            parts.push(format!("max-age={}", options.max_age));
        }
        CacheStrategy::NetworkFirst => {
            parts.push("no-cache".to_string());
        }
        CacheStrategy::CacheOnly => {
            parts.push(format!("max-age={}", options.max_age));
            parts.push("immutable".to_string());
        }
    }

    parts.join(", ")
}

/// Quoted ETag for a shell.
pub fn etag_header(shell: &StaticShell) -> String {
    format!("\"{}\"", shell.content_hash)
}

/// HTTP-date for `Last-Modified`.
pub fn http_date(time: &DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: String) {
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(name, value);
    }
}

fn validator_headers(shell: &StaticShell, config: &EdgeCacheConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert(
        &mut headers,
        CACHE_CONTROL,
        cache_control_header(config.strategy, &config.into()),
    );
    insert(&mut headers, ETAG, etag_header(shell));
    headers.insert(VARY, HeaderValue::from_static(VARY_VALUE));
    insert(&mut headers, LAST_MODIFIED, http_date(&shell.build_time));
    headers
}

/// Full header set for serving a shell.
pub fn shell_headers(shell: &StaticShell, config: &EdgeCacheConfig) -> HeaderMap {
    let mut headers = validator_headers(shell, config);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE));
    insert(
        &mut headers,
        HeaderName::from_static(header_names::X_PPR_SHELL_TIME),
        shell.build_time.to_rfc3339(),
    );
    insert(
        &mut headers,
        HeaderName::from_static(header_names::X_PPR_BOUNDARIES),
        shell.boundary_count().to_string(),
    );
    headers
}

/// Validators carried by a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionalRequest {
    /// Raw `If-None-Match` value.
    pub if_none_match: Option<String>,
    /// Parsed `If-Modified-Since`. Unparseable dates are ignored.
    pub if_modified_since: Option<DateTime<Utc>>,
}

impl ConditionalRequest {
    /// Extract validators from request headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let if_none_match = headers
            .get(IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let if_modified_since = headers
            .get(IF_MODIFIED_SINCE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v.trim()).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Self {
            if_none_match,
            if_modified_since,
        }
    }

    /// Whether the client's copy of `shell` is current.
    ///
    /// `If-None-Match` wins when present; `If-Modified-Since` is only
    /// consulted without it.
    pub fn is_not_modified(&self, shell: &StaticShell) -> bool {
        if let Some(inm) = &self.if_none_match {
            return etag_matches(inm, &shell.content_hash);
        }

        match self.if_modified_since {
            // HTTP dates have one-second resolution.
            Some(since) => shell.build_time.timestamp() <= since.timestamp(),
            None => false,
        }
    }
}

/// Weak comparison of an `If-None-Match` list against a content hash.
fn etag_matches(if_none_match: &str, hash: &str) -> bool {
    if_none_match.split(',').map(str::trim).any(|tag| {
        if tag == "*" {
            return true;
        }
        let tag = tag.strip_prefix("W/").unwrap_or(tag);
        tag.trim_matches('"') == hash
    })
}

/// Decide whether a request for `shell` should get a 304.
pub fn should_return_304(request: &HeaderMap, shell: &StaticShell) -> bool {
    ConditionalRequest::from_headers(request).is_not_modified(shell)
}

/// Build an empty 304 response carrying the shell's validators.
pub fn not_modified_response(
    shell: &StaticShell,
    config: &EdgeCacheConfig,
) -> http::Result<Response<()>> {
    let mut builder = Response::builder().status(StatusCode::NOT_MODIFIED);
    if let Some(headers) = builder.headers_mut() {
        headers.extend(validator_headers(shell, config));
    }
    builder.body(())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use ppr_core::{DynamicBoundaryMetadata, ShellAssets};

    use super::*;

    fn shell_with_hash(hash: &str) -> StaticShell {
        let mut shell = StaticShell::new(
            "/p",
            "<p></p>",
            vec![DynamicBoundaryMetadata::new("a")],
            ShellAssets::default(),
        );
        shell.content_hash = hash.to_string();
        shell
    }

    fn request(name: HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    // === Cache-Control Tests ===

    #[test]
    fn test_cache_control_per_strategy() {
        let opts = CacheControlOptions {
            max_age: 60,
            stale_while_revalidate: 300,
            stale_if_error: Some(86400),
        };

        assert_eq!(
            cache_control_header(CacheStrategy::StaleWhileRevalidate, &opts),
            "public, max-age=60, stale-while-revalidate=300, stale-if-error=86400"
        );
        assert_eq!(
            cache_control_header(CacheStrategy::CacheFirst, &opts),
            "public, max-age=60"
        );
        assert_eq!(
            cache_control_header(CacheStrategy::NetworkFirst, &opts),
            "public, no-cache"
        );
        assert_eq!(
            cache_control_header(CacheStrategy::CacheOnly, &opts),
            "public, max-age=60, immutable"
        );
    }

    #[test]
    fn test_shell_headers() {
        let shell = shell_with_hash("abc123");
        let headers = shell_headers(&shell, &EdgeCacheConfig::default());

        assert_eq!(headers[ETAG], "\"abc123\"");
        assert_eq!(headers[VARY], "Accept-Encoding, Cookie");
        assert_eq!(headers[header_names::X_PPR_BOUNDARIES], "1");
        assert!(headers.contains_key(header_names::X_PPR_SHELL_TIME));
        assert!(headers[LAST_MODIFIED].to_str().unwrap().ends_with("GMT"));
    }

    // === Conditional Request Tests ===

    #[test]
    fn test_etag_round_trip() {
        let shell = shell_with_hash("abc123");
        assert_eq!(etag_header(&shell), "\"abc123\"");

        assert!(should_return_304(&request(IF_NONE_MATCH, "\"abc123\""), &shell));
        assert!(!should_return_304(&request(IF_NONE_MATCH, "\"zzz\""), &shell));
    }

    #[test]
    fn test_if_none_match_variants() {
        let shell = shell_with_hash("abc123");
        assert!(should_return_304(&request(IF_NONE_MATCH, "W/\"abc123\""), &shell));
        assert!(should_return_304(&request(IF_NONE_MATCH, "\"x\", \"abc123\""), &shell));
        assert!(should_return_304(&request(IF_NONE_MATCH, "*"), &shell));
    }

    #[test]
    fn test_if_modified_since() {
        let shell = shell_with_hash("abc123");
        let later = http_date(&(shell.build_time + Duration::seconds(5)));
        let earlier = http_date(&(shell.build_time - Duration::seconds(5)));
        let same = http_date(&shell.build_time);

        assert!(should_return_304(&request(IF_MODIFIED_SINCE, &later), &shell));
        assert!(should_return_304(&request(IF_MODIFIED_SINCE, &same), &shell));
        assert!(!should_return_304(&request(IF_MODIFIED_SINCE, &earlier), &shell));
        assert!(!should_return_304(&request(IF_MODIFIED_SINCE, "not a date"), &shell));
    }

    #[test]
    fn test_if_none_match_takes_precedence() {
        let shell = shell_with_hash("abc123");
        let mut headers = request(IF_NONE_MATCH, "\"other\"");
        let later = http_date(&(shell.build_time + Duration::seconds(5)));
        headers.insert(IF_MODIFIED_SINCE, HeaderValue::from_str(&later).unwrap());

        assert!(!should_return_304(&headers, &shell));
    }

    #[test]
    fn test_not_modified_response() {
        let shell = shell_with_hash("abc123");
        let response = not_modified_response(&shell, &EdgeCacheConfig::default()).unwrap();

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(response.headers()[ETAG], "\"abc123\"");
        assert!(response.headers().contains_key(CACHE_CONTROL));
        assert!(!response.headers().contains_key(CONTENT_TYPE));
    }
}
