//! Non-streamed responses for clients that cannot consume a streamed body.

use std::collections::HashMap;
use std::time::Instant;

use http::header::{HeaderMap, ACCEPT};
use ppr_core::{inject_resolutions, PprResult, QueryParams, RequestContext, WorkerPool};
use tracing::{debug, warn};

use crate::controller::{ShellStream, StreamController};
use crate::head::closing_markup;
use crate::runtime::ERROR_FRAGMENT;

/// Request header that disables streaming when set to `0`.
pub const STREAM_HEADER: &str = "x-ppr-stream";

/// Query parameter that disables streaming when set to `0`.
pub const STREAM_QUERY_PARAM: &str = "ppr_stream";

fn is_disabled(flag: Option<&str>) -> bool {
    matches!(flag.map(str::trim), Some("0") | Some("false"))
}

fn streaming_allowed(accept: Option<&str>, header: Option<&str>, query: Option<&str>) -> bool {
    if is_disabled(header) || is_disabled(query) {
        return false;
    }
    accept.is_some_and(|accept| {
        accept
            .split(',')
            .map(|part| part.split(';').next().unwrap_or_default().trim())
            .any(|media| media.eq_ignore_ascii_case("text/html") || media == "*/*")
    })
}

/// Whether a client can consume a streamed HTML body.
///
/// False when `Accept` does not admit `text/html`, or when streaming is
/// disabled with `X-PPR-Stream: 0` or `?ppr_stream=0`.
pub fn supports_streaming(headers: &HeaderMap, query: &QueryParams) -> bool {
    streaming_allowed(
        headers.get(ACCEPT).and_then(|v| v.to_str().ok()),
        headers.get(STREAM_HEADER).and_then(|v| v.to_str().ok()),
        query.get(STREAM_QUERY_PARAM).map(String::as_str),
    )
}

/// Response body chosen for a request.
pub enum StreamResponse {
    /// Chunked body.
    Streamed(ShellStream),
    /// Fully resolved document.
    Complete(String),
}

impl StreamController {
    /// Resolve every boundary up front and return one complete document.
    ///
    /// Failed boundaries get the error fragment; with `abort_on_error` the
    /// boundaries left unresolved keep their fallback content.
    pub async fn render_complete(&self) -> PprResult<String> {
        self.mark_started()?;
        let started = Instant::now();
        let mut resolved = HashMap::new();

        for (_, group) in self.shell.priority_groups() {
            if self.is_aborted() {
                break;
            }

            let mut pool = WorkerPool::new(self.config.concurrency);
            for boundary in group {
                pool.push(self.resolve(boundary));
            }

            loop {
                if !self.is_aborted() {
                    pool.fill();
                }
                let Some(settled) = pool.next_settled().await else {
                    break;
                };
                if self.is_aborted() {
                    continue;
                }

                self.record(&settled);
                let markup = match &settled.error {
                    None => settled.resolution.html,
                    Some(error) => {
                        warn!(boundary = %settled.resolution.id, error = %error, "Boundary failed");
                        if self.config.abort_on_error {
                            self.abort();
                        }
                        ERROR_FRAGMENT.to_string()
                    }
                };
                resolved.insert(settled.resolution.id, markup);
            }
        }

        let mut html = self.head.render_opening(&self.shell.assets);
        html.push_str(&inject_resolutions(&self.shell.html, &resolved));
        html.push_str(closing_markup());

        self.finish(started.elapsed());
        debug!(path = %self.shell.path, resolved = resolved.len(), "Rendered complete document");
        Ok(html)
    }

    /// Stream when the client supports it, otherwise render the whole
    /// document.
    pub async fn respond(&self) -> PprResult<StreamResponse> {
        if request_supports_streaming(&self.request) {
            Ok(StreamResponse::Streamed(self.create_stream()?))
        } else {
            Ok(StreamResponse::Complete(self.render_complete().await?))
        }
    }
}

/// [`supports_streaming`] over a request context.
pub fn request_supports_streaming(request: &RequestContext) -> bool {
    streaming_allowed(
        request.header("accept"),
        request.header(STREAM_HEADER),
        request.query_param(STREAM_QUERY_PARAM),
    )
}
