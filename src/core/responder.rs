//! Upstream response to client response
//!
//! Status is passed through verbatim so 206 partial content reaches the client
//! unchanged. GET bodies are forwarded chunk by chunk as they arrive; HEAD
//! responses never poll the upstream body.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::StreamExt;
use std::io;
use tracing::{debug, warn};

use super::fetcher::{FetchMethod, UpstreamResponse};
use super::lifetime::RequestLifetime;

const DEFAULT_DOWNLOAD_NAME: &str = "recording";

fn sanitize_download_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        DEFAULT_DOWNLOAD_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

fn response_headers(upstream: &UpstreamResponse, download_name: &str) -> HeaderMap {
    let source = upstream.response.headers();
    let format = upstream.candidate.format;
    let mut headers = HeaderMap::new();

    let content_type = source
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(format.content_type()));
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    let disposition = format!(
        "inline; filename=\"{}.{}\"",
        sanitize_download_name(download_name),
        format.extension()
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    for name in [header::CONTENT_RANGE, header::CONTENT_LENGTH] {
        if let Some(value) = source.get(&name) {
            headers.insert(name, value.clone());
        }
    }
    headers
}

/// Build the client response for the winning upstream response
///
/// The request's cancellation guard moves into the body stream, so a client
/// that disconnects mid-body drops the stream, which cancels the token and
/// drops the upstream response with it.
pub fn respond(
    upstream: UpstreamResponse,
    method: FetchMethod,
    lifetime: RequestLifetime,
    download_name: &str,
) -> Response {
    let status = upstream.response.status();
    let headers = response_headers(&upstream, download_name);

    if method == FetchMethod::Head {
        debug!(status = %status, "HEAD request, upstream body left unopened");
        drop(upstream);
        return (status, headers, Body::empty()).into_response();
    }

    let guard = lifetime.into_guard();
    let candidate = upstream.candidate;
    let mut chunks = Box::pin(upstream.response.bytes_stream());

    let body = async_stream::stream! {
        let _guard = guard;
        while let Some(next) = chunks.next().await {
            match next {
                Ok(chunk) => yield Ok::<Bytes, io::Error>(chunk),
                Err(e) => {
                    warn!(candidate = %candidate, error = %e, "Upstream body failed mid-stream");
                    yield Err(io::Error::other(e));
                    break;
                }
            }
        }
    };

    (status, headers, Body::from_stream(body)).into_response()
}
