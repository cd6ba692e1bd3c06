//! Capability-token authenticated recording stream
//!
//! `GET|HEAD /stream-call-recording?token=<token>`
//!
//! The token names a recording, a call record or a provider call. It is
//! verified, resolved to upstream candidates, and the first upstream response
//! that works is streamed back with its status and range headers intact.

use axum::{
    extract::{RawQuery, State},
    http::{HeaderMap, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

use crate::auth::{self, now_millis};
use crate::core::{FetchMethod, FetchRequest, RequestLifetime, respond};
use crate::errors::{StreamError, StreamResult};
use crate::state::AppState;

/// Token from the `token` query parameter; blank counts as missing
fn token_from_query(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn fetch_method(method: &Method) -> FetchMethod {
    if method == Method::HEAD {
        FetchMethod::Head
    } else {
        FetchMethod::Get
    }
}

async fn stream_recording(
    state: &AppState,
    method: FetchMethod,
    headers: &HeaderMap,
    token: Option<String>,
) -> StreamResult<Response> {
    let token = token.ok_or(StreamError::MissingToken)?;
    let secret = state
        .config
        .signing_secret()
        .ok_or_else(|| StreamError::Configuration("stream token secret not configured".to_string()))?;

    let claims = auth::decode(&token, secret, now_millis())?.claims;
    debug!(
        recording_id = ?claims.recording_id(),
        call_id = ?claims.call_id(),
        provider_call_sid = ?claims.provider_call_sid(),
        "Stream token verified"
    );

    let credentials = state.provider.credentials();
    if credentials.is_empty() {
        return Err(StreamError::Configuration(
            "no provider credentials configured".to_string(),
        ));
    }

    let request = FetchRequest {
        method,
        range: headers.get(header::RANGE).cloned(),
    };

    // Dropping this future (client disconnect) drops the guard and cancels the token.
    let lifetime = RequestLifetime::new();
    let cancel = lifetime.token().clone();
    let located = async {
        let candidates = state.resolver().resolve(&claims, &cancel).await?;
        let upstream = state
            .fetcher
            .fetch(&candidates, credentials, &request, &cancel)
            .await?;
        Ok::<_, StreamError>(upstream)
    };

    let upstream = match tokio::time::timeout(state.config.request_timeout(), located).await {
        Ok(upstream) => upstream?,
        Err(_) => {
            cancel.cancel();
            return Err(StreamError::RequestTimeout);
        }
    };

    Ok(respond(upstream, method, lifetime, claims.display_id()))
}

fn log_failure(err: &StreamError) {
    let status = err.status_code();
    match err {
        StreamError::Cancelled => debug!("Client went away before the recording was located"),
        _ if status.is_server_error() => error!(status = %status, error = %err, "Recording stream failed"),
        _ => info!(status = %status, error = %err, "Recording stream rejected"),
    }
}

/// Stream a call recording authorized by a capability token
pub async fn stream_call_recording(
    State(state): State<Arc<AppState>>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("stream_recording", request_id = %request_id, method = %method);

    async move {
        let token = token_from_query(query.as_deref());
        match stream_recording(&state, fetch_method(&method), &headers, token).await {
            Ok(response) => {
                info!(status = %response.status(), "Streaming recording");
                response
            }
            Err(err) => {
                log_failure(&err);
                err.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

/// CORS preflight; the headers come from the router layer
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_from_query() {
        assert_eq!(token_from_query(Some("token=abc.def")).as_deref(), Some("abc.def"));
        assert_eq!(
            token_from_query(Some("x=1&token=a%2Bb.c")).as_deref(),
            Some("a+b.c")
        );
        assert_eq!(token_from_query(Some("token=")), None);
        assert_eq!(token_from_query(Some("token=%20%20")), None);
        assert_eq!(token_from_query(Some("other=1")), None);
        assert_eq!(token_from_query(None), None);
    }

    #[test]
    fn test_fetch_method() {
        assert_eq!(fetch_method(&Method::HEAD), FetchMethod::Head);
        assert_eq!(fetch_method(&Method::GET), FetchMethod::Get);
    }
}
