//! Recording stream route configuration

use axum::{
    Json, Router,
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::handlers::stream::{preflight, stream_call_recording};
use crate::state::AppState;

pub const STREAM_PATH: &str = "/stream-call-recording";

/// CORS headers for browser audio players, applied to every response
const CORS_HEADERS: [(HeaderName, &str); 4] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, HEAD, OPTIONS"),
    (
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        "Range, Content-Type, Authorization",
    ),
    (
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        "Content-Range, Accept-Ranges",
    ),
];

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = %detail, "Recording stream handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "Internal server error"})),
    )
        .into_response()
}

/// Create the recording stream router
///
/// # Endpoint
///
/// - `GET /stream-call-recording?token=<token>` - stream the recording
/// - `HEAD /stream-call-recording?token=<token>` - headers only
/// - `OPTIONS /stream-call-recording` - CORS preflight, 204
///
/// The CORS layer sits outside the panic guard so even a 500 produced from a
/// panic carries the CORS headers.
pub fn create_stream_router() -> Router<Arc<AppState>> {
    let router = Router::new()
        .route(
            STREAM_PATH,
            get(stream_call_recording)
                .head(stream_call_recording)
                .options(preflight),
        )
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http());

    CORS_HEADERS
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::overriding(
                name,
                HeaderValue::from_static(value),
            ))
        })
}
