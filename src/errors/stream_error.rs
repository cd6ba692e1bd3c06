use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::auth::TokenError;
use crate::core::fetcher::FetchError;
use crate::core::resolver::ResolveError;

/// Result type for the recording stream pipeline
pub type StreamResult<T> = Result<T, StreamError>;

/// Request-level failures of the recording stream endpoint
///
/// Every variant maps to exactly one HTTP status. Sub-failures that are part of
/// a fallback chain (one candidate failing, one credential rejected) never reach
/// this type; only exhaustion of all options does.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Missing token")]
    MissingToken,

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Server misconfigured: {0}")]
    Configuration(String),

    #[error("Call record not found: {0}")]
    ResourceNotFound(String),

    #[error("Recording not available")]
    ResourceNotAvailable,

    #[error("Recording could not be fetched from provider")]
    UpstreamUnavailable,

    #[error("Timed out resolving recording")]
    RequestTimeout,

    #[error("Request cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StreamError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            StreamError::MissingToken | StreamError::MalformedToken(_) => StatusCode::BAD_REQUEST,
            StreamError::TokenExpired | StreamError::InvalidSignature => StatusCode::UNAUTHORIZED,
            StreamError::Configuration(_) | StreamError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            StreamError::ResourceNotFound(_) | StreamError::ResourceNotAvailable => {
                StatusCode::NOT_FOUND
            }
            StreamError::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            StreamError::RequestTimeout => StatusCode::GATEWAY_TIMEOUT,
            StreamError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Message exposed to the client. Configuration and internal details stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            StreamError::Configuration(_) => "Server is not configured for streaming".to_string(),
            StreamError::Internal(_) => "Internal server error".to_string(),
            StreamError::ResourceNotFound(_) => "Call record not found".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for StreamError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(json!({ "error": self.client_message() })),
        )
            .into_response()
    }
}

impl From<TokenError> for StreamError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed(reason) => StreamError::MalformedToken(reason),
            TokenError::Expired => StreamError::TokenExpired,
            TokenError::InvalidSignature => StreamError::InvalidSignature,
            TokenError::InvalidSecret => {
                StreamError::Configuration("signing secret rejected by HMAC".to_string())
            }
            TokenError::Serialize(e) => StreamError::Internal(e.to_string()),
        }
    }
}

impl From<ResolveError> for StreamError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound(call_id) => StreamError::ResourceNotFound(call_id),
            ResolveError::NotAvailable => StreamError::ResourceNotAvailable,
            ResolveError::Configuration(reason) => StreamError::Configuration(reason),
            ResolveError::RecordStore(e) => StreamError::Internal(e.to_string()),
            ResolveError::Cancelled => StreamError::Cancelled,
        }
    }
}

impl From<FetchError> for StreamError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NoCredentials => {
                StreamError::Configuration("no upstream credentials configured".to_string())
            }
            FetchError::Unavailable { .. } => StreamError::UpstreamUnavailable,
            FetchError::Cancelled => StreamError::Cancelled,
        }
    }
}
