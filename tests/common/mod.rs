//! Shared helpers for integration tests

#![allow(dead_code)]

use axum::{Router, body::Body, http::Request, response::Response};
use callrelay_gateway::auth::{StreamClaims, encode, now_millis};
use callrelay_gateway::{AppState, ServerConfig, create_app};
use tower::util::ServiceExt;
use url::Url;

pub const SECRET: &str = "integration-signing-secret";
pub const ACCOUNT_SID: &str = "AC123";
/// `AC123:token`
pub const ACCOUNT_AUTH: &str = "Basic QUMxMjM6dG9rZW4=";
/// `SK456:key-secret`
pub const API_KEY_AUTH: &str = "Basic U0s0NTY6a2V5LXNlY3JldA==";
pub const APP_ID: &str = "app-1";

/// Full configuration pointing both upstreams at mock servers
pub fn test_config(provider_url: &str, record_store_url: &str) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        tls: None,
        stream_token_secret: Some(SECRET.to_string()),
        provider_api_base_url: Url::parse(provider_url).unwrap(),
        twilio_account_sid: Some(ACCOUNT_SID.to_string()),
        twilio_auth_token: Some("token".to_string()),
        twilio_api_key_sid: Some("SK456".to_string()),
        twilio_api_key_secret: Some("key-secret".to_string()),
        record_store_base_url: Url::parse(record_store_url).unwrap(),
        base44_app_id: Some(APP_ID.to_string()),
        base44_admin_email: Some("admin@example.com".to_string()),
        base44_admin_password: Some("hunter2".to_string()),
        record_store_session_ttl_seconds: 1800,
        upstream_connect_timeout_seconds: 5,
        request_timeout_seconds: 10,
    }
}

pub fn app(config: ServerConfig) -> Router {
    create_app(AppState::new(config).unwrap())
}

pub fn recording_claims(recording_id: &str) -> StreamClaims {
    StreamClaims {
        recording_id: Some(recording_id.to_string()),
        exp: Some(now_millis() + 60_000),
        ..Default::default()
    }
}

pub fn call_claims(call_id: &str) -> StreamClaims {
    StreamClaims {
        call_id: Some(call_id.to_string()),
        exp: Some(now_millis() + 60_000),
        ..Default::default()
    }
}

pub fn token(claims: &StreamClaims) -> String {
    encode(claims, SECRET.as_bytes()).unwrap()
}

pub fn recording_path(recording_sid: &str, extension: &str) -> String {
    format!("/2010-04-01/Accounts/{ACCOUNT_SID}/Recordings/{recording_sid}.{extension}")
}

pub fn stream_request(method: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(format!("/stream-call-recording?token={token}"))
        .body(Body::empty())
        .unwrap()
}

pub async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn assert_cors_headers(response: &Response) {
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["access-control-allow-methods"], "GET, HEAD, OPTIONS");
    assert_eq!(
        headers["access-control-allow-headers"],
        "Range, Content-Type, Authorization"
    );
    assert_eq!(
        headers["access-control-expose-headers"],
        "Content-Range, Accept-Ranges"
    );
}
