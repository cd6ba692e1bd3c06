//! Environment variable loading
//!
//! `.env` values are already in the process environment by the time this runs
//! (`main` calls `dotenvy::dotenv()` first), so only the real environment is read.

use std::env;
use std::str::FromStr;

use crate::errors::ConfigError;

/// Raw values read from the environment, before defaults and YAML overrides
#[derive(Debug, Default)]
pub(super) struct EnvConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,

    pub stream_token_secret: Option<String>,

    pub provider_api_base_url: Option<String>,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_api_key_sid: Option<String>,
    pub twilio_api_key_secret: Option<String>,

    pub record_store_base_url: Option<String>,
    pub base44_app_id: Option<String>,
    pub base44_admin_email: Option<String>,
    pub base44_admin_password: Option<String>,
    pub record_store_session_ttl_seconds: Option<u64>,

    pub upstream_connect_timeout_seconds: Option<u64>,
    pub request_timeout_seconds: Option<u64>,
}

/// Read a variable, treating empty or whitespace-only values as unset
pub(super) fn var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(super) fn parse_var<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match var(key) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(None),
    }
}

impl EnvConfig {
    pub(super) fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            host: var("HOST"),
            port: parse_var("PORT")?,
            tls_cert_path: var("TLS_CERT_PATH"),
            tls_key_path: var("TLS_KEY_PATH"),

            stream_token_secret: var("STREAM_TOKEN_SECRET"),

            provider_api_base_url: var("PROVIDER_API_BASE_URL"),
            twilio_account_sid: var("TWILIO_ACCOUNT_SID"),
            twilio_auth_token: var("TWILIO_AUTH_TOKEN"),
            twilio_api_key_sid: var("TWILIO_API_KEY_SID"),
            twilio_api_key_secret: var("TWILIO_API_KEY_SECRET"),

            record_store_base_url: var("RECORD_STORE_BASE_URL"),
            base44_app_id: var("BASE44_APP_ID"),
            base44_admin_email: var("BASE44_ADMIN_EMAIL"),
            base44_admin_password: var("BASE44_ADMIN_PASSWORD"),
            record_store_session_ttl_seconds: parse_var("RECORD_STORE_SESSION_TTL_SECONDS")?,

            upstream_connect_timeout_seconds: parse_var("UPSTREAM_CONNECT_TIMEOUT_SECONDS")?,
            request_timeout_seconds: parse_var("REQUEST_TIMEOUT_SECONDS")?,
        })
    }
}
