//! Configuration module for the call relay gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use callrelay_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

mod env;
mod merge;
mod validation;
mod yaml;

use crate::auth::{CredentialKind, CredentialPair, UpstreamCredential};
use crate::errors::ConfigError;

/// TLS configuration for HTTPS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Record store admin login, present only when fully configured
#[derive(Clone, Copy)]
pub struct RecordStoreLogin<'a> {
    pub app_id: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// Server configuration
///
/// Contains everything needed to run the gateway:
/// - Server settings (host, port, TLS, timeouts)
/// - Stream token signing secret
/// - Telephony provider account and credentials
/// - Record store application and admin login
#[derive(Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    /// HMAC secret for stream tokens; falls back to `twilio_auth_token`
    pub stream_token_secret: Option<String>,

    // Telephony provider
    pub provider_api_base_url: Url,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_api_key_sid: Option<String>,
    pub twilio_api_key_secret: Option<String>,

    // Record store
    pub record_store_base_url: Url,
    pub base44_app_id: Option<String>,
    pub base44_admin_email: Option<String>,
    pub base44_admin_password: Option<String>,
    pub record_store_session_ttl_seconds: u64,

    // Timeouts
    pub upstream_connect_timeout_seconds: u64,
    /// Bounds resolution plus upstream response headers, not the body stream
    pub request_timeout_seconds: u64,
}

/// Implement Drop to zeroize all secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut secret) = self.stream_token_secret {
            secret.zeroize();
        }
        if let Some(ref mut token) = self.twilio_auth_token {
            token.zeroize();
        }
        if let Some(ref mut secret) = self.twilio_api_key_secret {
            secret.zeroize();
        }
        if let Some(ref mut password) = self.base44_admin_password {
            password.zeroize();
        }
    }
}

fn redacted(value: &Option<String>) -> &'static str {
    if value.is_some() { "<redacted>" } else { "<unset>" }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("stream_token_secret", &redacted(&self.stream_token_secret))
            .field("provider_api_base_url", &self.provider_api_base_url.as_str())
            .field("twilio_account_sid", &self.twilio_account_sid)
            .field("twilio_auth_token", &redacted(&self.twilio_auth_token))
            .field("twilio_api_key_sid", &self.twilio_api_key_sid)
            .field("twilio_api_key_secret", &redacted(&self.twilio_api_key_secret))
            .field("record_store_base_url", &self.record_store_base_url.as_str())
            .field("base44_app_id", &self.base44_app_id)
            .field("base44_admin_email", &self.base44_admin_email)
            .field("base44_admin_password", &redacted(&self.base44_admin_password))
            .field(
                "record_store_session_ttl_seconds",
                &self.record_store_session_ttl_seconds,
            )
            .field(
                "upstream_connect_timeout_seconds",
                &self.upstream_connect_timeout_seconds,
            )
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables and defaults only
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        // .env is loaded in main.rs at startup, so it is already part of the environment here
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Stream token signing secret, falling back to the provider auth token
    pub fn signing_secret(&self) -> Option<&[u8]> {
        self.stream_token_secret
            .as_deref()
            .or(self.twilio_auth_token.as_deref())
            .map(str::as_bytes)
    }

    /// Provider credentials in fallback order
    pub fn credential_pair(&self) -> CredentialPair {
        let account = match (&self.twilio_account_sid, &self.twilio_auth_token) {
            (Some(sid), Some(token)) => Some(UpstreamCredential::new(CredentialKind::Account, sid, token)),
            _ => None,
        };
        let api_key = match (&self.twilio_api_key_sid, &self.twilio_api_key_secret) {
            (Some(sid), Some(secret)) => Some(UpstreamCredential::new(CredentialKind::ApiKey, sid, secret)),
            _ => None,
        };
        CredentialPair::new(account, api_key)
    }

    pub fn record_store_login(&self) -> Option<RecordStoreLogin<'_>> {
        Some(RecordStoreLogin {
            app_id: self.base44_app_id.as_deref()?,
            email: self.base44_admin_email.as_deref()?,
            password: self.base44_admin_password.as_deref()?,
        })
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.record_store_session_ttl_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_connect_timeout_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}
