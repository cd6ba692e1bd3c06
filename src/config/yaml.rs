use serde::Deserialize;
use std::path::Path;

use crate::errors::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///   request_timeout_seconds: 30
///   upstream_connect_timeout_seconds: 10
///   tls:
///     enabled: true
///     cert_path: "/etc/callrelay/cert.pem"
///     key_path: "/etc/callrelay/key.pem"
///
/// provider:
///   api_base_url: "https://api.twilio.com"
///   account_sid: "AC..."
///   auth_token: "your-auth-token"
///   api_key_sid: "SK..."
///   api_key_secret: "your-api-key-secret"
///
/// record_store:
///   base_url: "https://app.base44.com"
///   app_id: "your-app-id"
///   admin_email: "admin@example.com"
///   admin_password: "your-password"
///   session_ttl_seconds: 1800
///
/// stream:
///   token_secret: "your-signing-secret"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub provider: Option<ProviderYaml>,
    pub record_store: Option<RecordStoreYaml>,
    pub stream: Option<StreamYaml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
    pub request_timeout_seconds: Option<u64>,
    pub upstream_connect_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Telephony provider settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProviderYaml {
    pub api_base_url: Option<String>,
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub api_key_sid: Option<String>,
    pub api_key_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RecordStoreYaml {
    pub base_url: Option<String>,
    pub app_id: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub session_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StreamYaml {
    /// HMAC secret for stream capability tokens
    pub token_secret: Option<String>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

        let config: YamlConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }
}
