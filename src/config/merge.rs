use std::path::PathBuf;

use super::env::EnvConfig;
use super::validation;
use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig};
use crate::core::provider::DEFAULT_PROVIDER_API_BASE_URL;
use crate::core::record_store::DEFAULT_RECORD_STORE_BASE_URL;
use crate::errors::ConfigError;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_SESSION_TTL_SECONDS: u64 = 30 * 60;
const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Build the final configuration: YAML > environment > defaults
pub(super) fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, ConfigError> {
    let env = EnvConfig::load()?;
    let yaml = yaml.unwrap_or_default();
    let server = yaml.server.unwrap_or_default();
    let provider = yaml.provider.unwrap_or_default();
    let record_store = yaml.record_store.unwrap_or_default();
    let stream = yaml.stream.unwrap_or_default();

    let tls_yaml = server.tls.unwrap_or_default();
    let tls = if tls_yaml.enabled == Some(false) {
        None
    } else {
        let cert_path = tls_yaml.cert_path.or(env.tls_cert_path);
        let key_path = tls_yaml.key_path.or(env.tls_key_path);
        validation::validate_pair("TLS_CERT_PATH", &cert_path, "TLS_KEY_PATH", &key_path)?;
        match (cert_path, key_path) {
            (Some(cert_path), Some(key_path)) => Some(TlsConfig {
                cert_path: PathBuf::from(cert_path),
                key_path: PathBuf::from(key_path),
            }),
            _ => None,
        }
    };

    let provider_api_base_url = validation::parse_base_url(
        "PROVIDER_API_BASE_URL",
        provider
            .api_base_url
            .or(env.provider_api_base_url)
            .as_deref()
            .unwrap_or(DEFAULT_PROVIDER_API_BASE_URL),
    )?;
    let record_store_base_url = validation::parse_base_url(
        "RECORD_STORE_BASE_URL",
        record_store
            .base_url
            .or(env.record_store_base_url)
            .as_deref()
            .unwrap_or(DEFAULT_RECORD_STORE_BASE_URL),
    )?;

    Ok(ServerConfig {
        host: server.host.or(env.host).unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: server.port.or(env.port).unwrap_or(DEFAULT_PORT),
        tls,

        stream_token_secret: stream.token_secret.or(env.stream_token_secret),

        provider_api_base_url,
        twilio_account_sid: provider.account_sid.or(env.twilio_account_sid),
        twilio_auth_token: provider.auth_token.or(env.twilio_auth_token),
        twilio_api_key_sid: provider.api_key_sid.or(env.twilio_api_key_sid),
        twilio_api_key_secret: provider.api_key_secret.or(env.twilio_api_key_secret),

        record_store_base_url,
        base44_app_id: record_store.app_id.or(env.base44_app_id),
        base44_admin_email: record_store.admin_email.or(env.base44_admin_email),
        base44_admin_password: record_store.admin_password.or(env.base44_admin_password),
        record_store_session_ttl_seconds: record_store
            .session_ttl_seconds
            .or(env.record_store_session_ttl_seconds)
            .unwrap_or(DEFAULT_SESSION_TTL_SECONDS),

        upstream_connect_timeout_seconds: server
            .upstream_connect_timeout_seconds
            .or(env.upstream_connect_timeout_seconds)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECONDS),
        request_timeout_seconds: server
            .request_timeout_seconds
            .or(env.request_timeout_seconds)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS),
    })
}
