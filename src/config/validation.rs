use url::Url;

use super::ServerConfig;
use crate::errors::ConfigError;

/// Two settings that only make sense together must be both set or both unset
pub(super) fn validate_pair(
    first_key: &str,
    first: &Option<String>,
    second_key: &str,
    second: &Option<String>,
) -> Result<(), ConfigError> {
    match (first, second) {
        (Some(_), None) => Err(ConfigError::Validation(format!(
            "{first_key} is set but {second_key} is missing"
        ))),
        (None, Some(_)) => Err(ConfigError::Validation(format!(
            "{second_key} is set but {first_key} is missing"
        ))),
        _ => Ok(()),
    }
}

pub(super) fn parse_base_url(key: &'static str, value: &str) -> Result<Url, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    };
    let url = Url::parse(value).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() || url.host().is_none() {
        return Err(invalid());
    }
    Ok(url)
}

/// API key id and secret are one credential
pub(super) fn validate_api_key(config: &ServerConfig) -> Result<(), ConfigError> {
    validate_pair(
        "TWILIO_API_KEY_SID",
        &config.twilio_api_key_sid,
        "TWILIO_API_KEY_SECRET",
        &config.twilio_api_key_secret,
    )
}

/// The record store login needs all of app id, email and password, or none
pub(super) fn validate_record_store(config: &ServerConfig) -> Result<(), ConfigError> {
    let settings = [
        ("BASE44_APP_ID", config.base44_app_id.is_some()),
        ("BASE44_ADMIN_EMAIL", config.base44_admin_email.is_some()),
        ("BASE44_ADMIN_PASSWORD", config.base44_admin_password.is_some()),
    ];
    let present = settings.iter().filter(|(_, set)| *set).count();
    if present == 0 || present == settings.len() {
        return Ok(());
    }

    let missing: Vec<&str> = settings
        .iter()
        .filter(|(_, set)| !*set)
        .map(|(key, _)| *key)
        .collect();
    Err(ConfigError::Validation(format!(
        "record store partially configured, missing: {}",
        missing.join(", ")
    )))
}

pub(super) fn validate_timeouts(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.request_timeout_seconds == 0 {
        return Err(ConfigError::Validation(
            "REQUEST_TIMEOUT_SECONDS must be greater than zero".to_string(),
        ));
    }
    if config.upstream_connect_timeout_seconds == 0 {
        return Err(ConfigError::Validation(
            "UPSTREAM_CONNECT_TIMEOUT_SECONDS must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

pub(super) fn validate_tls(config: &ServerConfig) -> Result<(), ConfigError> {
    let Some(tls) = &config.tls else {
        return Ok(());
    };
    for path in [&tls.cert_path, &tls.key_path] {
        if !path.exists() {
            return Err(ConfigError::Validation(format!(
                "TLS file not found: {}",
                path.display()
            )));
        }
    }
    Ok(())
}

pub(super) fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
    validate_api_key(config)?;
    validate_record_store(config)?;
    validate_timeouts(config)?;
    validate_tls(config)?;
    Ok(())
}
