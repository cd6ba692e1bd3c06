//! Telephony provider recording API
//!
//! # API Reference
//!
//! - Recording media: `GET /2010-04-01/Accounts/{AccountSid}/Recordings/{RecordingSid}.{mp3|wav}`
//! - Recordings of a call: `GET /2010-04-01/Accounts/{AccountSid}/Calls/{CallSid}/Recordings.json`
//! - Auth: HTTP Basic with the account credential or an API key credential

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::candidate::{MediaCandidate, format_variants};
use super::fetcher::{AttemptError, FetchMethod, UpstreamFetcher};
use super::lifetime::{Cancelled, cancellable};
use crate::auth::CredentialPair;

/// Default provider API base URL
pub const DEFAULT_PROVIDER_API_BASE_URL: &str = "https://api.twilio.com";

const API_VERSION: &str = "2010-04-01";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider account SID not configured")]
    MissingAccountSid,

    #[error("provider base URL cannot carry a path")]
    InvalidBaseUrl,

    #[error("no provider credentials configured")]
    NoCredentials,

    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned unexpected status {0}")]
    UnexpectedStatus(StatusCode),

    #[error("request cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Deployment problems that no fallback can work around
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ProviderError::MissingAccountSid | ProviderError::InvalidBaseUrl | ProviderError::NoCredentials
        )
    }
}

impl From<AttemptError> for ProviderError {
    fn from(err: AttemptError) -> Self {
        match err {
            AttemptError::NoCredentials => ProviderError::NoCredentials,
            AttemptError::Http(e) => ProviderError::Http(e),
            AttemptError::Cancelled(_) => ProviderError::Cancelled,
        }
    }
}

impl From<Cancelled> for ProviderError {
    fn from(_: Cancelled) -> Self {
        ProviderError::Cancelled
    }
}

/// Provider-side recording lookups used by the resolver
#[async_trait]
pub trait RecordingDirectory: Send + Sync {
    /// Format variants of the canonical media URL for a recording. No network call.
    fn recording_candidates(&self, recording_sid: &str) -> Result<Vec<MediaCandidate>, ProviderError>;

    /// Sid of the first recording listed for a provider call, if any
    async fn first_recording_sid(
        &self,
        call_sid: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct RecordingList {
    #[serde(default)]
    recordings: Vec<RecordingSummary>,
}

#[derive(Debug, Deserialize)]
struct RecordingSummary {
    sid: String,
}

#[derive(Debug, Clone)]
pub struct ProviderClient {
    fetcher: UpstreamFetcher,
    base_url: Url,
    account_sid: Option<String>,
    credentials: CredentialPair,
}

impl ProviderClient {
    pub fn new(
        fetcher: UpstreamFetcher,
        base_url: Url,
        account_sid: Option<String>,
        credentials: CredentialPair,
    ) -> Self {
        Self {
            fetcher,
            base_url,
            account_sid,
            credentials,
        }
    }

    pub fn credentials(&self) -> &CredentialPair {
        &self.credentials
    }

    fn account_url(&self, tail: &[&str]) -> Result<Url, ProviderError> {
        let account_sid = self
            .account_sid
            .as_deref()
            .ok_or(ProviderError::MissingAccountSid)?;
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::InvalidBaseUrl)?
            .pop_if_empty()
            .extend([API_VERSION, "Accounts", account_sid])
            .extend(tail);
        Ok(url)
    }
}

#[async_trait]
impl RecordingDirectory for ProviderClient {
    fn recording_candidates(&self, recording_sid: &str) -> Result<Vec<MediaCandidate>, ProviderError> {
        let url = self.account_url(&["Recordings", recording_sid])?;
        Ok(format_variants(&url))
    }

    async fn first_recording_sid(
        &self,
        call_sid: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, ProviderError> {
        let url = self.account_url(&["Calls", call_sid, "Recordings.json"])?;
        debug!(call_sid = %call_sid, "Listing provider recordings for call");

        let (response, _) = self
            .fetcher
            .send_with_fallback(FetchMethod::Get, &url, &self.credentials, None, cancel)
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::UnexpectedStatus(response.status()));
        }

        let list: RecordingList = cancellable(cancel, response.json()).await??;
        Ok(list
            .recordings
            .into_iter()
            .map(|recording| recording.sid)
            .find(|sid| !sid.trim().is_empty()))
    }
}
