//! Range-aware upstream media fetch
//!
//! Candidates are tried strictly in order, one request at a time. For each
//! candidate the primary credential is used first; a 401/403 answer is retried
//! once with the secondary credential when one is configured. The first usable
//! response wins and no later candidate is contacted.

use http::HeaderValue;
use http::header::{AUTHORIZATION, RANGE};
use reqwest::{Method, StatusCode};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::candidate::MediaCandidate;
use super::lifetime::{Cancelled, cancellable};
use crate::auth::{CredentialKind, CredentialPair, UpstreamCredential};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMethod {
    Get,
    Head,
}

impl FetchMethod {
    fn as_method(&self) -> Method {
        match self {
            FetchMethod::Get => Method::GET,
            FetchMethod::Head => Method::HEAD,
        }
    }
}

/// Inbound request details forwarded upstream
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: FetchMethod,
    /// Inbound `Range` header, forwarded verbatim
    pub range: Option<HeaderValue>,
}

/// The winning upstream response and how it was obtained
#[derive(Debug)]
pub struct UpstreamResponse {
    pub response: reqwest::Response,
    pub candidate: MediaCandidate,
    pub credential: CredentialKind,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no upstream credentials configured")]
    NoCredentials,

    #[error("all {attempts} upstream candidates failed")]
    Unavailable { attempts: usize },

    #[error("request cancelled")]
    Cancelled,
}

impl From<Cancelled> for FetchError {
    fn from(_: Cancelled) -> Self {
        FetchError::Cancelled
    }
}

/// Failure of a single authorized request
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("no upstream credentials configured")]
    NoCredentials,

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

fn is_credential_rejection(status: StatusCode) -> bool {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
}

fn is_usable(response: &reqwest::Response, method: FetchMethod) -> bool {
    let status = response.status();
    if !status.is_success() {
        return false;
    }
    match method {
        FetchMethod::Head => true,
        FetchMethod::Get => status != StatusCode::NO_CONTENT && response.content_length() != Some(0),
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamFetcher {
    http: reqwest::Client,
}

impl UpstreamFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn send_once(
        &self,
        method: FetchMethod,
        url: &Url,
        credential: &UpstreamCredential,
        range: Option<&HeaderValue>,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, AttemptError> {
        let mut request = self
            .http
            .request(method.as_method(), url.clone())
            .header(AUTHORIZATION, credential.authorization_header());
        if let Some(range) = range {
            request = request.header(RANGE, range.clone());
        }
        Ok(cancellable(cancel, request.send()).await??)
    }

    /// Send with the primary credential, retrying once with the secondary on 401/403
    ///
    /// The returned response may still be unsuccessful; callers judge it.
    pub async fn send_with_fallback(
        &self,
        method: FetchMethod,
        url: &Url,
        credentials: &CredentialPair,
        range: Option<&HeaderValue>,
        cancel: &CancellationToken,
    ) -> Result<(reqwest::Response, CredentialKind), AttemptError> {
        let primary = credentials.primary().ok_or(AttemptError::NoCredentials)?;
        let response = self.send_once(method, url, primary, range, cancel).await?;

        match credentials.secondary() {
            Some(secondary) if is_credential_rejection(response.status()) => {
                debug!(
                    url = %url,
                    status = %response.status(),
                    credential = %primary.kind(),
                    "Primary credential rejected, retrying with secondary"
                );
                drop(response);
                let response = self.send_once(method, url, secondary, range, cancel).await?;
                Ok((response, secondary.kind()))
            }
            _ => Ok((response, primary.kind())),
        }
    }

    /// Fetch the first candidate that yields a usable response
    pub async fn fetch(
        &self,
        candidates: &[MediaCandidate],
        credentials: &CredentialPair,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<UpstreamResponse, FetchError> {
        if credentials.is_empty() {
            return Err(FetchError::NoCredentials);
        }

        for candidate in candidates {
            let attempt = self
                .send_with_fallback(
                    request.method,
                    &candidate.url,
                    credentials,
                    request.range.as_ref(),
                    cancel,
                )
                .await;

            match attempt {
                Ok((response, credential)) if is_usable(&response, request.method) => {
                    info!(
                        candidate = %candidate,
                        status = %response.status(),
                        credential = %credential,
                        "Upstream recording located"
                    );
                    return Ok(UpstreamResponse {
                        response,
                        candidate: candidate.clone(),
                        credential,
                    });
                }
                Ok((response, credential)) => {
                    warn!(
                        candidate = %candidate,
                        status = %response.status(),
                        credential = %credential,
                        "Upstream candidate not usable, trying next"
                    );
                }
                Err(AttemptError::Http(e)) => {
                    warn!(candidate = %candidate, error = %e, "Upstream candidate request failed, trying next");
                }
                Err(AttemptError::Cancelled(_)) => return Err(FetchError::Cancelled),
                Err(AttemptError::NoCredentials) => return Err(FetchError::NoCredentials),
            }
        }

        Err(FetchError::Unavailable {
            attempts: candidates.len(),
        })
    }
}
