use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;
use zeroize::Zeroizing;

use super::session::{Session, SessionCache};
use crate::core::lifetime::{Cancelled, cancellable};

/// Default record store base URL
pub const DEFAULT_RECORD_STORE_BASE_URL: &str = "https://app.base44.com";

#[derive(Debug, Error)]
pub enum RecordStoreError {
    #[error("record store login rejected with status {0}")]
    LoginRejected(StatusCode),

    #[error("record store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("record store returned unexpected status {0}")]
    UnexpectedStatus(StatusCode),

    #[error("record store base URL cannot carry a path")]
    InvalidBaseUrl,

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Call metadata relevant to locating a recording
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallRecord {
    #[serde(default)]
    pub recording_sid: Option<String>,
    #[serde(default)]
    pub recording_url: Option<String>,
    #[serde(default)]
    pub call_sid: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl CallRecord {
    pub fn recording_sid(&self) -> Option<&str> {
        non_empty(&self.recording_sid)
    }

    pub fn recording_url(&self) -> Option<&str> {
        non_empty(&self.recording_url)
    }

    pub fn call_sid(&self) -> Option<&str> {
        non_empty(&self.call_sid)
    }
}

/// Lookup of call records by id
#[async_trait]
pub trait CallRecordSource: Send + Sync {
    /// `Ok(None)` means the record does not exist
    async fn fetch_call_record(
        &self,
        call_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<CallRecord>, RecordStoreError>;
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(alias = "token")]
    access_token: String,
}

enum RecordFetch {
    Found(Option<CallRecord>),
    Missing,
    Unauthorized,
}

/// HTTP client for the record store
pub struct RecordStoreClient {
    http: reqwest::Client,
    base_url: Url,
    app_id: String,
    email: String,
    password: Zeroizing<String>,
    sessions: Arc<SessionCache>,
}

impl RecordStoreClient {
    pub fn new(
        http: reqwest::Client,
        base_url: Url,
        app_id: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        sessions: Arc<SessionCache>,
    ) -> Self {
        Self {
            http,
            base_url,
            app_id: app_id.into(),
            email: email.into(),
            password: Zeroizing::new(password.into()),
            sessions,
        }
    }

    fn endpoint(&self, tail: &[&str]) -> Result<Url, RecordStoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RecordStoreError::InvalidBaseUrl)?
            .pop_if_empty()
            .extend(["api", "apps", self.app_id.as_str()])
            .extend(tail);
        Ok(url)
    }

    async fn login(&self, cancel: &CancellationToken) -> Result<Arc<Session>, RecordStoreError> {
        let url = self.endpoint(&["auth", "login"])?;
        debug!(url = %url, "Logging in to record store");

        let response = cancellable(
            cancel,
            self.http
                .post(url)
                .json(&json!({ "email": self.email, "password": self.password.as_str() }))
                .send(),
        )
        .await??;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Record store login rejected");
            return Err(RecordStoreError::LoginRejected(response.status()));
        }

        let login: LoginResponse = cancellable(cancel, response.json()).await??;
        info!("Record store session refreshed");
        Ok(self.sessions.store(login.access_token))
    }

    async fn session(&self, cancel: &CancellationToken) -> Result<Arc<Session>, RecordStoreError> {
        match self.sessions.current() {
            Some(session) => Ok(session),
            None => self.login(cancel).await,
        }
    }

    async fn get_record(
        &self,
        session: &Session,
        call_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RecordFetch, RecordStoreError> {
        let url = self.endpoint(&["entities", "CallRecord", call_id])?;
        let response = cancellable(cancel, self.http.get(url).bearer_auth(session.token()).send())
            .await??;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(RecordFetch::Missing),
            StatusCode::UNAUTHORIZED => Ok(RecordFetch::Unauthorized),
            status if status.is_success() => {
                let record: Option<CallRecord> = cancellable(cancel, response.json()).await??;
                Ok(RecordFetch::Found(record))
            }
            status => Err(RecordStoreError::UnexpectedStatus(status)),
        }
    }
}

#[async_trait]
impl CallRecordSource for RecordStoreClient {
    async fn fetch_call_record(
        &self,
        call_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<CallRecord>, RecordStoreError> {
        let session = self.session(cancel).await?;
        let fetched = match self.get_record(&session, call_id, cancel).await? {
            RecordFetch::Unauthorized => {
                // Session revoked server-side before the TTL ran out.
                warn!(call_id = %call_id, "Record store session rejected, logging in again");
                self.sessions.invalidate();
                let session = self.login(cancel).await?;
                self.get_record(&session, call_id, cancel).await?
            }
            other => other,
        };

        match fetched {
            RecordFetch::Found(record) => Ok(record),
            RecordFetch::Missing => Ok(None),
            RecordFetch::Unauthorized => Err(RecordStoreError::UnexpectedStatus(StatusCode::UNAUTHORIZED)),
        }
    }
}
