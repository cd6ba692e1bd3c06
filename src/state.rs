use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::provider::{ProviderClient, RecordingDirectory};
use crate::core::record_store::{CallRecordSource, RecordStoreClient, SessionCache};
use crate::core::{RecordingResolver, UpstreamFetcher};

/// Upstream redirects followed before giving up
const MAX_REDIRECTS: usize = 10;

/// Shared application state
///
/// Built once at startup. The record store session cache is the only state
/// mutated across requests.
pub struct AppState {
    pub config: ServerConfig,
    pub fetcher: UpstreamFetcher,
    pub provider: ProviderClient,
    /// `None` when the record store login is not configured
    pub record_store: Option<RecordStoreClient>,
    pub sessions: Arc<SessionCache>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        let fetcher = UpstreamFetcher::new(http.clone());
        let credentials = config.credential_pair();
        if credentials.is_empty() {
            warn!("No provider credentials configured, stream requests will fail");
        }
        if config.signing_secret().is_none() {
            warn!("No stream token secret configured, stream requests will fail");
        }

        let provider = ProviderClient::new(
            fetcher.clone(),
            config.provider_api_base_url.clone(),
            config.twilio_account_sid.clone(),
            credentials,
        );

        let sessions = Arc::new(SessionCache::new(config.session_ttl()));
        let record_store = config.record_store_login().map(|login| {
            info!(app_id = %login.app_id, "Record store lookups enabled");
            RecordStoreClient::new(
                http.clone(),
                config.record_store_base_url.clone(),
                login.app_id,
                login.email,
                login.password,
                sessions.clone(),
            )
        });

        Ok(Arc::new(Self {
            config,
            fetcher,
            provider,
            record_store,
            sessions,
        }))
    }

    pub fn resolver(&self) -> RecordingResolver<'_> {
        let records = self.record_store.as_ref().map(|c| c as &dyn CallRecordSource);
        RecordingResolver::new(records, &self.provider as &dyn RecordingDirectory)
    }
}
