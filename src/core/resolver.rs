//! Token claims to ordered upstream candidates
//!
//! Resolution is a short-circuiting pipeline of strategies evaluated in a fixed
//! order. Each step either produces candidates (ending resolution), produces
//! nothing (the next step runs), or fails terminally.
//!
//! 1. `DirectRecording` - the token names a recording; no network call
//! 2. `CallRecordLookup` - the token names a call; ask the record store
//! 3. `ProviderCallListing` - a provider call sid is known; list its recordings

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::candidate::{MediaCandidate, candidates_from_media_url};
use super::provider::{ProviderError, RecordingDirectory};
use super::record_store::{CallRecord, CallRecordSource, RecordStoreError};
use crate::auth::StreamClaims;

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The call record named by the token does not exist
    #[error("call record not found: {0}")]
    NotFound(String),

    /// Every strategy ran and none produced a candidate
    #[error("no recording candidates could be resolved")]
    NotAvailable,

    #[error("resolver misconfigured: {0}")]
    Configuration(String),

    #[error(transparent)]
    RecordStore(RecordStoreError),

    #[error("request cancelled")]
    Cancelled,
}

impl From<RecordStoreError> for ResolveError {
    fn from(err: RecordStoreError) -> Self {
        match err {
            RecordStoreError::Cancelled(_) => ResolveError::Cancelled,
            other => ResolveError::RecordStore(other),
        }
    }
}

impl From<ProviderError> for ResolveError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Cancelled => ResolveError::Cancelled,
            other => ResolveError::Configuration(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    DirectRecording,
    CallRecordLookup,
    ProviderCallListing,
}

impl Strategy {
    const ORDER: [Strategy; 3] = [
        Strategy::DirectRecording,
        Strategy::CallRecordLookup,
        Strategy::ProviderCallListing,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Strategy::DirectRecording => "direct_recording",
            Strategy::CallRecordLookup => "call_record_lookup",
            Strategy::ProviderCallListing => "provider_call_listing",
        }
    }
}

/// State threaded between strategies
struct Resolution<'c> {
    claims: &'c StreamClaims,
    /// Provider call sid from the token, or surfaced by the call record
    provider_call_sid: Option<String>,
}

pub struct RecordingResolver<'a> {
    records: Option<&'a dyn CallRecordSource>,
    directory: &'a dyn RecordingDirectory,
}

impl<'a> RecordingResolver<'a> {
    pub fn new(records: Option<&'a dyn CallRecordSource>, directory: &'a dyn RecordingDirectory) -> Self {
        Self { records, directory }
    }

    /// Resolve claims into candidates, first non-empty strategy wins
    pub async fn resolve(
        &self,
        claims: &StreamClaims,
        cancel: &CancellationToken,
    ) -> Result<Vec<MediaCandidate>, ResolveError> {
        let mut resolution = Resolution {
            claims,
            provider_call_sid: claims.provider_call_sid().map(str::to_string),
        };

        for strategy in Strategy::ORDER {
            let candidates = match strategy {
                Strategy::DirectRecording => self.direct_recording(&resolution)?,
                Strategy::CallRecordLookup => self.call_record_lookup(&mut resolution, cancel).await?,
                Strategy::ProviderCallListing => self.provider_call_listing(&resolution, cancel).await?,
            };
            if let Some(candidates) = candidates.filter(|c| !c.is_empty()) {
                info!(
                    strategy = strategy.as_str(),
                    candidates = candidates.len(),
                    "Recording candidates resolved"
                );
                return Ok(candidates);
            }
            debug!(strategy = strategy.as_str(), "Strategy yielded no candidates");
        }

        Err(ResolveError::NotAvailable)
    }

    fn direct_recording(&self, resolution: &Resolution<'_>) -> Result<Option<Vec<MediaCandidate>>, ResolveError> {
        match resolution.claims.recording_id() {
            Some(recording_id) => Ok(Some(self.directory.recording_candidates(recording_id)?)),
            None => Ok(None),
        }
    }

    async fn call_record_lookup(
        &self,
        resolution: &mut Resolution<'_>,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<MediaCandidate>>, ResolveError> {
        let claims = resolution.claims;
        let Some(call_id) = claims.call_id() else {
            return Ok(None);
        };
        if claims.recording_id().is_some() {
            return Ok(None);
        }
        let records = self.records.ok_or_else(|| {
            ResolveError::Configuration("record store credentials not configured".to_string())
        })?;

        let record = records
            .fetch_call_record(call_id, cancel)
            .await?
            .ok_or_else(|| ResolveError::NotFound(call_id.to_string()))?;

        self.candidates_from_record(&record, call_id, resolution)
    }

    fn candidates_from_record(
        &self,
        record: &CallRecord,
        call_id: &str,
        resolution: &mut Resolution<'_>,
    ) -> Result<Option<Vec<MediaCandidate>>, ResolveError> {
        if let Some(recording_sid) = record.recording_sid() {
            return Ok(Some(self.directory.recording_candidates(recording_sid)?));
        }

        if let Some(media_url) = record.recording_url() {
            match candidates_from_media_url(media_url) {
                Ok(candidates) => return Ok(Some(candidates)),
                Err(e) => warn!(
                    call_id = %call_id,
                    error = %e,
                    "Call record carries an unusable recording URL"
                ),
            }
        }

        if let Some(call_sid) = record.call_sid() {
            if resolution.provider_call_sid.is_none() {
                resolution.provider_call_sid = Some(call_sid.to_string());
            }
        }
        Ok(None)
    }

    /// Listing failures are not fatal; they only mean this strategy found nothing.
    /// A misconfigured provider client is, since every other strategy would hit it too.
    async fn provider_call_listing(
        &self,
        resolution: &Resolution<'_>,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<MediaCandidate>>, ResolveError> {
        let Some(call_sid) = resolution.provider_call_sid.as_deref() else {
            return Ok(None);
        };

        match self.directory.first_recording_sid(call_sid, cancel).await {
            Ok(Some(recording_sid)) => Ok(Some(self.directory.recording_candidates(&recording_sid)?)),
            Ok(None) => {
                info!(call_sid = %call_sid, "Provider lists no recordings for call");
                Ok(None)
            }
            Err(ProviderError::Cancelled) => Err(ResolveError::Cancelled),
            Err(e) if e.is_configuration() => Err(e.into()),
            Err(e) => {
                warn!(call_sid = %call_sid, error = %e, "Provider recording listing failed");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::candidate::{AudioFormat, format_variants};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    #[derive(Default)]
    struct FakeRecords {
        records: HashMap<String, CallRecord>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CallRecordSource for FakeRecords {
        async fn fetch_call_record(
            &self,
            call_id: &str,
            _cancel: &CancellationToken,
        ) -> Result<Option<CallRecord>, RecordStoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.records.get(call_id).cloned())
        }
    }

    #[derive(Default)]
    struct FakeDirectory {
        listings: HashMap<String, Vec<String>>,
        failing: bool,
        unconfigured: bool,
        list_calls: AtomicUsize,
    }

    #[async_trait]
    impl RecordingDirectory for FakeDirectory {
        fn recording_candidates(&self, recording_sid: &str) -> Result<Vec<MediaCandidate>, ProviderError> {
            let url = Url::parse(&format!("https://provider.test/Recordings/{recording_sid}")).unwrap();
            Ok(format_variants(&url))
        }

        async fn first_recording_sid(
            &self,
            call_sid: &str,
            _cancel: &CancellationToken,
        ) -> Result<Option<String>, ProviderError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.unconfigured {
                return Err(ProviderError::MissingAccountSid);
            }
            if self.failing {
                return Err(ProviderError::UnexpectedStatus(reqwest::StatusCode::BAD_GATEWAY));
            }
            Ok(self
                .listings
                .get(call_sid)
                .and_then(|sids| sids.first().cloned()))
        }
    }

    fn urls(candidates: &[MediaCandidate]) -> Vec<String> {
        candidates.iter().map(|c| c.url.to_string()).collect()
    }

    fn claims(recording_id: Option<&str>, call_id: Option<&str>, provider_call_sid: Option<&str>) -> StreamClaims {
        StreamClaims {
            recording_id: recording_id.map(str::to_string),
            call_id: call_id.map(str::to_string),
            provider_call_sid: provider_call_sid.map(str::to_string),
            exp: Some(i64::MAX),
        }
    }

    #[tokio::test]
    async fn test_recording_id_yields_two_formats_without_network() {
        let records = FakeRecords::default();
        let directory = FakeDirectory::default();
        let resolver = RecordingResolver::new(Some(&records), &directory);

        let candidates = resolver
            .resolve(&claims(Some("RX1"), Some("C1"), Some("CA1")), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            urls(&candidates),
            vec![
                "https://provider.test/Recordings/RX1.mp3",
                "https://provider.test/Recordings/RX1.wav",
            ]
        );
        assert_eq!(candidates[0].format, AudioFormat::Mp3);
        assert_eq!(candidates[1].format, AudioFormat::Wav);
        assert_eq!(records.calls.load(Ordering::SeqCst), 0);
        assert_eq!(directory.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_record_with_recording_sid() {
        let mut records = FakeRecords::default();
        records.records.insert(
            "C1".into(),
            CallRecord {
                recording_sid: Some("RE5".into()),
                recording_url: Some("https://elsewhere.test/x.json".into()),
                call_sid: Some("CA5".into()),
            },
        );
        let directory = FakeDirectory::default();
        let resolver = RecordingResolver::new(Some(&records), &directory);

        let candidates = resolver
            .resolve(&claims(None, Some("C1"), None), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            urls(&candidates),
            vec![
                "https://provider.test/Recordings/RE5.mp3",
                "https://provider.test/Recordings/RE5.wav",
            ]
        );
    }

    #[tokio::test]
    async fn test_record_with_metadata_url() {
        let mut records = FakeRecords::default();
        records.records.insert(
            "C1".into(),
            CallRecord {
                recording_url: Some("https://api.provider.test/a/foo.json".into()),
                ..Default::default()
            },
        );
        let directory = FakeDirectory::default();
        let resolver = RecordingResolver::new(Some(&records), &directory);

        let candidates = resolver
            .resolve(&claims(None, Some("C1"), None), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            urls(&candidates),
            vec![
                "https://api.provider.test/a/foo.mp3",
                "https://api.provider.test/a/foo.wav",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_record_is_terminal() {
        let records = FakeRecords::default();
        let mut directory = FakeDirectory::default();
        directory.listings.insert("CA1".into(), vec!["RE1".into()]);
        let resolver = RecordingResolver::new(Some(&records), &directory);

        let err = resolver
            .resolve(&claims(None, Some("C404"), Some("CA1")), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(id) if id == "C404"));
        assert_eq!(directory.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_record_call_sid_falls_through_to_listing() {
        let mut records = FakeRecords::default();
        records.records.insert(
            "C1".into(),
            CallRecord {
                call_sid: Some("CA9".into()),
                ..Default::default()
            },
        );
        let mut directory = FakeDirectory::default();
        directory
            .listings
            .insert("CA9".into(), vec!["RE-a".into(), "RE-b".into()]);
        let resolver = RecordingResolver::new(Some(&records), &directory);

        let candidates = resolver
            .resolve(&claims(None, Some("C1"), None), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            urls(&candidates),
            vec![
                "https://provider.test/Recordings/RE-a.mp3",
                "https://provider.test/Recordings/RE-a.wav",
            ]
        );
    }

    #[tokio::test]
    async fn test_unusable_media_url_falls_through_to_call_sid() {
        let mut records = FakeRecords::default();
        records.records.insert(
            "C1".into(),
            CallRecord {
                recording_url: Some("ftp://old.test/x.json".into()),
                call_sid: Some("CA9".into()),
                ..Default::default()
            },
        );
        let mut directory = FakeDirectory::default();
        directory.listings.insert("CA9".into(), vec!["RE-z".into()]);
        let resolver = RecordingResolver::new(Some(&records), &directory);

        let candidates = resolver
            .resolve(&claims(None, Some("C1"), None), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(candidates[0].url.as_str(), "https://provider.test/Recordings/RE-z.mp3");
    }

    #[tokio::test]
    async fn test_provider_call_sid_only() {
        let records = FakeRecords::default();
        let mut directory = FakeDirectory::default();
        directory.listings.insert("CA1".into(), vec!["RE1".into()]);
        let resolver = RecordingResolver::new(Some(&records), &directory);

        let candidates = resolver
            .resolve(&claims(None, None, Some("CA1")), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(records.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_listing_failure_is_swallowed() {
        let records = FakeRecords::default();
        let directory = FakeDirectory {
            failing: true,
            ..Default::default()
        };
        let resolver = RecordingResolver::new(Some(&records), &directory);

        let err = resolver
            .resolve(&claims(None, None, Some("CA1")), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotAvailable));
        assert_eq!(directory.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_listing_without_account_sid_is_configuration_error() {
        let records = FakeRecords::default();
        let directory = FakeDirectory {
            unconfigured: true,
            ..Default::default()
        };
        let resolver = RecordingResolver::new(Some(&records), &directory);

        let err = resolver
            .resolve(&claims(None, None, Some("CA1")), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_media_url_without_file_name_falls_through_to_call_sid() {
        let mut records = FakeRecords::default();
        records.records.insert(
            "C1".into(),
            CallRecord {
                recording_url: Some("https://media.test".into()),
                call_sid: Some("CA9".into()),
                ..Default::default()
            },
        );
        let mut directory = FakeDirectory::default();
        directory.listings.insert("CA9".into(), vec!["RE-root".into()]);
        let resolver = RecordingResolver::new(Some(&records), &directory);

        let candidates = resolver
            .resolve(&claims(None, Some("C1"), None), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(candidates[0].url.as_str(), "https://provider.test/Recordings/RE-root.mp3");
        assert_eq!(directory.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_record_is_not_available() {
        let mut records = FakeRecords::default();
        records.records.insert("C1".into(), CallRecord::default());
        let directory = FakeDirectory::default();
        let resolver = RecordingResolver::new(Some(&records), &directory);

        let err = resolver
            .resolve(&claims(None, Some("C1"), None), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotAvailable));
    }

    #[tokio::test]
    async fn test_call_id_without_record_store_is_configuration_error() {
        let directory = FakeDirectory::default();
        let resolver = RecordingResolver::new(None, &directory);

        let err = resolver
            .resolve(&claims(None, Some("C1"), None), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Configuration(_)));
    }
}
