pub mod candidate;
pub mod fetcher;
pub mod lifetime;
pub mod provider;
pub mod record_store;
pub mod resolver;
pub mod responder;

// Re-export commonly used types for convenience
pub use candidate::{AudioFormat, MediaCandidate, candidates_from_media_url};
pub use fetcher::{FetchError, FetchMethod, FetchRequest, UpstreamFetcher, UpstreamResponse};
pub use lifetime::{Cancelled, RequestLifetime, cancellable};
pub use provider::{ProviderClient, ProviderError, RecordingDirectory};
pub use record_store::{CallRecord, CallRecordSource, RecordStoreClient, RecordStoreError, SessionCache};
pub use resolver::{RecordingResolver, ResolveError};
pub use responder::respond;
