//! Request and upstream authentication
//!
//! - `capability` - signed, time-limited stream tokens (`<payload>.<signature>`)
//! - `credentials` - provider credentials reduced to `Authorization` header values

pub mod capability;
pub mod credentials;

pub use capability::{DecodedToken, StreamClaims, TokenError, decode, encode, now_millis};
pub use credentials::{CredentialKind, CredentialPair, UpstreamCredential};
