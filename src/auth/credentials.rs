use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Which provider credential scheme a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    /// Account SID + auth token
    Account,
    /// API key SID + API key secret
    ApiKey,
}

impl CredentialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKind::Account => "account",
            CredentialKind::ApiKey => "api_key",
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider credential, reducible to an HTTP Basic `Authorization` value
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct UpstreamCredential {
    #[zeroize(skip)]
    kind: CredentialKind,
    username: String,
    secret: String,
}

impl UpstreamCredential {
    pub fn new(kind: CredentialKind, username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            kind,
            username: username.into(),
            secret: secret.into(),
        }
    }

    pub fn kind(&self) -> CredentialKind {
        self.kind
    }

    pub fn authorization_header(&self) -> String {
        let raw = format!("{}:{}", self.username, self.secret);
        format!("Basic {}", STANDARD.encode(raw.as_bytes()))
    }
}

impl fmt::Debug for UpstreamCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamCredential")
            .field("kind", &self.kind)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Primary credential plus an optional fallback used on 401/403
///
/// The account credential is primary when present. With only an API key
/// configured the API key becomes primary and there is no fallback.
#[derive(Debug, Clone, Default)]
pub struct CredentialPair {
    primary: Option<UpstreamCredential>,
    secondary: Option<UpstreamCredential>,
}

impl CredentialPair {
    pub fn new(account: Option<UpstreamCredential>, api_key: Option<UpstreamCredential>) -> Self {
        match (account, api_key) {
            (Some(account), api_key) => Self {
                primary: Some(account),
                secondary: api_key,
            },
            (None, api_key) => Self {
                primary: api_key,
                secondary: None,
            },
        }
    }

    pub fn primary(&self) -> Option<&UpstreamCredential> {
        self.primary.as_ref()
    }

    pub fn secondary(&self) -> Option<&UpstreamCredential> {
        self.secondary.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none()
    }
}
