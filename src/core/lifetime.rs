//! Per-request liveness
//!
//! A `RequestLifetime` owns a `CancellationToken` and the `DropGuard` that fires
//! it. The guard first lives in the handler future and is then moved into the
//! response body stream, so the token is cancelled when the client goes away at
//! any stage: while resolving, while waiting for upstream headers, or mid-body.

use std::future::Future;
use thiserror::Error;
use tokio_util::sync::{CancellationToken, DropGuard};

/// The inbound request was cancelled before the operation completed
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("request cancelled")]
pub struct Cancelled;

pub struct RequestLifetime {
    token: CancellationToken,
    guard: DropGuard,
}

impl RequestLifetime {
    pub fn new() -> Self {
        let token = CancellationToken::new();
        let guard = token.clone().drop_guard();
        Self { token, guard }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Hand the guard to whatever outlives the handler (the response body)
    pub fn into_guard(self) -> DropGuard {
        self.guard
    }
}

impl Default for RequestLifetime {
    fn default() -> Self {
        Self::new()
    }
}

/// Race `fut` against `token`; the in-flight future is dropped on cancellation
pub async fn cancellable<F>(token: &CancellationToken, fut: F) -> Result<F::Output, Cancelled>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Cancelled),
        output = fut => Ok(output),
    }
}
