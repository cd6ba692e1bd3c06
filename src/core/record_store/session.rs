//! Process-wide record store login session
//!
//! Reads are lock-free (`ArcSwapOption::load_full`). Refreshes are not
//! serialized: concurrent requests that all observe a stale session may each
//! log in, and the last `store` wins. Login is idempotent, so the only cost is
//! a few redundant calls at TTL boundaries.

use arc_swap::ArcSwapOption;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use zeroize::Zeroizing;

pub struct Session {
    token: Zeroizing<String>,
    issued_at: Instant,
}

impl Session {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn age(&self) -> Duration {
        self.issued_at.elapsed()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("issued_at", &self.issued_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct SessionCache {
    slot: ArcSwapOption<Session>,
    ttl: Duration,
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slot: ArcSwapOption::empty(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached session, if one exists and is younger than the TTL
    pub fn current(&self) -> Option<Arc<Session>> {
        self.slot
            .load_full()
            .filter(|session| session.age() < self.ttl)
    }

    pub fn store(&self, token: String) -> Arc<Session> {
        let session = Arc::new(Session {
            token: Zeroizing::new(token),
            issued_at: Instant::now(),
        });
        self.slot.store(Some(session.clone()));
        session
    }

    pub fn invalidate(&self) {
        self.slot.store(None);
    }
}
