//! External call record store
//!
//! The record store is the system of record for call metadata. The gateway only
//! reads from it: log in with the admin account, then fetch a `CallRecord`
//! entity by id to learn where the recording lives.

mod client;
mod session;

pub use client::{
    CallRecord, CallRecordSource, DEFAULT_RECORD_STORE_BASE_URL, RecordStoreClient, RecordStoreError,
};
pub use session::{Session, SessionCache};
