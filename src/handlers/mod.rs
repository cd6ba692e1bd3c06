//! HTTP request handlers
//!
//! - `api` - Health check endpoint
//! - `stream` - Capability-token authenticated recording stream

pub mod api;
pub mod stream;

pub use stream::stream_call_recording;
