//! Error types shared across the gateway
//!
//! - `stream_error` - request-level taxonomy for the recording stream endpoint,
//!   rendered as `{"error": "..."}` JSON bodies
//! - `config_error` - configuration loading and validation failures

pub mod config_error;
pub mod stream_error;

pub use config_error::ConfigError;
pub use stream_error::{StreamError, StreamResult};
