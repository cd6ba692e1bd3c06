pub mod auth;
pub mod config;
pub mod core;
pub mod errors;
pub mod handlers;
pub mod routes;
pub mod state;

// Re-export commonly used items for convenience
pub use config::ServerConfig;
pub use core::*;
pub use errors::{ConfigError, StreamError, StreamResult};
pub use routes::create_app;
pub use state::AppState;
