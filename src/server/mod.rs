//! Server Module
//!
//! Owns the listening socket and the lifetime of every client connection.
//!
//! ## Modules
//!
//! - `config`: Bind address, join timeout and frame limit
//! - `listener`: The accept loop with `start` / `stop`

pub mod config;
pub mod listener;

pub use config::{ServerConfig, DEFAULT_JOIN_TIMEOUT};
pub use listener::{Server, ServerError};
