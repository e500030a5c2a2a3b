//! Listener Configuration

use crate::protocol::MAX_FRAME_SIZE;
use crate::{DEFAULT_HOST, DEFAULT_PORT};
use std::time::Duration;

/// Default time `stop()` waits for connections to close (1 second)
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Settings for the listening server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// How long `stop()` waits for connection tasks before aborting them
    pub join_timeout: Duration,
    /// Largest incomplete request a connection will buffer
    pub max_frame_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl ServerConfig {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:9876");
        assert_eq!(config.join_timeout, Duration::from_secs(1));
        assert_eq!(config.max_frame_size, 1024 * 1024);
    }
}
