//! Web server configuration.

use crate::error::{Result, StationError};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Configuration for the web server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Host to bind the server to
    pub host: String,
    /// Port to bind the server to
    pub port: u16,
    /// Whether to answer cross-origin requests permissively
    pub enable_cors: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: crate::DEFAULT_WEB_PORT,
            enable_cors: true,
        }
    }
}

impl WebConfig {
    /// Create a new web configuration with custom host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Enable or disable CORS.
    pub fn with_cors(mut self, enable_cors: bool) -> Self {
        self.enable_cors = enable_cors;
        self
    }

    /// Get the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parse the bind address; the host must be an IP literal.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_address().parse().map_err(|e| {
            StationError::config_error(format!(
                "Invalid bind address '{}': {}",
                self.bind_address(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_addr() {
        let addr = WebConfig::new("127.0.0.1", 8123).socket_addr().unwrap();
        assert_eq!(addr, SocketAddr::from(([127, 0, 0, 1], 8123)));

        let v6 = WebConfig::new("[::1]", 8000).socket_addr().unwrap();
        assert!(v6.is_ipv6());
    }

    #[test]
    fn test_hostname_is_rejected() {
        let err = WebConfig::new("weather.local", 8000).socket_addr().unwrap_err();
        assert!(matches!(err, StationError::Config(_)));
        assert!(err.to_string().contains("weather.local:8000"));
    }
}
