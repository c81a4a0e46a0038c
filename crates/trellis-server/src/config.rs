//! Server configuration.

use serde::{Deserialize, Serialize};
use trellis_settings::TrellisSettings;

/// Configuration for the Trellis HTTP server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Seconds to wait for in-flight requests on shutdown.
    pub shutdown_timeout_secs: u64,
    /// HS256 secret for bearer tokens.
    pub jwt_secret: String,
    /// Clock skew tolerated when checking `exp`.
    pub jwt_leeway_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            shutdown_timeout_secs: 30,
            jwt_secret: String::new(),
            jwt_leeway_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &TrellisSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            shutdown_timeout_secs: settings.server.shutdown_timeout_secs,
            jwt_secret: settings.auth.jwt_secret.clone(),
            jwt_leeway_secs: settings.auth.leeway_secs,
        }
    }

    /// `host:port` suitable for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
