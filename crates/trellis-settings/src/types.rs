//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may contain any subset of fields; missing ones keep their default.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the Trellis service.
///
/// ```json
/// {
///   "server": { "port": 8000 },
///   "database": { "path": "/var/lib/trellis/trellis.db" },
///   "auth": { "jwtSecret": "change-me" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrellisSettings {
    /// HTTP listener settings.
    pub server: ServerSettings,
    /// `SQLite` database settings.
    pub database: DatabaseSettings,
    /// Bearer token verification settings.
    pub auth: AuthSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Task listing behavior.
    pub tasks: TaskSettings,
}

/// HTTP listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Seconds to wait for in-flight requests on shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            shutdown_timeout_secs: 30,
        }
    }
}

/// `SQLite` database settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// Database file path. Relative paths resolve against `~/.trellis`.
    pub path: String,
    /// Maximum pooled connections.
    pub pool_size: u32,
    /// `SQLite` busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "trellis.db".to_string(),
            pool_size: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

/// Bearer token verification settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// HMAC secret used to verify HS256 bearer tokens.
    pub jwt_secret: String,
    /// Clock skew tolerated when checking `exp`, in seconds.
    pub leeway_secs: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            leeway_secs: 30,
        }
    }
}

impl AuthSettings {
    /// The signing secret, or [`SettingsError::InvalidValue`] when unset.
    pub fn require_secret(&self) -> Result<&str> {
        if self.jwt_secret.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "auth.jwtSecret is not set (settings file or TRELLIS_JWT_SECRET)".into(),
            ));
        }
        Ok(&self.jwt_secret)
    }
}

/// Log verbosity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level (most verbose).
    Trace,
    /// Debug-level.
    Debug,
    /// Info-level (default).
    #[default]
    Info,
    /// Warning-level.
    Warn,
    /// Error-level.
    Error,
}

impl LogLevel {
    /// Convert to a tracing filter string.
    pub fn as_filter_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log line format on stderr.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level. `RUST_LOG` takes precedence when set.
    pub level: LogLevel,
    /// Output format.
    pub format: LogFormat,
}

/// Task listing behavior.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskSettings {
    /// Page size used when the caller gives none.
    pub default_page_size: u32,
    /// Upper bound for a caller-supplied page size.
    pub max_page_size: u32,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = TrellisSettings::default();
        assert_eq!(s.server.host, "127.0.0.1");
        assert_eq!(s.server.port, 8000);
        assert_eq!(s.database.path, "trellis.db");
        assert_eq!(s.database.pool_size, 8);
        assert!(s.auth.jwt_secret.is_empty());
        assert_eq!(s.logging.level, LogLevel::Info);
        assert_eq!(s.logging.format, LogFormat::Compact);
        assert_eq!(s.tasks.default_page_size, 10);
        assert_eq!(s.tasks.max_page_size, 100);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(TrellisSettings::default()).unwrap();
        assert!(json["database"].get("busyTimeoutMs").is_some());
        assert!(json["auth"].get("jwtSecret").is_some());
        assert!(json["tasks"].get("defaultPageSize").is_some());
        assert!(json["server"].get("shutdownTimeoutSecs").is_some());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let s: TrellisSettings =
            serde_json::from_str(r#"{"server": {"port": 9000}, "logging": {"format": "json"}}"#)
                .unwrap();
        assert_eq!(s.server.port, 9000);
        assert_eq!(s.server.host, "127.0.0.1");
        assert_eq!(s.logging.format, LogFormat::Json);
        assert_eq!(s.logging.level, LogLevel::Info);
    }

    #[test]
    fn log_level_filter_strings() {
        assert_eq!(LogLevel::Trace.as_filter_str(), "trace");
        assert_eq!(LogLevel::Warn.as_filter_str(), "warn");
        assert_eq!(LogLevel::Error.as_filter_str(), "error");
    }

    #[test]
    fn blank_secret_is_invalid() {
        let mut auth = AuthSettings::default();
        assert!(matches!(
            auth.require_secret(),
            Err(SettingsError::InvalidValue(msg)) if msg.contains("jwtSecret")
        ));
        auth.jwt_secret = "   ".into();
        assert!(auth.require_secret().is_err());
        auth.jwt_secret = "s3cret".into();
        assert_eq!(auth.require_secret().unwrap(), "s3cret");
    }
}
