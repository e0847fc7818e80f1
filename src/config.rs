use crate::error::{RelayError, Result};
use std::env;
use std::path::PathBuf;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP/WebSocket server configuration
    pub server: ServerConfig,
    /// History buffer configuration
    pub history: HistoryConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on (default: 3000)
    pub port: u16,
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
    /// Allowed CORS origins (comma-separated, empty = any origin)
    pub cors_origins: Vec<String>,
    /// Directory served for non-API paths
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Maximum number of retained entries (default: 50)
    pub capacity: usize,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let capacity: usize = get_env_or("HISTORY_CAPACITY", "50").parse().map_err(|_| {
            RelayError::InvalidConfig("HISTORY_CAPACITY must be a valid number".into())
        })?;
        if capacity == 0 {
            return Err(RelayError::InvalidConfig(
                "HISTORY_CAPACITY must be at least 1".into(),
            ));
        }

        Ok(Config {
            server: ServerConfig {
                port: get_env_or("PORT", "3000").parse().map_err(|_| {
                    RelayError::InvalidConfig("PORT must be a valid port number".into())
                })?,
                host: get_env_or("HOST", "0.0.0.0"),
                cors_origins: get_env_or("CORS_ORIGINS", "")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                static_dir: PathBuf::from(get_env_or("STATIC_DIR", "public")),
            },
            history: HistoryConfig { capacity },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }

    /// Get the server listen address
    pub fn addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
