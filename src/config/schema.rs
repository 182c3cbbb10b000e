//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the API server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind host and port).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Database connection settings.
    pub database: DatabaseConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0" for all interfaces).
    pub host: String,

    /// Port to bind. 0 lets the OS pick a free port.
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Timeout configuration for the server lifecycle.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed for in-flight connections to drain after cancellation, in seconds.
    pub shutdown_secs: u64,

    /// Time allowed for a client to send request headers, in seconds.
    pub read_header_secs: u64,
}

impl TimeoutConfig {
    pub fn shutdown(&self) -> Duration {
        Duration::from_secs(self.shutdown_secs)
    }

    pub fn read_header(&self) -> Duration {
        Duration::from_secs(self.read_header_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            shutdown_secs: 5,
            read_header_secs: 10,
        }
    }
}

/// MySQL connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connect to the database on startup.
    pub enabled: bool,

    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,

    /// Schema (database name) to select.
    pub schema: String,

    /// Maximum open connections in the pool.
    pub max_open_conns: u32,

    /// Connections the pool keeps open even when idle.
    pub min_idle_conns: u32,

    /// Idle connection lifetime in seconds.
    pub max_idle_secs: u64,

    /// Maximum connection lifetime in seconds.
    pub max_lifetime_secs: u64,

    /// Connection acquire timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            schema: "api_server".to_string(),
            max_open_conns: 25,
            min_idle_conns: 0,
            max_idle_secs: 5 * 60,
            max_lifetime_secs: 2 * 60 * 60,
            connect_timeout_secs: 60,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, colored output for development.
    #[default]
    Pretty,
    /// One JSON object per line for log aggregation.
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
