//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check database settings only when the database is enabled
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

use crate::config::schema::AppConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.host `{0}` is not an IP address")]
    InvalidHost(String),

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("database.{0} must not be empty when the database is enabled")]
    MissingDatabaseField(&'static str),

    #[error("database.min_idle_conns ({idle}) exceeds database.max_open_conns ({open})")]
    IdleExceedsOpen { idle: u32, open: u32 },

    #[error("database.max_open_conns must be greater than zero")]
    ZeroPoolSize,

    #[error("observability.log_level `{0}` is not one of trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("observability.metrics_address `{0}` is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.host.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::InvalidHost(config.listener.host.clone()));
    }

    if config.timeouts.shutdown_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("shutdown_secs"));
    }
    if config.timeouts.read_header_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("read_header_secs"));
    }

    let db = &config.database;
    if db.enabled {
        if db.host.is_empty() {
            errors.push(ValidationError::MissingDatabaseField("host"));
        }
        if db.user.is_empty() {
            errors.push(ValidationError::MissingDatabaseField("user"));
        }
        if db.schema.is_empty() {
            errors.push(ValidationError::MissingDatabaseField("schema"));
        }
        if db.max_open_conns == 0 {
            errors.push(ValidationError::ZeroPoolSize);
        } else if db.min_idle_conns > db.max_open_conns {
            errors.push(ValidationError::IdleExceedsOpen {
                idle: db.min_idle_conns,
                open: db.max_open_conns,
            });
        }
    }

    let obs = &config.observability;
    if !LOG_LEVELS.contains(&obs.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::InvalidLogLevel(obs.log_level.clone()));
    }
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(obs.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&AppConfig::default()), Ok(()));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = AppConfig::default();
        config.listener.host = "not-an-ip".into();
        config.timeouts.shutdown_secs = 0;
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::ZeroTimeout("shutdown_secs")));
    }

    #[test]
    fn database_checked_only_when_enabled() {
        let mut config = AppConfig::default();
        config.database.host.clear();
        assert!(validate_config(&config).is_ok());

        config.database.enabled = true;
        config.database.min_idle_conns = 30;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::MissingDatabaseField("host")));
        assert!(errors.contains(&ValidationError::IdleExceedsOpen { idle: 30, open: 25 }));
    }
}
