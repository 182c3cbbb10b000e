//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{var} must be an integer: {source}")]
    Env {
        var: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("Validation failed: {}", render(.0))]
    Validation(Vec<ValidationError>),
}

fn render(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay `APP_PORT` and `DB_*` environment variables onto `config`.
pub fn apply_env(config: &mut AppConfig) -> Result<(), ConfigError> {
    apply_vars(config, |var| std::env::var(var).ok())
}

fn apply_vars<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let port = |var: &'static str, value: String| {
        value
            .trim()
            .parse::<u16>()
            .map_err(|source| ConfigError::Env { var, source })
    };

    if let Some(value) = lookup("APP_PORT").filter(|v| !v.is_empty()) {
        config.listener.port = port("APP_PORT", value)?;
    }
    if let Some(value) = lookup("DB_HOST") {
        config.database.host = value;
    }
    if let Some(value) = lookup("DB_PORT").filter(|v| !v.is_empty()) {
        config.database.port = port("DB_PORT", value)?;
    }
    if let Some(value) = lookup("DB_USER") {
        config.database.user = value;
    }
    if let Some(value) = lookup("DB_PASS") {
        config.database.password = value;
    }

    validate_config(config).map_err(ConfigError::Validation)
}
