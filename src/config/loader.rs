//! Configuration loading: defaults, then an optional TOML file, then
//! environment overrides.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value `{value}` for `{key}`")]
    InvalidVar { key: &'static str, value: String },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration using the process environment.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Load configuration with an explicit variable source.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, &lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = optional(lookup, "PORT") {
        config.listener.port = parse_var("PORT", value)?;
    }
    if let Some(value) = optional(lookup, "UI_PORT") {
        config.internal.port = parse_var("UI_PORT", value)?;
    }
    if let Some(value) = optional(lookup, "MEMORY_LIMIT") {
        config.engine.memory_limit = value;
    }
    if let Some(value) = optional(lookup, "FORWARD_MODE") {
        config.forward.mode = parse_var("FORWARD_MODE", value)?;
    }
    if let Some(value) = optional(lookup, "LOG_LEVEL") {
        config.observability.log_level = value;
    }
    Ok(())
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn parse_var<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidVar { key, value })
}
