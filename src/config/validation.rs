//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Reject an external port that collides with the internal one
//!
//! Returns all validation errors, not just the first.

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::GatewayConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("`{field}` must be non-zero")]
    Zero { field: &'static str },

    #[error("`{field}` must not be empty")]
    Empty { field: &'static str },

    #[error("external port {0} is also the internal service port; they must differ")]
    PortCollision(u16),

    #[error("`{field}` must start with '/': {value:?}")]
    RelativePath { field: &'static str, value: String },

    #[error("`{field}` is not a socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut non_zero = |field: &'static str, value: u64| {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    };
    non_zero("listener.port", config.listener.port.into());
    non_zero("internal.port", config.internal.port.into());
    non_zero("bootstrap.max_attempts", config.bootstrap.max_attempts.into());
    non_zero(
        "bootstrap.statement_timeout_secs",
        config.bootstrap.statement_timeout_secs,
    );
    non_zero("readiness.timeout_secs", config.readiness.timeout_secs);
    non_zero("readiness.interval_ms", config.readiness.interval_ms);
    non_zero(
        "readiness.connect_timeout_ms",
        config.readiness.connect_timeout_ms,
    );
    non_zero("forward.connect_timeout_ms", config.forward.connect_timeout_ms);
    non_zero("forward.half_close_grace_ms", config.forward.half_close_grace_ms);
    non_zero(
        "forward.response_header_timeout_secs",
        config.forward.response_header_timeout_secs,
    );

    if config.listener.port != 0 && config.listener.port == config.internal.port {
        errors.push(ValidationError::PortCollision(config.listener.port));
    }

    if config.engine.command.trim().is_empty() {
        errors.push(ValidationError::Empty {
            field: "engine.command",
        });
    }
    if config.internal.host.trim().is_empty() {
        errors.push(ValidationError::Empty {
            field: "internal.host",
        });
    }
    if config.engine.views.iter().any(|v| v.name.trim().is_empty()) {
        errors.push(ValidationError::Empty {
            field: "engine.views.name",
        });
    }

    if let Some(path) = &config.forward.health_path {
        if !path.starts_with('/') {
            errors.push(ValidationError::RelativePath {
                field: "forward.health_path",
                value: path.clone(),
            });
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
