//! Startup failure taxonomy and process exit codes.

use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::config::{ConfigError, MissingConfiguration};
use crate::health::ReadinessError;
use crate::net::listener::ListenerError;
use crate::supervisor::SupervisorError;

pub const EXIT_OK: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_MISSING_CONFIGURATION: u8 = 2;
pub const EXIT_BOOTSTRAP: u8 = 3;
pub const EXIT_READINESS_TIMEOUT: u8 = 4;
pub const EXIT_PROCESS_DIED: u8 = 5;
pub const EXIT_LISTENER_BIND: u8 = 6;

/// Everything that ends the process before or instead of a clean shutdown.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    MissingConfiguration(#[from] MissingConfiguration),

    #[error("bootstrap failed after {attempts} attempt(s): {source}")]
    Bootstrap {
        attempts: u32,
        #[source]
        source: BootstrapError,
    },

    #[error(transparent)]
    Readiness(#[from] ReadinessError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("forwarding stopped unexpectedly: {0}")]
    Forwarding(#[source] std::io::Error),

    #[error("metrics exporter failed to start: {0}")]
    Metrics(String),
}

impl StartupError {
    pub fn exit_code(&self) -> u8 {
        match self {
            StartupError::Config(_) => EXIT_FAILURE,
            StartupError::MissingConfiguration(_) => EXIT_MISSING_CONFIGURATION,
            StartupError::Bootstrap { source, .. } => match source {
                BootstrapError::MissingConfiguration(_) => EXIT_MISSING_CONFIGURATION,
                _ => EXIT_BOOTSTRAP,
            },
            StartupError::Readiness(ReadinessError::Timeout { .. }) => EXIT_READINESS_TIMEOUT,
            StartupError::Readiness(ReadinessError::ProcessDied { .. }) => EXIT_PROCESS_DIED,
            StartupError::Supervisor(SupervisorError::DatabaseDir { .. }) => EXIT_FAILURE,
            StartupError::Supervisor(_) => EXIT_PROCESS_DIED,
            StartupError::Listener(_) => EXIT_LISTENER_BIND,
            StartupError::Forwarding(_) | StartupError::Metrics(_) => EXIT_FAILURE,
        }
    }
}
