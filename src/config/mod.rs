//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (serde(default))
//!     → config file (TOML, optional)
//!     → loader.rs (environment overrides: PORT, UI_PORT, MEMORY_LIMIT, ...)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!
//! environment only:
//!     → credentials.rs (object-store credentials, redacted secrets)
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup and never changes afterwards
//! - All fields have defaults to allow minimal configs
//! - Credentials never touch the config file

pub mod credentials;
pub mod loader;
pub mod schema;
pub mod validation;

pub use credentials::{Credentials, MissingConfiguration, Secret};
pub use loader::{load_config, ConfigError};
pub use schema::{
    BootstrapConfig, EngineConfig, ForwardConfig, ForwardMode, GatewayConfig, InternalConfig,
    ListenerConfig, LogFormat, ObservabilityConfig, PrewarmConfig, ReadinessConfig, ViewConfig,
};
