//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.
//! Object-store credentials are deliberately absent: they come from the
//! environment only (see [`crate::config::credentials`]).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::net::endpoint::ServiceEndpoint;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// External listener (the single publicly reachable port).
    pub listener: ListenerConfig,

    /// Where the supervised engine serves its UI.
    pub internal: InternalConfig,

    /// Engine process and bootstrap content.
    pub engine: EngineConfig,

    /// Bootstrap retry policy.
    pub bootstrap: BootstrapConfig,

    /// Readiness probing.
    pub readiness: ReadinessConfig,

    /// Forwarding layer settings.
    pub forward: ForwardConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// External port. Always bound on all interfaces.
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl ListenerConfig {
    pub fn endpoint(&self) -> ServiceEndpoint {
        ServiceEndpoint::external(self.port)
    }
}

/// Internal UI endpoint of the supervised engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InternalConfig {
    /// Host the engine UI binds to (e.g., "localhost", "127.0.0.1", "::1").
    pub host: String,

    /// Port the engine UI binds to. Distinct from the external port.
    pub port: u16,
}

impl Default for InternalConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 4213,
        }
    }
}

impl InternalConfig {
    pub fn endpoint(&self) -> ServiceEndpoint {
        ServiceEndpoint::internal(&self.host, self.port)
    }
}

/// Engine process and the content of its bootstrap plan.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Program to launch.
    pub command: String,

    /// Arguments placed before the database path.
    pub args: Vec<String>,

    /// Directory holding `<bucket>.duckdb`.
    pub database_dir: String,

    /// Engine home directory (UI state lives here).
    pub home_directory: String,

    /// Memory limit hint passed to the engine.
    pub memory_limit: String,

    /// Worker threads inside the engine.
    pub threads: u32,

    /// Spill directory.
    pub temp_directory: String,

    /// Cap on spill size.
    pub max_temp_directory_size: String,

    /// Additional `SET name = value` settings, applied after the built-in ones.
    pub settings: BTreeMap<String, String>,

    /// Extensions installed and loaded in order.
    pub extensions: Vec<String>,

    /// Name of the object-store secret.
    pub secret_name: String,

    /// Object-store region.
    pub region: String,

    /// Object-store URL style ("path" or "vhost").
    pub url_style: String,

    /// Prefix under the bucket scanned for `*.parquet` files, one view each.
    pub view_prefix: Option<String>,

    /// Explicitly declared views.
    pub views: Vec<ViewConfig>,

    /// Statement that turns off UI authentication, if the engine has any.
    pub disable_auth_statement: Option<String>,

    /// Time the engine gets to exit after SIGTERM before it is killed.
    pub stop_grace_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: "duckdb".to_string(),
            args: vec!["-bail".into(), "-csv".into(), "-noheader".into()],
            database_dir: "/app/data".to_string(),
            home_directory: "/home/nobody".to_string(),
            memory_limit: "1GB".to_string(),
            threads: 1,
            temp_directory: "/tmp".to_string(),
            max_temp_directory_size: "512MB".to_string(),
            settings: BTreeMap::new(),
            extensions: vec!["httpfs".into(), "aws".into(), "ui".into()],
            secret_name: "garment_minio".to_string(),
            region: "us-east-1".to_string(),
            url_style: "path".to_string(),
            view_prefix: Some("db_zstd".to_string()),
            views: Vec::new(),
            disable_auth_statement: None,
            stop_grace_secs: 5,
        }
    }
}

impl EngineConfig {
    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }
}

/// A view registered over a remote location.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ViewConfig {
    pub name: String,
    pub location: String,
}

/// Bootstrap retry policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Launch + bootstrap attempts before giving up.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Deadline for a single directive in seconds.
    pub statement_timeout_secs: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 5000,
            statement_timeout_secs: 120,
        }
    }
}

impl BootstrapConfig {
    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_secs)
    }
}

/// Readiness probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Overall bound in seconds.
    pub timeout_secs: u64,

    /// Poll interval in milliseconds.
    pub interval_ms: u64,

    /// Per-attempt connect timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Optional warm-up request once the port accepts.
    pub prewarm: PrewarmConfig,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 90,
            interval_ms: 1000,
            connect_timeout_ms: 1000,
            prewarm: PrewarmConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PrewarmConfig {
    pub enabled: bool,
    pub path: String,
    /// Total time spent retrying in seconds.
    pub timeout_secs: u64,
    /// Per-request timeout in seconds.
    pub attempt_timeout_secs: u64,
}

impl Default for PrewarmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/".to_string(),
            timeout_secs: 25,
            attempt_timeout_secs: 5,
        }
    }
}

/// Forwarding fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ForwardMode {
    /// Transport-level byte relay.
    Tcp,
    /// Streaming HTTP reverse proxy.
    #[default]
    Http,
}

impl ForwardMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForwardMode::Tcp => "tcp",
            ForwardMode::Http => "http",
        }
    }
}

impl fmt::Display for ForwardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForwardMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(ForwardMode::Tcp),
            "http" => Ok(ForwardMode::Http),
            other => Err(format!("unknown forward mode `{}` (expected tcp or http)", other)),
        }
    }
}

/// Forwarding layer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardConfig {
    pub mode: ForwardMode,

    /// Upstream connect timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// How long the second direction of a relayed session may outlive the first.
    pub half_close_grace_ms: u64,

    /// Bound on draining sessions at shutdown, in seconds.
    pub drain_grace_secs: u64,

    /// Deadline for upstream response headers (HTTP mode), in seconds.
    pub response_header_timeout_secs: u64,

    /// Path answered locally in HTTP mode.
    pub health_path: Option<String>,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            mode: ForwardMode::default(),
            connect_timeout_ms: 5000,
            half_close_grace_ms: 2000,
            drain_grace_secs: 10,
            response_header_timeout_secs: 60,
            health_path: Some("/health".to_string()),
        }
    }
}

impl ForwardConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn half_close_grace(&self) -> Duration {
        Duration::from_millis(self.half_close_grace_ms)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_secs(self.drain_grace_secs)
    }

    pub fn response_header_timeout(&self) -> Duration {
        Duration::from_secs(self.response_header_timeout_secs)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

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
            log_format: LogFormat::default(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
