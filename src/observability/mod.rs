//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, loopback by default)
//! ```
//!
//! # Design Decisions
//! - Session and request IDs flow through every log line
//! - Engine stderr is re-emitted under the `engine` target
//! - Credentials are never fields of a log event

pub mod logging;
pub mod metrics;
