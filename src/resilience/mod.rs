//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Engine launch + bootstrap fails:
//!     → backoff.rs (RetryPolicy: attempts left? how long to wait?)
//!     → relaunch from scratch, or give up with the last error
//! ```
//!
//! # Design Decisions
//! - Only bootstrap failures are retried; readiness and bind failures are final
//! - Jitter keeps restarts of many replicas from lining up

pub mod backoff;

pub use backoff::{calculate_backoff, RetryPolicy};
