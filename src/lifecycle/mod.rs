//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Credentials → Launch engine → Bootstrap (retry) → Readiness
//!     → Pre-warm → Bind external listener → Forward
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain sessions → Stop engine → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     Second signal → Exit immediately
//!
//! Exit codes (error.rs):
//!     0 clean, 1 other, 2 missing config, 3 bootstrap,
//!     4 readiness timeout, 5 engine died, 6 listener bind
//! ```
//!
//! # Design Decisions
//! - Ordered startup: nothing is exposed before the engine is ready
//! - Ordered shutdown: stop accept, drain, then the engine
//! - Shutdown has timeouts: drain grace, then engine stop grace

pub mod error;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use error::StartupError;
pub use shutdown::Shutdown;
pub use startup::Gateway;
