//! Engine health subsystem.
//!
//! # Data Flow
//! ```text
//! Engine launched and bootstrapped
//!     → readiness.rs (liveness check, then TCP probe, every interval)
//!         Starting → Probing → Ready(addr) | Failed(reason)
//!     → prewarm.rs (optional first request, best effort)
//!     → Forwarding armed with the accepting address
//! ```
//!
//! # Design Decisions
//! - Readiness is decided once; afterwards failures surface per session
//! - A dead process ends the wait immediately
//! - Timeouts carry the engine's last diagnostic lines

pub mod prewarm;
pub mod readiness;

pub use prewarm::prewarm;
pub use readiness::{Liveness, ProbeSettings, ReadinessError, ReadinessProbe, ReadinessState};
