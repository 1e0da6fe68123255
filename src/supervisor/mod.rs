//! Process supervisor subsystem.
//!
//! # Data Flow
//! ```text
//! LaunchSpec (engine command + database path)
//!     → process.rs (spawn, piped stdio, kill on drop)
//!     → stdin/stdout handed to the bootstrap control channel
//!     → stderr → tracing (target `engine`) + tail.rs
//!     → ProcessHandle (poll_exit before readiness, supervise after)
//! ```
//!
//! # Design Decisions
//! - One child per engine instance; a relaunch drops the previous handle
//! - Exit polling never blocks the readiness loop
//! - Stop is SIGTERM first, SIGKILL after the grace period

pub mod process;
pub mod tail;

pub use process::{launch, prepare_database, LaunchSpec, LaunchedProcess, ProcessHandle, SupervisorError};
pub use tail::LogTail;
