//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted client connection (external endpoint)
//!     → listener.rs (bind, bind failures surface with the endpoint)
//!     → connection.rs (session id, live-session count)
//!     → relay.rs (tcp mode: byte splice to the internal endpoint)
//!
//! External endpoint: all interfaces   Internal endpoint: loopback
//! ```
//!
//! # Design Decisions
//! - One upstream connection per client connection
//! - Each session tracked for graceful shutdown
//! - `localhost` means both address families to the prober

pub mod connection;
pub mod endpoint;
pub mod listener;
pub mod relay;

pub use endpoint::{BindScope, ServiceEndpoint};
pub use relay::TcpRelay;
