//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection (hyper, HTTP/1.1 + upgrades)
//!     → server.rs (request id, tracing, health route)
//!     → request.rs (hop-by-hop strip, Host rewrite, x-forwarded-*)
//!     → upstream client (one request per client request, body streamed)
//!     → response.rs (hop-by-hop strip, body streamed back)
//!     → upgrade.rs (101: splice both raw connections)
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod upgrade;

pub use server::{HttpProxy, MakeRequestUuid};
