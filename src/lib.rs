//! Gateway that supervises an analytical engine and exposes its UI.
//!
//! ```text
//!                    ┌──────────────────────────── ui-gateway ───────────────────────────┐
//!                    │                                                                   │
//!                    │  lifecycle::startup                                               │
//!                    │    supervisor ──▶ bootstrap ──▶ health::readiness ──▶ net::listener│
//!                    │        │              │                │                          │
//!                    │        ▼              ▼                ▼                          │
//!                    │     engine ◀──── stdin/stdout     TCP probe                       │
//!                    │   (loopback UI)                                                   │
//!                    │        ▲                                                          │
//!  Client ───────────┼────────┴──────── forward::Forwarder (net::relay | http::server) ◀──┼── :8080
//!                    │                                                                   │
//!                    │  config · observability · resilience                              │
//!                    └───────────────────────────────────────────────────────────────────┘
//! ```

// Startup sequence
pub mod bootstrap;
pub mod health;
pub mod supervisor;

// Traffic
pub mod forward;
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::GatewayConfig;
pub use forward::Forwarder;
pub use lifecycle::{Gateway, Shutdown, StartupError};
