//! Client-facing forwarding.
//!
//! # Data Flow
//! ```text
//! External listener (bound only after readiness)
//!     → Forwarder::Tcp  (net::relay, opaque bytes)
//!     → Forwarder::Http (http::server, streaming reverse proxy)
//!     → Internal endpoint (engine UI)
//! ```
//!
//! Both modes share one contract: every client connection gets its own
//! upstream connection, upstream failures close only the affected session,
//! and a shutdown signal stops accepting before in-flight work is drained.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use crate::config::{ForwardConfig, ForwardMode};
use crate::http::HttpProxy;
use crate::net::TcpRelay;

#[derive(Debug, Error)]
pub enum ForwardingError {
    #[error("upstream {addr} refused the connection: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("connecting to upstream {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: SocketAddr, timeout: Duration },
}

/// Open one upstream connection with a deadline.
pub async fn connect_upstream(
    addr: SocketAddr,
    timeout: Duration,
) -> Result<TcpStream, ForwardingError> {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(ForwardingError::Connect { addr, source }),
        Err(_) => Err(ForwardingError::ConnectTimeout { addr, timeout }),
    }
}

/// The forwarding strategy picked by `forward.mode`.
pub enum Forwarder {
    Tcp(TcpRelay),
    Http(HttpProxy),
}

impl Forwarder {
    pub fn from_config(config: &ForwardConfig) -> Self {
        match config.mode {
            ForwardMode::Tcp => Forwarder::Tcp(TcpRelay::new(config)),
            ForwardMode::Http => Forwarder::Http(HttpProxy::new(config)),
        }
    }

    pub fn mode(&self) -> ForwardMode {
        match self {
            Forwarder::Tcp(_) => ForwardMode::Tcp,
            Forwarder::Http(_) => ForwardMode::Http,
        }
    }

    /// Serve `listener` until `shutdown` fires and in-flight work drains.
    pub async fn run(
        self,
        listener: TcpListener,
        upstream: SocketAddr,
        shutdown: broadcast::Receiver<()>,
    ) -> std::io::Result<()> {
        match self {
            Forwarder::Tcp(relay) => relay.run(listener, upstream, shutdown).await,
            Forwarder::Http(proxy) => proxy.run(listener, upstream, shutdown).await,
        }
    }
}
