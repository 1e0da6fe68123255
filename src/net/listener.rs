//! External TCP listener.
//!
//! # Responsibilities
//! - Bind the external endpoint
//! - Surface bind failures as a distinct, fatal error

use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::net::endpoint::ServiceEndpoint;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },
}

/// Bind the given endpoint.
pub async fn bind(endpoint: &ServiceEndpoint) -> Result<TcpListener, ListenerError> {
    let to_error = |source| ListenerError::Bind {
        endpoint: endpoint.to_string(),
        source,
    };

    let addr: SocketAddr = endpoint.bind_addr().map_err(to_error)?;
    let listener = TcpListener::bind(addr).await.map_err(to_error)?;
    let local_addr = listener.local_addr().map_err(to_error)?;

    tracing::info!(address = %local_addr, "Listener bound");
    Ok(listener)
}
