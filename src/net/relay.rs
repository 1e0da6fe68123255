//! Transport-level relay (forward mode `tcp`).
//!
//! Every accepted connection becomes a [`ForwardSession`] that owns exactly
//! one upstream connection. Bytes are copied in both directions until either
//! side finishes; the other direction then gets `half_close_grace` to finish
//! on its own before both sockets are dropped.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use crate::config::ForwardConfig;
use crate::forward::connect_upstream;
use crate::net::connection::{SessionGuard, SessionId, SessionTracker};
use crate::observability::metrics;

#[derive(Debug, Clone, Copy)]
struct RelaySettings {
    connect_timeout: Duration,
    half_close_grace: Duration,
}

/// The byte relay.
#[derive(Debug, Clone)]
pub struct TcpRelay {
    settings: RelaySettings,
    drain_grace: Duration,
    sessions: SessionTracker,
}

impl TcpRelay {
    pub fn new(config: &ForwardConfig) -> Self {
        Self {
            settings: RelaySettings {
                connect_timeout: config.connect_timeout(),
                half_close_grace: config.half_close_grace(),
            },
            drain_grace: config.drain_grace(),
            sessions: SessionTracker::new(),
        }
    }

    /// Accept until `shutdown` fires, then close sessions and wait for them
    /// for at most the drain grace period.
    pub async fn run(
        self,
        listener: TcpListener,
        upstream: SocketAddr,
        mut shutdown: broadcast::Receiver<()>,
    ) -> std::io::Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!(address = %local_addr, upstream = %upstream, "TCP relay accepting connections");

        let (stop_tx, _) = broadcast::channel::<()>(1);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((client, peer)) => {
                        let guard = self.sessions.track();
                        let stop = stop_tx.subscribe();
                        let settings = self.settings;
                        tokio::spawn(relay_session(client, peer, upstream, settings, guard, stop));
                    }
                    Err(e) => {
                        // Usually descriptor exhaustion; back off instead of spinning.
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
                _ = shutdown.recv() => break,
            }
        }

        drop(listener);
        let open = self.sessions.active_count();
        tracing::info!(open_sessions = open, "TCP relay stopped accepting; closing sessions");
        let _ = stop_tx.send(());

        if !self.sessions.wait_idle(self.drain_grace).await {
            tracing::warn!(
                remaining = self.sessions.active_count(),
                "Drain grace elapsed with sessions still open"
            );
        }
        Ok(())
    }
}

async fn relay_session(
    client: TcpStream,
    peer: SocketAddr,
    upstream_addr: SocketAddr,
    settings: RelaySettings,
    guard: SessionGuard,
    mut stop: broadcast::Receiver<()>,
) {
    let id = guard.id();
    let upstream = match connect_upstream(upstream_addr, settings.connect_timeout).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(session = %id, peer = %peer, error = %e, "Forwarding failed");
            metrics::record_session("tcp", "upstream_unavailable");
            return;
        }
    };

    let _ = client.set_nodelay(true);
    let _ = upstream.set_nodelay(true);
    tracing::debug!(session = %id, peer = %peer, upstream = %upstream_addr, "Session opened");

    let outcome = ForwardSession::new(id, client, upstream)
        .splice(settings.half_close_grace, &mut stop)
        .await;

    metrics::record_bytes("inbound", outcome.inbound_bytes);
    metrics::record_bytes("outbound", outcome.outbound_bytes);
    metrics::record_session("tcp", outcome.label());
    tracing::debug!(
        session = %id,
        inbound_bytes = outcome.inbound_bytes,
        outbound_bytes = outcome.outbound_bytes,
        outcome = outcome.label(),
        "Session finished"
    );
    drop(guard);
}

/// How a spliced session ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpliceOutcome {
    /// Client → upstream.
    pub inbound_bytes: u64,
    /// Upstream → client.
    pub outbound_bytes: u64,
    /// The second direction was cut off after the grace period.
    pub forced_close: bool,
    /// Shutdown closed the session.
    pub cancelled: bool,
}

impl SpliceOutcome {
    pub fn label(&self) -> &'static str {
        if self.cancelled {
            "cancelled"
        } else if self.forced_close {
            "forced_close"
        } else {
            "completed"
        }
    }
}

/// One client connection paired with one upstream connection.
pub struct ForwardSession<C, U> {
    id: SessionId,
    client: C,
    upstream: U,
}

impl<C, U> ForwardSession<C, U>
where
    C: AsyncRead + AsyncWrite + Unpin,
    U: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(id: SessionId, client: C, upstream: U) -> Self {
        Self {
            id,
            client,
            upstream,
        }
    }

    /// Copy both directions until one finishes, give the other
    /// `grace` to finish, then drop both sides.
    pub async fn splice(self, grace: Duration, stop: &mut broadcast::Receiver<()>) -> SpliceOutcome {
        let id = self.id;
        let (mut client_read, mut client_write) = tokio::io::split(self.client);
        let (mut upstream_read, mut upstream_write) = tokio::io::split(self.upstream);

        let inbound = async {
            let copied = tokio::io::copy(&mut client_read, &mut upstream_write).await;
            let _ = upstream_write.shutdown().await;
            copied.unwrap_or(0)
        };
        let outbound = async {
            let copied = tokio::io::copy(&mut upstream_read, &mut client_write).await;
            let _ = client_write.shutdown().await;
            copied.unwrap_or(0)
        };
        tokio::pin!(inbound);
        tokio::pin!(outbound);

        let mut outcome = SpliceOutcome::default();
        tokio::select! {
            bytes = &mut inbound => {
                outcome.inbound_bytes = bytes;
                match tokio::time::timeout(grace, &mut outbound).await {
                    Ok(bytes) => outcome.outbound_bytes = bytes,
                    Err(_) => outcome.forced_close = true,
                }
            }
            bytes = &mut outbound => {
                outcome.outbound_bytes = bytes;
                match tokio::time::timeout(grace, &mut inbound).await {
                    Ok(bytes) => outcome.inbound_bytes = bytes,
                    Err(_) => outcome.forced_close = true,
                }
            }
            _ = stop.recv() => {
                outcome.cancelled = true;
            }
        }
        if outcome.forced_close {
            tracing::debug!(session = %id, grace = ?grace, "Half-close grace elapsed");
        }
        outcome
    }
}
