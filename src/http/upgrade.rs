//! Upgraded connection tunnelling (WebSocket and friends).
//!
//! Once upstream answers `101 Switching Protocols`, both sides hand over
//! their raw connections and the bytes are spliced like a tcp-mode session.

use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::net::connection::SessionGuard;
use crate::net::relay::ForwardSession;
use crate::observability::metrics;

pub async fn tunnel(
    client: OnUpgrade,
    upstream: OnUpgrade,
    guard: SessionGuard,
    half_close_grace: Duration,
    mut stop: broadcast::Receiver<()>,
) {
    let id = guard.id();
    let (client, upstream) = match tokio::try_join!(client, upstream) {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(session = %id, error = %e, "Upgrade handshake failed");
            metrics::record_session("http_upgrade", "handshake_failed");
            return;
        }
    };

    tracing::debug!(session = %id, "Upgraded connection tunnelled");
    let outcome = ForwardSession::new(id, TokioIo::new(client), TokioIo::new(upstream))
        .splice(half_close_grace, &mut stop)
        .await;

    metrics::record_bytes("inbound", outcome.inbound_bytes);
    metrics::record_bytes("outbound", outcome.outbound_bytes);
    metrics::record_session("http_upgrade", outcome.label());
    drop(guard);
}
