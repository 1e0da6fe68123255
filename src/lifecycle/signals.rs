//! OS signal handling.
//!
//! SIGINT and SIGTERM both trigger graceful shutdown. A second signal while
//! draining exits immediately.

use super::shutdown::Shutdown;

/// Resolve on the next SIGINT or SIGTERM.
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::info!(signal = "SIGINT", "Shutdown signal received"),
                    _ = term.recv() => tracing::info!(signal = "SIGTERM", "Shutdown signal received"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable; listening for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!(signal = "SIGINT", "Shutdown signal received");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown signal received");
    }
}

/// Trigger `shutdown` on the first signal; exit with status 130 on the second.
pub fn spawn_signal_listener(shutdown: Shutdown) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
        wait_for_signal().await;
        tracing::warn!("Second signal received; exiting without draining");
        std::process::exit(130);
    })
}
