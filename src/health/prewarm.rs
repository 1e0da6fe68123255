//! Warm-up request issued once the engine accepts connections.
//!
//! The engine UI serves its first page slowly; fetching it once before the
//! external listener opens moves that cost out of the first client request.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::{self, Instant};

use crate::config::PrewarmConfig;

const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Returns `true` once any response arrives. Failure is only logged.
pub async fn prewarm(upstream: SocketAddr, config: &PrewarmConfig) -> bool {
    let path = if config.path.starts_with('/') {
        config.path.clone()
    } else {
        format!("/{}", config.path)
    };
    let url = format!("http://{upstream}{path}");

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(config.attempt_timeout_secs.max(1)))
        .redirect(reqwest::redirect::Policy::none())
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "Could not build pre-warm client");
            return false;
        }
    };

    let deadline = Instant::now() + Duration::from_secs(config.timeout_secs);
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match client.get(&url).send().await {
            Ok(response) => {
                tracing::info!(url = %url, status = %response.status(), attempts, "Pre-warm complete");
                return true;
            }
            Err(e) => tracing::debug!(url = %url, error = %e, attempts, "Pre-warm attempt failed"),
        }
        if Instant::now() + RETRY_DELAY >= deadline {
            tracing::warn!(url = %url, attempts, "Pre-warm gave up; continuing without it");
            return false;
        }
        time::sleep(RETRY_DELAY).await;
    }
}
