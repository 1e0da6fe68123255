//! Readiness prober.
//!
//! # Responsibilities
//! - Poll the internal endpoint until a connection is accepted
//! - Check the supervised process before every poll
//! - Pick the address family the service actually bound
//! - Publish state transitions

use std::net::SocketAddr;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{self, Instant};

use crate::config::ReadinessConfig;
use crate::net::ServiceEndpoint;
use crate::observability::metrics;
use crate::supervisor::ProcessHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessState {
    Starting,
    Probing,
    /// The address that accepted; it becomes the forwarding upstream.
    Ready(SocketAddr),
    Failed(String),
}

#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("{endpoint} did not accept connections within {waited:?}")]
    Timeout {
        endpoint: String,
        waited: Duration,
        last_lines: Vec<String>,
    },

    #[error("engine exited before becoming ready ({status})")]
    ProcessDied {
        status: String,
        last_lines: Vec<String>,
    },
}

impl ReadinessError {
    /// Diagnostic output captured when the wait failed.
    pub fn last_lines(&self) -> &[String] {
        match self {
            ReadinessError::Timeout { last_lines, .. } => last_lines,
            ReadinessError::ProcessDied { last_lines, .. } => last_lines,
        }
    }
}

/// The supervised process, as seen by the prober.
pub trait Liveness {
    /// `Some` once the process has exited. Must not block.
    fn exit_status(&mut self) -> Option<ExitStatus>;

    /// Recent diagnostic lines.
    fn diagnostics(&self) -> Vec<String> {
        Vec::new()
    }
}

impl Liveness for ProcessHandle {
    fn exit_status(&mut self) -> Option<ExitStatus> {
        self.poll_exit()
    }

    fn diagnostics(&self) -> Vec<String> {
        self.log_tail().snapshot()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProbeSettings {
    pub timeout: Duration,
    pub interval: Duration,
    pub connect_timeout: Duration,
}

impl From<&ReadinessConfig> for ProbeSettings {
    fn from(config: &ReadinessConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            interval: Duration::from_millis(config.interval_ms),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
        }
    }
}

pub struct ReadinessProbe {
    endpoint: ServiceEndpoint,
    settings: ProbeSettings,
    state: watch::Sender<ReadinessState>,
}

impl ReadinessProbe {
    pub fn new(endpoint: ServiceEndpoint, settings: ProbeSettings) -> Self {
        let (state, _) = watch::channel(ReadinessState::Starting);
        Self {
            endpoint,
            settings,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ReadinessState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ReadinessState {
        self.state.borrow().clone()
    }

    fn transition(&self, next: ReadinessState) {
        tracing::debug!(endpoint = %self.endpoint, state = ?next, "Readiness state");
        self.state.send_replace(next);
    }

    /// Block until the endpoint accepts a connection, the process dies, or
    /// the bound elapses.
    pub async fn wait_ready<L>(&self, process: &mut L) -> Result<SocketAddr, ReadinessError>
    where
        L: Liveness + ?Sized,
    {
        let started = Instant::now();
        let deadline = started + self.settings.timeout;
        self.transition(ReadinessState::Probing);
        tracing::info!(
            endpoint = %self.endpoint,
            timeout = ?self.settings.timeout,
            "Waiting for engine to accept connections"
        );

        loop {
            if let Some(status) = process.exit_status() {
                let err = ReadinessError::ProcessDied {
                    status: status.to_string(),
                    last_lines: process.diagnostics(),
                };
                self.transition(ReadinessState::Failed(err.to_string()));
                return Err(err);
            }

            if let Some(addr) = self.probe_once().await {
                let elapsed = started.elapsed();
                metrics::record_readiness(elapsed);
                tracing::info!(upstream = %addr, elapsed = ?elapsed, "Engine is ready");
                self.transition(ReadinessState::Ready(addr));
                return Ok(addr);
            }

            let now = Instant::now();
            if now >= deadline {
                let err = ReadinessError::Timeout {
                    endpoint: self.endpoint.to_string(),
                    waited: now - started,
                    last_lines: process.diagnostics(),
                };
                self.transition(ReadinessState::Failed(err.to_string()));
                return Err(err);
            }
            time::sleep(self.settings.interval.min(deadline - now)).await;
        }
    }

    /// Try every candidate address; the connection is closed right away.
    async fn probe_once(&self) -> Option<SocketAddr> {
        let candidates = match self.endpoint.candidates().await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::debug!(endpoint = %self.endpoint, error = %e, "Resolve failed");
                return None;
            }
        };

        for addr in candidates {
            match time::timeout(self.settings.connect_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => {
                    drop(stream);
                    return Some(addr);
                }
                Ok(Err(e)) => tracing::trace!(addr = %addr, error = %e, "Probe refused"),
                Err(_) => tracing::trace!(addr = %addr, "Probe timed out"),
            }
        }
        None
    }
}
