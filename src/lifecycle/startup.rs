//! Startup orchestration.
//!
//! # Responsibilities
//! - Check credentials before anything is spawned
//! - Launch and bootstrap the engine, retrying from scratch on failure
//! - Wait for readiness, then bind the external listener
//! - Run the forwarder until shutdown, then stop the engine
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The external port is bound only after readiness, so early clients
//!   see connection refused instead of a hang
//! - A signal during startup abandons it; dropping the child kills it

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::process::ChildStdin;
use tokio::sync::oneshot;

use super::error::StartupError;
use super::shutdown::Shutdown;
use crate::bootstrap::{apply_bootstrap, BootstrapPlan, LineControl, ParkedControl};
use crate::config::{Credentials, GatewayConfig};
use crate::forward::Forwarder;
use crate::health::{prewarm, ProbeSettings, ReadinessProbe};
use crate::net::{listener, ServiceEndpoint};
use crate::resilience::RetryPolicy;
use crate::supervisor::{launch, prepare_database, LaunchSpec, LaunchedProcess, ProcessHandle};

/// Engine that passed bootstrap and readiness, plus the bound listener.
struct Armed {
    process: ProcessHandle,
    control: ParkedControl<ChildStdin>,
    upstream: SocketAddr,
    listener: TcpListener,
}

/// The whole gateway: supervisor, bootstrap, readiness and forwarding.
pub struct Gateway {
    config: GatewayConfig,
    credentials: Credentials,
}

impl Gateway {
    pub fn new(config: GatewayConfig, credentials: Credentials) -> Self {
        Self {
            config,
            credentials,
        }
    }

    /// Run until `shutdown` fires or startup fails.
    pub async fn run(self, shutdown: &Shutdown) -> Result<(), StartupError> {
        self.credentials.validate()?;

        let forward_stop = shutdown.subscribe();
        let mut startup_stop = shutdown.subscribe();

        let armed = tokio::select! {
            armed = self.arm() => armed?,
            _ = startup_stop.recv() => {
                tracing::info!("Shutdown requested during startup; abandoning it");
                return Ok(());
            }
        };
        drop(startup_stop);

        let Armed {
            process,
            control,
            upstream,
            listener,
        } = armed;

        let (stop_engine, engine_stop_rx) = oneshot::channel();
        let grace = self.config.engine.stop_grace();
        let supervisor = tokio::spawn(process.supervise(engine_stop_rx, grace));

        let forwarder = Forwarder::from_config(&self.config.forward);
        tracing::info!(mode = %forwarder.mode(), upstream = %upstream, "Forwarding armed");
        let forwarded = forwarder.run(listener, upstream, forward_stop).await;

        let _ = stop_engine.send(());
        drop(control);
        if let Err(e) = supervisor.await {
            tracing::warn!(error = %e, "Engine supervisor task failed");
        }

        forwarded.map_err(StartupError::Forwarding)?;
        tracing::info!("Shutdown complete");
        Ok(())
    }

    async fn arm(&self) -> Result<Armed, StartupError> {
        let internal = self.config.internal.endpoint();
        let plan = BootstrapPlan::from_config(&self.config.engine, internal.port());

        let (mut process, control) = self.bootstrap_with_retry(&plan, &internal).await?;

        let probe = ReadinessProbe::new(internal, ProbeSettings::from(&self.config.readiness));
        let upstream = match probe.wait_ready(&mut process).await {
            Ok(addr) => addr,
            Err(e) => {
                tracing::error!(error = %e, last_lines = ?e.last_lines(), "Engine never became ready");
                return Err(e.into());
            }
        };

        if self.config.readiness.prewarm.enabled {
            prewarm(upstream, &self.config.readiness.prewarm).await;
        }

        let listener = listener::bind(&self.config.listener.endpoint()).await?;
        Ok(Armed {
            process,
            control,
            upstream,
            listener,
        })
    }

    /// Launch and bootstrap. A failed directive stops that engine and
    /// starts over with a fresh one.
    async fn bootstrap_with_retry(
        &self,
        plan: &BootstrapPlan,
        internal: &ServiceEndpoint,
    ) -> Result<(ProcessHandle, ParkedControl<ChildStdin>), StartupError> {
        let policy = RetryPolicy::from(&self.config.bootstrap);
        let database = prepare_database(&self.config.engine, &self.credentials.bucket)?;
        let spec = LaunchSpec::for_engine(&self.config.engine, &database);
        tracing::info!(
            database = %database.display(),
            directives = plan.directives().len(),
            max_attempts = policy.max_attempts,
            "Bootstrapping engine"
        );

        let mut attempt = 0;
        loop {
            attempt += 1;
            let LaunchedProcess {
                mut handle,
                stdin,
                stdout,
            } = launch(&spec)?;
            let mut control =
                LineControl::new(stdin, stdout, self.config.bootstrap.statement_timeout());

            let err = match apply_bootstrap(plan, &self.credentials, internal, &mut control).await {
                Ok(report) => {
                    tracing::info!(
                        attempt,
                        pid = ?handle.pid(),
                        views = ?report.views,
                        extensions = ?report.extensions,
                        "Engine configured"
                    );
                    return Ok((handle, control.park()));
                }
                Err(e) => e,
            };

            drop(control);
            handle.terminate(self.config.engine.stop_grace()).await;
            let last_lines = handle.log_tail().snapshot();

            let delay = if err.is_retryable() {
                policy.delay_after(attempt)
            } else {
                None
            };
            match delay {
                Some(delay) => {
                    tracing::warn!(
                        attempt,
                        delay = ?delay,
                        error = %err,
                        last_lines = ?last_lines,
                        "Bootstrap failed; relaunching engine"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::error!(attempt, error = %err, last_lines = ?last_lines, "Bootstrap failed");
                    return Err(StartupError::Bootstrap {
                        attempts: attempt,
                        source: err,
                    });
                }
            }
        }
    }
}
