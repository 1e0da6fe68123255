//! ui-gateway
//!
//! Launches the engine, configures it, waits for its UI to accept
//! connections and then forwards the public port to it.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use ui_gateway::config::{load_config, Credentials, ForwardMode};
use ui_gateway::lifecycle::{error, signals};
use ui_gateway::observability::{logging, metrics};
use ui_gateway::{Gateway, Shutdown, StartupError};

#[derive(Parser, Debug)]
#[command(name = "ui-gateway", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Forwarding mode, overriding config and FORWARD_MODE.
    #[arg(long)]
    mode: Option<ForwardMode>,

    /// Validate configuration and credentials, then exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ui-gateway: {e}");
            return ExitCode::from(error::EXIT_FAILURE);
        }
    };
    if let Some(mode) = cli.mode {
        config.forward.mode = mode;
    }

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ui-gateway starting");

    let credentials = Credentials::from_env();
    if cli.check {
        return match credentials.validate() {
            Ok(()) => {
                tracing::info!(
                    external = config.listener.port,
                    internal = %config.internal.endpoint(),
                    mode = %config.forward.mode,
                    "Configuration is valid"
                );
                ExitCode::SUCCESS
            }
            Err(e) => report(StartupError::from(e)),
        };
    }

    tracing::info!(
        external_port = config.listener.port,
        internal = %config.internal.endpoint(),
        mode = %config.forward.mode,
        endpoint = %credentials.endpoint,
        bucket = %credentials.bucket,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let started = config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .map_err(|e| e.to_string())
            .and_then(|addr| metrics::init_metrics(addr).map_err(|e| e.to_string()));
        if let Err(e) = started {
            return report(StartupError::Metrics(e));
        }
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    match Gateway::new(config, credentials).run(&shutdown).await {
        Ok(()) => ExitCode::from(error::EXIT_OK),
        Err(e) => report(e),
    }
}

fn report(err: StartupError) -> ExitCode {
    let code = err.exit_code();
    tracing::error!(error = %err, exit_code = code, "ui-gateway failed");
    ExitCode::from(code)
}
