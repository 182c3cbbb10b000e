//! API server binary.
//!
//! Loads configuration, installs logging and signal handlers, then serves
//! until SIGINT/SIGTERM/SIGHUP/SIGQUIT.
//!
//! # Exit codes
//! - 0: clean shutdown
//! - 2: configuration, startup, serve or shutdown failure
//! - 9: the application task panicked

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use api_server::config::{self, AppConfig, ConfigError, ObservabilityConfig};
use api_server::lifecycle::{signals, startup, Shutdown};
use api_server::observability::logging;

#[derive(Parser)]
#[command(name = "api-server")]
#[command(version, about = "HTTP API server with graceful shutdown", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "APP_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and APP_PORT). 0 picks a free port.
    #[arg(short, long)]
    port: Option<u16>,
}

fn load(cli: &Cli) -> Result<AppConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => AppConfig::default(),
    };
    config::apply_env(&mut config)?;
    if let Some(port) = cli.port {
        config.listener.port = port;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load(&cli) {
        Ok(config) => config,
        Err(e) => {
            logging::init(&ObservabilityConfig::default());
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::from(2);
        }
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "api-server starting");

    let shutdown = Shutdown::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = signals::shutdown_on_signals(signal_shutdown.clone()).await {
            tracing::error!(error = %e, "Failed to install signal handlers; shutting down");
            signal_shutdown.trigger();
        }
    });

    match tokio::spawn(startup::run(config, shutdown.subscribe())).await {
        Ok(Ok(())) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Server exited with error");
            ExitCode::from(2)
        }
        Err(e) => {
            tracing::error!(error = %e, "Application panic");
            ExitCode::from(9)
        }
    }
}
