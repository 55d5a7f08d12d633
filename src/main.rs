//! frontdoor binary.
//!
//! Resolves configuration, installs logging, brings the gateway up and
//! runs it until SIGINT/SIGTERM.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use frontdoor::config::{resolve_config, IgnoredEnv};
use frontdoor::lifecycle::{signals, startup};
use frontdoor::observability::logging;
use frontdoor::Shutdown;

#[derive(Parser, Debug)]
#[command(name = "frontdoor", version, about = "Front door for a web tunneling service")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, env = "FRONTDOOR_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let resolved = resolve_config(cli.config.as_deref(), |key| std::env::var(key).ok());
    let (config, ignored) = match resolved {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("frontdoor: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(config.mode, &config.observability.log_level);
    for IgnoredEnv { key, value } in ignored {
        tracing::warn!(
            key,
            value = %value,
            fallback = config.listener.port,
            "Ignoring unparseable environment value"
        );
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "frontdoor starting");

    let (gateway, listener) = match startup::start(&config).await {
        Ok(started) => started,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    tokio::spawn(signals::listen(shutdown.clone()));

    match gateway.run(listener, shutdown).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
