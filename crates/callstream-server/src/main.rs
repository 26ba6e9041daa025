//! CallStream Server - standalone daemon for the TETRA call-stream processor.
//!
//! Ingests a UDP CDR/voice feed, assembles and persists complete calls, and
//! serves live interception and playback over a TCP control protocol.

use std::path::PathBuf;

use anyhow::{Context, Result};
use callstream_core::bootstrap;
use callstream_core::config::Config;
use clap::Parser;
use tokio::signal;

/// CallStream Server - TETRA call-stream collector, persister, and media router.
#[derive(Parser, Debug)]
#[command(name = "callstream-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE", env = "CALLSTREAMSERVER_CONF_FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "CALLSTREAMSERVER_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Working directory for temporary WAV/MP3/session files (overrides config file).
    #[arg(short = 'w', long, env = "CALLSTREAMSERVER_WORK_PATH")]
    work_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("CallStream Server v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(args.config.as_deref()).context("failed to load configuration")?;

    if let Some(work_path) = args.work_path {
        config.work_path = work_path;
    }

    log::info!(
        "configuration: work_path={}, pg_conn_info={}",
        config.work_path.display(),
        if config.persistence_manager.pg_conn_info.is_empty() { "(unset, using in-memory storage)" } else { "(set)" }
    );

    let services = bootstrap(config).await.context("failed to bootstrap services")?;
    log::info!("services bootstrapped successfully");

    shutdown_signal().await;
    log::info!("shutdown signal received, cleaning up...");

    services.shutdown().await;
    log::info!("shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
