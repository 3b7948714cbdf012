//! passenger-monitor - Passenger status collector for collectd's exec plugin

use anyhow::{Context, Result};
use clap::Parser;
use passenger_monitor::{Collector, PutvalWriter, resolve_hostname};
use passenger_monitor_core::config::{ConfigOverrides, resolve_config};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// passenger-monitor - Passenger status collector for collectd's exec plugin
#[derive(Parser, Debug)]
#[command(name = "passenger-monitor")]
#[command(about = "Poll Phusion Passenger status and emit collectd gauge samples")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory containing passenger.<pid> instance directories
    #[arg(long, value_name = "DIR")]
    temp_dir: Option<PathBuf>,

    /// Seconds between polls
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,

    /// Socket read/write timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Host name used in sample identifiers
    #[arg(long, value_name = "NAME")]
    hostname: Option<String>,

    /// Poll once, print samples and exit
    #[arg(long)]
    once: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let home_dir = passenger_monitor_core::home::get_home_dir()
        .context("Failed to determine home directory")?;

    let overrides = ConfigOverrides {
        config_path: args.config.clone(),
        temp_dir: args.temp_dir.clone(),
        verbose: args.verbose,
        timeout_secs: args.timeout,
        interval_secs: args.interval,
        hostname: args.hostname.clone(),
    };

    let config = resolve_config(&overrides, &home_dir).context("Failed to resolve configuration")?;

    passenger_monitor_core::logging::init(config.verbose);
    for key in &config.unknown_keys {
        warn!("Unknown config key: {key}");
    }

    let host = resolve_hostname(config.hostname.as_deref());
    let collector = Collector::new(config, host);
    let mut sink = PutvalWriter::new(std::io::stdout());

    if args.once {
        collector
            .read_once(&mut sink)
            .context("Failed to emit samples")?;
        return Ok(());
    }

    let cancel_token = CancellationToken::new();

    let cancel_for_signals = cancel_token.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        cancel_for_signals.cancel();
    });

    collector
        .run(&mut sink, cancel_token)
        .await
        .context("Collector loop failed")?;

    info!("passenger-monitor shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => {
                    info!("Received SIGINT (Ctrl+C)");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM");
                }
            }
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {e}");
            let _ = ctrl_c.await;
            info!("Received SIGINT (Ctrl+C)");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received Ctrl+C");
}
