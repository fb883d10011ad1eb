//! # RCIO Bridge
//!
//! Polls a PX4IO-compatible RC I/O co-processor and logs its state.
//!
//! Usage: `rcio-bridge [config.toml]`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use rcio_bridge::config::{Config, LoggingConfig};
use rcio_bridge::serial::SerialBus;
use rcio_bridge::session::DeviceSession;
use rcio_bridge::transfer::TransferEngine;

/// File name prefix for daily rolling logs
const LOG_FILE_PREFIX: &str = "rcio-bridge.log";

/// Load the configuration file, or defaults when no path is given
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}

/// Install the tracing subscriber
///
/// The returned guard flushes the file writer and must live until exit.
fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    if logging.directory.is_empty() {
        registry.init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&logging.directory, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    registry
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Some(guard)
}

/// Main entry point for RCIO Bridge
///
/// 1. Load configuration and set up logging
/// 2. Open the serial link and create a device session
/// 3. Refresh on the configured interval, logging each snapshot
/// 4. Stop on Ctrl+C
///
/// A failed refresh is logged and the loop keeps going.
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path.as_deref())?;
    let _log_guard = init_logging(&config.logging);

    info!("RCIO Bridge v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let bus = SerialBus::open(&config.serial)?;
    info!("IO board serial port opened at: {}", bus.device_path());

    let engine = TransferEngine::with_pacing(bus, config.transfer.pacing());
    let mut session = DeviceSession::new(engine);

    let mut ticker = interval(config.session.refresh_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Refreshing every {}ms, press Ctrl+C to exit",
        config.session.refresh_interval_ms
    );

    let mut refreshes: u64 = 0;
    let mut failures: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match session.refresh().await {
                    Ok(snapshot) => {
                        refreshes += 1;
                        if config.logging.json_snapshots {
                            match serde_json::to_string(snapshot) {
                                Ok(json) => info!(target: "snapshot", "{}", json),
                                Err(e) => warn!("Failed to serialize snapshot: {}", e),
                            }
                        } else {
                            info!("{}", snapshot);
                        }
                    }
                    Err(e) => {
                        failures += 1;
                        warn!("Refresh failed: {}", e);
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                info!("Refreshes: {} ok, {} failed", refreshes, failures);
                break;
            }
        }
    }

    Ok(())
}
