//! Game server binary for Settlers.
//!
//! Wires the live-access layer together: one identity registry, one tick
//! scheduler with the change feed attached, and the REST + `WebSocket`
//! server. Runs until `Ctrl-C`, then stops accepting requests, lets the
//! tick in progress finish and exits.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `settlers-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Create the application state (registry, feed, scheduler, catalog)
//! 4. Start the tick scheduler
//! 5. Serve HTTP until `Ctrl-C`
//! 6. Stop the scheduler and log the tick statistics

mod error;

use std::path::Path;
use std::sync::Arc;

use settlers_api::AppState;
use settlers_core::SettlersConfig;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::ServerBinaryError;

/// Path of the configuration file, relative to the working directory.
const CONFIG_PATH: &str = "settlers-config.yaml";

/// Application entry point for the game server.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the HTTP
/// server fails.
#[tokio::main]
async fn main() -> Result<(), ServerBinaryError> {
    // 1. Load configuration.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging. RUST_LOG wins over the config.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("settlers-server starting");
    if !from_file {
        info!("Config file not found, using defaults");
    }
    info!(
        host = %config.server.host,
        port = config.server.port,
        tick_interval_ms = config.ticker.tick_interval_ms,
        computer_player_frequency = config.ticker.computer_player_frequency,
        channel_capacity = config.feed.channel_capacity,
        "Configuration loaded"
    );

    // 3. Create the application state.
    let state = Arc::new(AppState::new(config.clone()));
    info!(maps = state.catalog().len(), "Application state initialized");

    // 4. Start the tick scheduler.
    state.scheduler.start().await;

    // 5. Serve until Ctrl-C.
    let server = settlers_api::spawn_server(&config.server, Arc::clone(&state), shutdown_signal())?;
    let served = server.await.map_err(|e| ServerBinaryError::Task {
        message: format!("{e}"),
    });

    // 6. Stop the scheduler even when the server failed.
    state.scheduler.stop().await;
    let stats = state.scheduler.stats();
    info!(
        ticks = state.scheduler.ticks(),
        world_ticks = stats.recorded,
        max_step = ?stats.max_step,
        max_total = ?stats.max_total,
        over_threshold = stats.over_threshold,
        faults = stats.faults,
        "settlers-server stopped"
    );

    served??;
    Ok(())
}

/// Load configuration from [`CONFIG_PATH`], or defaults when the file does
/// not exist. The flag tells whether the file was read.
fn load_config() -> Result<(SettlersConfig, bool), ServerBinaryError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok((SettlersConfig::from_file(config_path)?, true))
    } else {
        let mut config = SettlersConfig::default();
        config.server.apply_env_overrides();
        Ok((config, false))
    }
}

/// Completes on `Ctrl-C`. If the signal cannot be installed the server runs
/// until it is killed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
