//! Server startup helper.
//!
//! Provides [`spawn_server`] which launches the HTTP + `WebSocket` server on
//! a background Tokio task, so the binary can run it next to the tick
//! loop and wait for both on shutdown.
//!
//! # Usage
//!
//! ```rust,ignore
//! use settlers_api::startup::spawn_server;
//! use settlers_api::AppState;
//! use std::sync::Arc;
//!
//! let state = Arc::new(AppState::new(config.clone()));
//! let handle = spawn_server(&config.server, state, shutdown)?;
//! handle.await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use settlers_core::config::ServerConfig;
use tokio::task::JoinHandle;

use crate::server::{ServerError, socket_addr, start_server};
use crate::state::AppState;

/// Errors that can occur when spawning the server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Spawn the HTTP server on a background Tokio task.
///
/// The address is checked before the task is spawned; binding itself
/// happens on the task and a failure there is logged. The task ends once
/// `shutdown` completes and in-flight requests are done.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if host and port do not form a valid
/// address.
pub fn spawn_server(
    config: &ServerConfig,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), ServerError>>, StartupError> {
    let addr = socket_addr(config)?;
    let config = config.clone();

    let handle = tokio::spawn(async move {
        let result = start_server(&config, state, shutdown).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "Game server exited with error");
        }
        result
    });

    tracing::info!(%addr, "Game server spawned on background task");

    Ok(handle)
}
