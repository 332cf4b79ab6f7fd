//! REST and `WebSocket` boundary of the Settlers game server.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **REST endpoints** under `/settlers/api` for maps, games, players,
//!   houses, flags, roads, views, messages and statistics
//! - **`WebSocket` endpoint** (`/ws/monitor/games/{id}/players/{pid}`)
//!   pushing the change sets of one player as they happen
//!
//! # Architecture
//!
//! Handlers never hold world state themselves. A request resolves its ids
//! through the shared registry, takes the world lock once through
//! [`WorldHandle::with_world`](settlers_core::WorldHandle::with_world),
//! renders its response under the lock and serializes it afterwards. The
//! tick loop and every monitor go through the same lock, so a response is
//! never a torn view.
//!
//! # Modules
//!
//! - [`error`] -- [`ApiError`] and its mapping to status codes.
//! - [`extract`] -- Strict JSON bodies and id parsing.
//! - [`handlers`] -- One module per resource.
//! - [`router`] -- [`build_router`].
//! - [`server`] -- [`start_server`].
//! - [`startup`] -- [`spawn_server`] on a background task.
//! - [`state`] -- [`AppState`]: the game table and shared services.
//! - [`ws`] -- The monitor `WebSocket`.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::{API_PREFIX, build_router};
pub use server::{ServerError, start_server};
pub use startup::{StartupError, spawn_server};
pub use state::{AppState, Game, RunningGame};
