//! `WebSocket` handler for monitors.
//!
//! Clients connect to `GET /ws/monitor/games/{id}/players/{pid}` and
//! receive JSON-encoded [`ChangeSet`]s. The first one carries everything
//! the player sees as additions to an empty view; after that a change set
//! arrives each time a tick changes the view. A monitor starts from an empty
//! view and applies the change sets in order, so changes made between a
//! `/view` request and the connection are never lost.
//!
//! The connection owns a bounded channel. The [`ChangeFeed`] only keeps the
//! sending side, so when the feed drops the subscription (the game was
//! deleted, or another monitor of the same player took over) the receiving
//! side sees the channel close and the socket is shut down.
//!
//! [`ChangeFeed`]: settlers_core::ChangeFeed

use std::sync::{Arc, Weak};

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use settlers_core::ChangeSink;
use settlers_types::{ChangeSet, PlayerKey};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::handlers::member;
use crate::state::{AppState, RunningGame};

/// Check the game and the player, then upgrade and start streaming.
///
/// Unknown games and players are refused with `404` before the upgrade.
///
/// # Route
///
/// `GET /ws/monitor/games/{id}/players/{pid}`
pub async fn ws_monitor(
    State(state): State<Arc<AppState>>,
    Path((id, pid)): Path<(String, String)>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let (game, player) = crate::handlers::running_player(&state, &id, &pid).await?;
    game.with_map(|map| member(map, player).map(|_| ())).await?;
    let upgrade = upgrade.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(upgrade
        .on_upgrade(move |socket| handle_ws(socket, state, game, player))
        .into_response())
}

/// Subscribe the player, then forward change sets until either side
/// closes.
async fn handle_ws(socket: WebSocket, state: Arc<AppState>, game: RunningGame, player: PlayerKey) {
    let world = game.world.key();
    let (tx, mut rx) = mpsc::channel::<ChangeSet>(state.config.feed.channel_capacity.max(1));
    let sink: Arc<dyn ChangeSink> = Arc::new(tx);
    let weak: Weak<dyn ChangeSink> = Arc::downgrade(&sink);

    if !state.feed.subscribe(&game.world, player, sink).await {
        debug!(world = %world, player = %player, "Game deleted or player left before the monitor subscribed");
        return;
    }
    debug!(world = %world, player = %player, "Monitor connected");

    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            changes = rx.recv() => {
                let Some(changes) = changes else {
                    debug!(world = %world, player = %player, "Subscription ended, closing monitor");
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                };
                let json = match serde_json::to_string(&changes) {
                    Ok(j) => j,
                    Err(e) => {
                        warn!("Failed to serialize change set: {e}");
                        continue;
                    }
                };
                if sender.send(Message::Text(json.into())).await.is_err() {
                    debug!("Monitor disconnected (send failed)");
                    break;
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Monitor disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            debug!("Monitor disconnected (pong failed)");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {e}");
                        break;
                    }
                    _ => {
                        // Monitors only listen.
                    }
                }
            }
        }
    }

    if let Some(sink) = weak.upgrade() {
        state.feed.unsubscribe_sink(world, player, &sink);
    }
}
