//! What a player sees: the full view and the message inbox.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use settlers_core::Renderer;
use settlers_types::{GameMessage, ViewSnapshot};

use super::{member, running_player};
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /games/{id}/players/{pid}/view`: the snapshot a monitor starts
/// from before applying pushed change sets.
pub async fn get_view(
    State(state): State<Arc<AppState>>,
    Path((id, pid)): Path<(String, String)>,
) -> Result<Json<ViewSnapshot>, ApiError> {
    let (game, player) = running_player(&state, &id, &pid).await?;
    let snapshot = state
        .projector
        .snapshot(&game.world, player)
        .await
        .ok_or_else(|| ApiError::not_found("player is not in this game"))?;
    Ok(Json(snapshot))
}

/// `GET /games/{id}/players/{pid}/gameMessages`
pub async fn game_messages(
    State(state): State<Arc<AppState>>,
    Path((id, pid)): Path<(String, String)>,
) -> Result<Json<Vec<GameMessage>>, ApiError> {
    let (game, player) = running_player(&state, &id, &pid).await?;
    let messages = game
        .with_map(|map| -> Result<Vec<GameMessage>, ApiError> {
            let found = member(map, player)?;
            let renderer = Renderer::new(&state.registry, map.key());
            Ok(found.messages.iter().map(|m| renderer.message(m)).collect())
        })
        .await?;
    Ok(Json(messages))
}
