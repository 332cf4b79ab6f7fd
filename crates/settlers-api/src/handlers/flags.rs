//! Flags of a player.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use settlers_core::{EntityKind, Renderer};
use settlers_types::{FlagView, MessageResponse, Point};

use super::{member, running_player};
use crate::error::ApiError;
use crate::extract::{JsonBody, parse_id};
use crate::state::AppState;

/// `POST /games/{id}/players/{pid}/flags`: the body is the point.
pub async fn create_flag(
    State(state): State<Arc<AppState>>,
    Path((id, pid)): Path<(String, String)>,
    JsonBody(point): JsonBody<Point>,
) -> Result<Json<FlagView>, ApiError> {
    let (game, player) = running_player(&state, &id, &pid).await?;
    let flag = game
        .with_map(|map| -> Result<FlagView, ApiError> {
            member(map, player)?;
            let key = map.place_flag(player, point)?;
            let flag = map
                .flag(key)
                .ok_or_else(|| ApiError::Internal(String::from("placed flag is missing")))?;
            Ok(Renderer::new(&state.registry, map.key()).flag(flag))
        })
        .await?;
    Ok(Json(flag))
}

/// `GET /games/{id}/players/{pid}/flags/{fid}`
pub async fn get_flag(
    State(state): State<Arc<AppState>>,
    Path((id, pid, fid)): Path<(String, String, String)>,
) -> Result<Json<FlagView>, ApiError> {
    let (game, player) = running_player(&state, &id, &pid).await?;
    let key = state.entity_key(parse_id(&fid)?, game.world.key(), EntityKind::Flag)?;
    let flag = game
        .with_map(|map| -> Result<FlagView, ApiError> {
            member(map, player)?;
            let flag = map.flag(key).ok_or_else(|| ApiError::not_found("flag"))?;
            Ok(Renderer::new(&state.registry, map.key()).flag(flag))
        })
        .await?;
    Ok(Json(flag))
}

/// `DELETE /games/{id}/players/{pid}/flags/{fid}`: removes the flag and
/// every road ending at it.
pub async fn remove_flag(
    State(state): State<Arc<AppState>>,
    Path((id, pid, fid)): Path<(String, String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let (game, player) = running_player(&state, &id, &pid).await?;
    let key = state.entity_key(parse_id(&fid)?, game.world.key(), EntityKind::Flag)?;
    game.with_map(|map| -> Result<(), ApiError> {
        member(map, player)?;
        let owner = map
            .flag(key)
            .map(|f| f.owner)
            .ok_or_else(|| ApiError::not_found("flag"))?;
        if owner != player {
            return Err(ApiError::Refused(String::from(
                "Cannot remove flag for other player",
            )));
        }
        map.remove_flag(player, key)?;
        Ok(())
    })
    .await?;
    Ok(Json(MessageResponse::new("Flag removed")))
}
