//! Players of a game. The roster can only change before the game starts;
//! names and colors can change at any time.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use settlers_core::{ObjectRef, Renderer};
use settlers_types::{NewPlayer, PlayerUpdate, PlayerView};
use settlers_world::Player;

use super::member;
use crate::error::ApiError;
use crate::extract::{JsonBody, parse_id};
use crate::state::{AppState, Game};

/// Refuse anything but `#rrggbb`.
pub(crate) fn check_color(color: &str) -> Result<(), ApiError> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color.chars().skip(1).all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "color must look like #rrggbb, got {color:?}"
        )))
    }
}

fn apply_update(player: &mut Player, update: PlayerUpdate) {
    if let Some(name) = update.name {
        player.name = name;
    }
    if let Some(color) = update.color {
        player.color = color;
    }
}

/// `GET /games/{id}/players`
pub async fn list_players(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PlayerView>>, ApiError> {
    let players = match state.game(parse_id(&id)?).await? {
        Game::Waiting(placeholder) => placeholder
            .players
            .iter()
            .map(|p| state.roster_view(p))
            .collect(),
        Game::Running(running) => state.world_players(&running).await,
    };
    Ok(Json(players))
}

/// `POST /games/{id}/players`
pub async fn add_player(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<NewPlayer>,
) -> Result<(StatusCode, Json<PlayerView>), ApiError> {
    check_color(&body.color)?;
    let view = state
        .update_placeholder(parse_id(&id)?, |placeholder| {
            let key = placeholder.add_player(body.name, body.color, body.kind);
            placeholder
                .player(key)
                .map(|p| state.roster_view(p))
                .ok_or_else(|| ApiError::Internal(String::from("player vanished from roster")))
        })
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /games/{id}/players/{pid}`
pub async fn get_player(
    State(state): State<Arc<AppState>>,
    Path((id, pid)): Path<(String, String)>,
) -> Result<Json<PlayerView>, ApiError> {
    let game = state.game(parse_id(&id)?).await?;
    let player = state.player_key(parse_id(&pid)?)?;
    let view = match game {
        Game::Waiting(placeholder) => placeholder
            .player(player)
            .map(|p| state.roster_view(p))
            .ok_or_else(|| ApiError::not_found("player is not in this game"))?,
        Game::Running(running) => {
            running
                .with_map(|map| -> Result<PlayerView, ApiError> {
                    let found = member(map, player)?;
                    Ok(Renderer::new(&state.registry, map.key()).player(map, found))
                })
                .await?
        }
    };
    Ok(Json(view))
}

/// `PATCH /games/{id}/players/{pid}`
pub async fn update_player(
    State(state): State<Arc<AppState>>,
    Path((id, pid)): Path<(String, String)>,
    JsonBody(update): JsonBody<PlayerUpdate>,
) -> Result<Json<PlayerView>, ApiError> {
    if let Some(color) = &update.color {
        check_color(color)?;
    }
    let id = parse_id(&id)?;
    let player = state.player_key(parse_id(&pid)?)?;

    let view = match state.game(id).await? {
        Game::Waiting(_) => {
            state
                .update_placeholder(id, |placeholder| {
                    let found = placeholder
                        .player_mut(player)
                        .ok_or_else(|| ApiError::not_found("player is not in this game"))?;
                    apply_update(found, update);
                    Ok(state.roster_view(found))
                })
                .await?
        }
        Game::Running(running) => {
            running
                .with_map(|map| -> Result<PlayerView, ApiError> {
                    let found = map
                        .player_mut(player)
                        .ok_or_else(|| ApiError::not_found("player is not in this game"))?;
                    apply_update(found, update);
                    let found = member(map, player)?;
                    Ok(Renderer::new(&state.registry, map.key()).player(map, found))
                })
                .await?
        }
    };
    Ok(Json(view))
}

/// `DELETE /games/{id}/players/{pid}`: only before the game starts.
pub async fn remove_player(
    State(state): State<Arc<AppState>>,
    Path((id, pid)): Path<(String, String)>,
) -> Result<Json<PlayerView>, ApiError> {
    let id = parse_id(&id)?;
    let player = state.player_key(parse_id(&pid)?)?;
    let view = state
        .update_placeholder(id, |placeholder| {
            placeholder
                .remove_player(player)
                .map(|p| state.roster_view(&p))
                .ok_or_else(|| ApiError::not_found("player is not in this game"))
        })
        .await?;
    state.registry.release(&ObjectRef::Player(player));
    Ok(Json(view))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_must_be_hex_triplets() {
        assert!(check_color("#00ff7F").is_ok());
        assert!(check_color("00ff7f").is_err());
        assert!(check_color("#00ff7").is_err());
        assert!(check_color("#00ff7g").is_err());
    }
}
