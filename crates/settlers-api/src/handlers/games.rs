//! Games: placeholders while they are being set up, worlds once started.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use settlers_core::GamePlaceholder;
use settlers_types::{GameStatus, GameUpdate, GameView, MessageResponse, NewGame};

use super::players::check_color;
use crate::error::ApiError;
use crate::extract::{JsonBody, parse_id};
use crate::state::AppState;

/// `GET /games`
pub async fn list_games(State(state): State<Arc<AppState>>) -> Json<Vec<GameView>> {
    let mut views = Vec::new();
    for (id, game) in state.games().await {
        views.push(state.game_view(id, &game).await);
    }
    Json(views)
}

/// `POST /games`: create a placeholder. An empty body is a `400`.
pub async fn create_game(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<NewGame>,
) -> Result<(StatusCode, Json<GameView>), ApiError> {
    let mut placeholder = GamePlaceholder::new(body.name);
    if let Some(map) = body.map_id {
        placeholder.map = Some(state.template(map).map_err(bad_map)?.key);
    }
    if let Some(level) = body.resources {
        placeholder.resources = level;
    }
    for player in body.players.unwrap_or_default() {
        check_color(&player.color)?;
        placeholder.add_player(player.name, player.color, player.kind);
    }

    let id = state.create_game(placeholder).await;
    let game = state.game(id).await?;
    Ok((StatusCode::CREATED, Json(state.game_view(id, &game).await)))
}

/// `GET /games/{id}`
pub async fn get_game(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<GameView>, ApiError> {
    let id = parse_id(&id)?;
    let game = state.game(id).await?;
    Ok(Json(state.game_view(id, &game).await))
}

/// `PATCH /games/{id}`: one change per request, checked in the order map,
/// status, resources, name.
pub async fn update_game(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    JsonBody(update): JsonBody<GameUpdate>,
) -> Result<Json<GameView>, ApiError> {
    let id = parse_id(&id)?;

    if let Some(map) = update.map_id {
        let key = state.template(map).map_err(bad_map)?.key;
        state
            .update_placeholder(id, |p| {
                p.map = Some(key);
                Ok(())
            })
            .await?;
    } else if let Some(status) = update.status {
        match status {
            GameStatus::Started => {
                state.start_game(id).await?;
            }
            GameStatus::NotStarted => {
                state.game(id).await?;
                return Err(ApiError::NotAllowed(String::from(
                    "a game cannot be moved back to NOT_STARTED",
                )));
            }
        }
    } else if let Some(level) = update.resources {
        state
            .update_placeholder(id, |p| {
                p.resources = level;
                Ok(())
            })
            .await?;
    } else if let Some(name) = update.name {
        state.rename_game(id, name).await?;
    } else {
        return Err(ApiError::BadRequest(String::from("nothing to update")));
    }

    let game = state.game(id).await?;
    Ok(Json(state.game_view(id, &game).await))
}

/// `DELETE /games/{id}`
pub async fn delete_game(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_id(&id)?;
    state.delete_game(id).await?;
    Ok(Json(MessageResponse::new("Game deleted")))
}

/// A map id in a body that does not resolve is a bad request, not a
/// missing resource.
fn bad_map(err: ApiError) -> ApiError {
    match err {
        ApiError::NotFound(message) => ApiError::BadRequest(message),
        other => other,
    }
}
