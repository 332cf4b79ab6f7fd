//! Buildings of a player: construction, commands, attacks and tear-down.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use settlers_core::{EntityKind, Renderer};
use settlers_types::{EntityKey, HouseUpdate, HouseView, MessageResponse, NewHouse, PlayerKey};
use settlers_world::{Building, GameMap, WorldError};
use tracing::debug;

use super::{member, running_player};
use crate::error::ApiError;
use crate::extract::{JsonBody, parse_id};
use crate::state::AppState;

/// `GET /games/{id}/players/{pid}/houses`: every building of the player.
pub async fn list_houses(
    State(state): State<Arc<AppState>>,
    Path((id, pid)): Path<(String, String)>,
) -> Result<Json<Vec<HouseView>>, ApiError> {
    let (game, player) = running_player(&state, &id, &pid).await?;
    let houses = game
        .with_map(|map| -> Result<Vec<HouseView>, ApiError> {
            member(map, player)?;
            let renderer = Renderer::new(&state.registry, map.key());
            Ok(map
                .buildings()
                .filter(|b| b.owner == player)
                .map(|b| renderer.house(b))
                .collect())
        })
        .await?;
    Ok(Json(houses))
}

/// `POST /games/{id}/players/{pid}/houses`: place a building of the named
/// kind. Unknown kinds and unavailable spots are a `400`.
pub async fn create_house(
    State(state): State<Arc<AppState>>,
    Path((id, pid)): Path<(String, String)>,
    JsonBody(body): JsonBody<NewHouse>,
) -> Result<Json<HouseView>, ApiError> {
    let (game, player) = running_player(&state, &id, &pid).await?;
    let house = game
        .with_map(|map| -> Result<HouseView, ApiError> {
            member(map, player)?;
            let key = map.place_building(player, &body.kind, body.point)?;
            let building = map
                .building(key)
                .ok_or_else(|| ApiError::Internal(String::from("placed building is missing")))?;
            Ok(Renderer::new(&state.registry, map.key()).house(building))
        })
        .await?;
    debug!(house = %house.id, kind = %house.kind, "House placed");
    Ok(Json(house))
}

/// `GET /games/{id}/players/{pid}/houses/{hid}`
pub async fn get_house(
    State(state): State<Arc<AppState>>,
    Path((id, pid, hid)): Path<(String, String, String)>,
) -> Result<Json<HouseView>, ApiError> {
    let (game, player) = running_player(&state, &id, &pid).await?;
    let key = state.entity_key(parse_id(&hid)?, game.world.key(), EntityKind::Building)?;
    let house = game
        .with_map(|map| -> Result<HouseView, ApiError> {
            member(map, player)?;
            let building = map
                .building(key)
                .ok_or_else(|| ApiError::not_found("house"))?;
            Ok(Renderer::new(&state.registry, map.key()).house(building))
        })
        .await?;
    Ok(Json(house))
}

/// `PUT /games/{id}/players/{pid}/houses/{hid}`
///
/// Toggles evacuation, promotions and production of the player's own
/// building and answers with the updated house. A body with `attack` sends
/// the player's soldiers against another player's building instead.
pub async fn update_house(
    State(state): State<Arc<AppState>>,
    Path((id, pid, hid)): Path<(String, String, String)>,
    JsonBody(update): JsonBody<HouseUpdate>,
) -> Result<Response, ApiError> {
    let (game, player) = running_player(&state, &id, &pid).await?;
    let key = state.entity_key(parse_id(&hid)?, game.world.key(), EntityKind::Building)?;

    game.with_map(|map| -> Result<Response, ApiError> {
        member(map, player)?;
        let owner = map
            .building(key)
            .map(|b| b.owner)
            .ok_or_else(|| ApiError::not_found("house"))?;

        if update.attack.is_some() {
            if owner == player {
                return Err(ApiError::Refused(String::from("Cannot attack own building")));
            }
            let sent = map.attack(player, key, update.attackers.unwrap_or(1))?;
            debug!(attackers = sent, "Attack launched");
            return Ok(Json(MessageResponse::new("Attacking building")).into_response());
        }

        let toggles = [
            update.evacuate,
            update.promotions_enabled,
            update.production_enabled,
        ];
        if toggles.iter().all(Option::is_none) {
            return Err(ApiError::BadRequest(String::from("nothing to update")));
        }
        if owner != player {
            return Err(ApiError::Refused(String::from(
                "Cannot change a building of another player",
            )));
        }
        apply_toggles(map, player, key, &update)?;

        let building = map
            .building(key)
            .ok_or_else(|| ApiError::not_found("house"))?;
        let house = Renderer::new(&state.registry, map.key()).house(building);
        Ok(Json(house).into_response())
    })
    .await
}

/// Refuse an update that one of its toggles does not apply to, before any
/// toggle has changed the building.
fn check_toggles(building: &Building, update: &HouseUpdate) -> Result<(), ApiError> {
    let spec = building.spec;
    let soldiers = update.evacuate.is_some() || update.promotions_enabled.is_some();
    if soldiers && (!spec.is_military() || spec.is_headquarter()) {
        return Err(WorldError::NotMilitary(building.key).into());
    }
    if update.production_enabled.is_some() && !spec.can_produce() {
        return Err(WorldError::WrongState(building.key).into());
    }
    Ok(())
}

fn apply_toggles(
    map: &mut GameMap,
    player: PlayerKey,
    key: EntityKey,
    update: &HouseUpdate,
) -> Result<(), ApiError> {
    let building = map
        .building(key)
        .ok_or_else(|| ApiError::not_found("house"))?;
    check_toggles(building, update)?;
    if let Some(evacuate) = update.evacuate {
        map.set_evacuated(player, key, evacuate)?;
    }
    if let Some(enabled) = update.promotions_enabled {
        map.set_promotions_enabled(player, key, enabled)?;
    }
    if let Some(enabled) = update.production_enabled {
        map.set_production_enabled(player, key, enabled)?;
    }
    Ok(())
}

/// `DELETE /games/{id}/players/{pid}/houses/{hid}`: set the building on
/// fire.
pub async fn remove_house(
    State(state): State<Arc<AppState>>,
    Path((id, pid, hid)): Path<(String, String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let (game, player) = running_player(&state, &id, &pid).await?;
    let key = state.entity_key(parse_id(&hid)?, game.world.key(), EntityKind::Building)?;

    game.with_map(|map| -> Result<(), ApiError> {
        member(map, player)?;
        let owner = map
            .building(key)
            .map(|b| b.owner)
            .ok_or_else(|| ApiError::not_found("house"))?;
        if owner != player {
            return Err(ApiError::Refused(String::from(
                "Cannot tear down building for other player",
            )));
        }
        map.tear_down(player, key)?;
        Ok(())
    })
    .await?;
    Ok(Json(MessageResponse::new("Tore down building")))
}
