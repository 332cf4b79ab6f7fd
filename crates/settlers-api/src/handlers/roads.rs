//! Roads of a player and the road-finding RPC.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use settlers_core::{EntityKind, Renderer};
use settlers_types::{
    Construction, FindRoadRequest, FindRoadResponse, MessageResponse, NewRoad, RoadView,
};

use super::{member, running_player};
use crate::error::ApiError;
use crate::extract::{JsonBody, parse_id};
use crate::state::AppState;

/// `POST /games/{id}/players/{pid}/roads`
///
/// Two points connect two flags by the shortest free road; more points are
/// taken as the exact waypoints.
pub async fn create_road(
    State(state): State<Arc<AppState>>,
    Path((id, pid)): Path<(String, String)>,
    JsonBody(body): JsonBody<NewRoad>,
) -> Result<Json<RoadView>, ApiError> {
    let (game, player) = running_player(&state, &id, &pid).await?;
    let road = game
        .with_map(|map| -> Result<RoadView, ApiError> {
            member(map, player)?;
            let key = match body.points.as_slice() {
                [from, to] => map.place_auto_selected_road(player, *from, *to)?,
                [_, _, _, ..] => map.place_road(player, &body.points)?,
                _ => {
                    return Err(ApiError::BadRequest(String::from(
                        "a road needs at least two points",
                    )));
                }
            };
            let road = map
                .road(key)
                .ok_or_else(|| ApiError::Internal(String::from("placed road is missing")))?;
            Ok(Renderer::new(&state.registry, map.key()).road(road))
        })
        .await?;
    Ok(Json(road))
}

/// `GET /games/{id}/players/{pid}/roads/{rid}`
pub async fn get_road(
    State(state): State<Arc<AppState>>,
    Path((id, pid, rid)): Path<(String, String, String)>,
) -> Result<Json<RoadView>, ApiError> {
    let (game, player) = running_player(&state, &id, &pid).await?;
    let key = state.entity_key(parse_id(&rid)?, game.world.key(), EntityKind::Road)?;
    let road = game
        .with_map(|map| -> Result<RoadView, ApiError> {
            member(map, player)?;
            let road = map.road(key).ok_or_else(|| ApiError::not_found("road"))?;
            Ok(Renderer::new(&state.registry, map.key()).road(road))
        })
        .await?;
    Ok(Json(road))
}

/// `DELETE /games/{id}/players/{pid}/roads/{rid}`
pub async fn remove_road(
    State(state): State<Arc<AppState>>,
    Path((id, pid, rid)): Path<(String, String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let (game, player) = running_player(&state, &id, &pid).await?;
    let key = state.entity_key(parse_id(&rid)?, game.world.key(), EntityKind::Road)?;
    game.with_map(|map| -> Result<(), ApiError> {
        member(map, player)?;
        let owner = map
            .road(key)
            .map(|r| r.owner)
            .ok_or_else(|| ApiError::not_found("road"))?;
        if owner != player {
            return Err(ApiError::Refused(String::from(
                "Cannot remove road for other player",
            )));
        }
        map.remove_road(player, key)?;
        Ok(())
    })
    .await?;
    Ok(Json(MessageResponse::new("Road removed")))
}

/// `POST /rpc/games/{id}/players/{pid}/find-new-road`
///
/// A road from `from` to `to` that avoids the given points. `closesRoad`
/// tells whether building it would end on a flag, or on a road where a
/// flag can be put.
pub async fn find_new_road(
    State(state): State<Arc<AppState>>,
    Path((id, pid)): Path<(String, String)>,
    JsonBody(request): JsonBody<FindRoadRequest>,
) -> Result<Json<FindRoadResponse>, ApiError> {
    let (game, player) = running_player(&state, &id, &pid).await?;
    let avoid: BTreeSet<_> = request.avoid.unwrap_or_default().into_iter().collect();
    let response = game
        .with_map(|map| -> Result<FindRoadResponse, ApiError> {
            member(map, player)?;
            let road = map.find_auto_selected_road(player, request.from, request.to, &avoid);
            let goal = request.to;
            let closes_road = map.flag_at(goal).is_some()
                || (map.road_at(goal).is_some()
                    && map
                        .available_construction(player, goal)
                        .contains(&Construction::Flag));
            Ok(FindRoadResponse {
                road_is_possible: road.is_some(),
                possible_road: road.unwrap_or_default(),
                closes_road,
            })
        })
        .await?;
    Ok(Json(response))
}
