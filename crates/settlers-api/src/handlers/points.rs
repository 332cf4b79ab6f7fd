//! The map of a game: terrain, point details and commands issued at a
//! point.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use settlers_core::{EntityKind, Renderer};
use settlers_types::{MessageResponse, Point, PointCommand, PointDetails, TerrainView};

use super::member;
use crate::error::ApiError;
use crate::extract::{JsonBody, parse_id};
use crate::state::{AppState, Game};

/// Query of the `/map/points` endpoints.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointQuery {
    /// Horizontal position.
    pub x: i32,
    /// Vertical position.
    pub y: i32,
    /// The player asking; required for `GET`.
    pub player_id: Option<String>,
}

impl PointQuery {
    const fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// `GET /games/{id}/map/terrain`: the world's terrain, or the selected
/// template's before the game starts.
pub async fn get_terrain(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TerrainView>, ApiError> {
    let terrain = match state.game(parse_id(&id)?).await? {
        Game::Running(running) => running.world.with_world(|map| map.terrain().to_view()).await,
        Game::Waiting(placeholder) => {
            let key = placeholder
                .map
                .ok_or_else(|| ApiError::not_found("no map selected"))?;
            state
                .catalog()
                .iter()
                .find(|t| t.key == key)
                .map(|t| t.terrain().to_view())
                .ok_or_else(|| ApiError::not_found("map of the game"))?
        }
    };
    Ok(Json(terrain))
}

/// `GET /games/{id}/map/points?x=&y=&playerId=`: what stands at a point and
/// what the player could build there. Undiscovered points only report
/// their coordinates.
pub async fn get_point(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<PointQuery>,
) -> Result<Json<PointDetails>, ApiError> {
    let running = state.running(parse_id(&id)?).await?;
    let raw_player = query
        .player_id
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest(String::from("playerId is required")))?;
    let player = state.player_key(parse_id(raw_player)?)?;
    let point = query.point();

    let details = running
        .with_map(|map| -> Result<PointDetails, ApiError> {
            let viewer = member(map, player)?;
            let mut details = PointDetails {
                x: point.x,
                y: point.y,
                is: None,
                building: None,
                building_id: None,
                flag_id: None,
                road_id: None,
                can_build: None,
                possible_road_connections: None,
            };
            if !viewer.has_discovered(point) {
                return Ok(details);
            }

            let renderer = Renderer::new(&state.registry, map.key());
            if let Some(building) = map.building_at(point) {
                let house = renderer.house(building);
                details.is = Some(String::from("building"));
                details.building_id = Some(house.id);
                details.building = Some(house);
            } else if let Some(flag) = map.flag_at(point) {
                details.is = Some(String::from("flag"));
                details.flag_id = Some(renderer.id(EntityKind::Flag, flag.key));
            } else if let Some(road) = map.road_at(point) {
                details.is = Some(String::from("road"));
                details.road_id = Some(renderer.id(EntityKind::Road, road.key));
            }
            details.can_build = Some(map.available_construction(player, point));
            details.possible_road_connections = Some(map.possible_road_connections(player, point));
            Ok(details)
        })
        .await?;
    Ok(Json(details))
}

/// `PUT /games/{id}/map/points?x=&y=`: call a geologist or a scout to the
/// flag at the point, on behalf of the flag's owner.
pub async fn put_point(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<PointQuery>,
    JsonBody(command): JsonBody<PointCommand>,
) -> Result<Json<MessageResponse>, ApiError> {
    let running = state.running(parse_id(&id)?).await?;
    let point = query.point();

    let message = running
        .with_map(|map| -> Result<String, ApiError> {
            let owner = map
                .flag_at(point)
                .map(|f| f.owner)
                .ok_or_else(|| ApiError::BadRequest(format!("no flag at {point}")))?;
            if command.geologist_needed {
                map.call_geologist(owner, point)?;
                Ok(format!("Called geologist to {point}"))
            } else if command.scout_needed {
                map.call_scout(owner, point)?;
                Ok(format!("Called scout to {point}"))
            } else {
                Err(ApiError::BadRequest(String::from(
                    "expected geologistNeeded or scoutNeeded",
                )))
            }
        })
        .await?;
    Ok(Json(MessageResponse::new(message)))
}
