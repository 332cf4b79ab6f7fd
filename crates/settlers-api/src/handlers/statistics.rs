//! Land and production statistics of a running game.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use settlers_core::Renderer;
use settlers_types::{
    LandStatisticsView, MaterialStatistics, PlayerSummary, ProductionStatisticsView,
};
use settlers_world::{GameMap, TRACKED_MATERIALS};

use crate::error::ApiError;
use crate::extract::parse_id;
use crate::state::AppState;

/// Players in the order the series values are in.
fn series_players(renderer: &Renderer<'_>, map: &GameMap) -> Vec<PlayerSummary> {
    map.statistics()
        .players()
        .iter()
        .filter_map(|key| map.player(*key))
        .map(|p| PlayerSummary {
            id: renderer.player_id(p.key),
            name: p.name.clone(),
            color: p.color.clone(),
        })
        .collect()
}

/// `GET /games/{id}/statistics/land`
pub async fn land(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LandStatisticsView>, ApiError> {
    let game = state.running(parse_id(&id)?).await?;
    let view = game
        .with_map(|map| {
            let renderer = Renderer::new(&state.registry, map.key());
            Ok(LandStatisticsView {
                players: series_players(&renderer, map),
                current_time: map.time(),
                land_statistics: map.statistics().land().to_vec(),
            })
        })
        .await?;
    Ok(Json(view))
}

/// `GET /games/{id}/statistics/production`
pub async fn production(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProductionStatisticsView>, ApiError> {
    let game = state.running(parse_id(&id)?).await?;
    let view = game
        .with_map(|map| {
            let renderer = Renderer::new(&state.registry, map.key());
            Ok(ProductionStatisticsView {
                players: series_players(&renderer, map),
                material_statistics: TRACKED_MATERIALS
                    .iter()
                    .map(|m| MaterialStatistics {
                        material: m.wire_name().to_lowercase(),
                        material_statistics: map.statistics().production(*m).to_vec(),
                    })
                    .collect(),
            })
        })
        .await?;
    Ok(Json(view))
}
