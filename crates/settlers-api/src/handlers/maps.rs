//! The map catalog.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use settlers_types::{MapView, TerrainView};

use crate::error::ApiError;
use crate::extract::parse_id;
use crate::state::AppState;

/// `GET /maps`
pub async fn list_maps(State(state): State<Arc<AppState>>) -> Json<Vec<MapView>> {
    Json(
        state
            .catalog()
            .iter()
            .map(|t| state.map_view(t))
            .collect(),
    )
}

/// `GET /maps/{id}`
pub async fn get_map(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MapView>, ApiError> {
    let template = state.template(parse_id(&id)?)?;
    Ok(Json(state.map_view(template)))
}

/// `GET /maps/{id}/terrain`
pub async fn get_map_terrain(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TerrainView>, ApiError> {
    let template = state.template(parse_id(&id)?)?;
    Ok(Json(template.terrain().to_view()))
}

/// `DELETE /maps/{id}`: the catalog is fixed.
pub async fn delete_map(Path(_id): Path<String>) -> ApiError {
    ApiError::NotAllowed(String::from("maps cannot be deleted"))
}
