//! Axum router construction for the game server.
//!
//! Assembles the REST API under `/settlers/api` and the monitor
//! `WebSocket` at the root into a single [`Router`] with CORS middleware
//! enabled for browser clients.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{flags, games, houses, maps, players, points, roads, statistics, view};
use crate::state::AppState;
use crate::ws;

/// Prefix of every REST route.
pub const API_PREFIX: &str = "/settlers/api";

/// Build the complete Axum router.
///
/// The router includes:
/// - the REST API under [`API_PREFIX`], see [`crate::handlers`]
/// - `GET /ws/monitor/games/{id}/players/{pid}` -- `WebSocket` change
///   stream of one player
///
/// CORS allows any origin.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest(API_PREFIX, api_routes())
        .route(
            "/ws/monitor/games/{id}/players/{pid}",
            get(ws::ws_monitor),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Maps
        .route("/maps", get(maps::list_maps))
        .route("/maps/{id}", get(maps::get_map).delete(maps::delete_map))
        .route("/maps/{id}/terrain", get(maps::get_map_terrain))
        // Games
        .route("/games", get(games::list_games).post(games::create_game))
        .route(
            "/games/{id}",
            get(games::get_game)
                .patch(games::update_game)
                .delete(games::delete_game),
        )
        // Players
        .route(
            "/games/{id}/players",
            get(players::list_players).post(players::add_player),
        )
        .route(
            "/games/{id}/players/{pid}",
            get(players::get_player)
                .patch(players::update_player)
                .delete(players::remove_player),
        )
        // Map of a game
        .route("/games/{id}/map/terrain", get(points::get_terrain))
        .route(
            "/games/{id}/map/points",
            get(points::get_point).put(points::put_point),
        )
        // Houses
        .route(
            "/games/{id}/players/{pid}/houses",
            get(houses::list_houses).post(houses::create_house),
        )
        .route(
            "/games/{id}/players/{pid}/houses/{hid}",
            get(houses::get_house)
                .put(houses::update_house)
                .delete(houses::remove_house),
        )
        // Flags
        .route("/games/{id}/players/{pid}/flags", post(flags::create_flag))
        .route(
            "/games/{id}/players/{pid}/flags/{fid}",
            get(flags::get_flag).delete(flags::remove_flag),
        )
        // Roads
        .route("/games/{id}/players/{pid}/roads", post(roads::create_road))
        .route(
            "/games/{id}/players/{pid}/roads/{rid}",
            get(roads::get_road).delete(roads::remove_road),
        )
        .route(
            "/rpc/games/{id}/players/{pid}/find-new-road",
            post(roads::find_new_road),
        )
        // What a player sees
        .route("/games/{id}/players/{pid}/view", get(view::get_view))
        .route(
            "/games/{id}/players/{pid}/gameMessages",
            get(view::game_messages),
        )
        // Statistics
        .route("/games/{id}/statistics/land", get(statistics::land))
        .route(
            "/games/{id}/statistics/production",
            get(statistics::production),
        )
}
