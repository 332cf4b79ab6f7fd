//! REST API endpoint handlers, mounted under `/settlers/api`.
//!
//! Every handler resolves the ids in its path through the shared
//! [`IdentityRegistry`](settlers_core::IdentityRegistry) first, then touches
//! world state only inside one
//! [`with_world`](settlers_core::WorldHandle::with_world) call. Responses
//! are rendered under that same lock and serialized after it is released.
//!
//! # Endpoints
//!
//! | Method | Path | Module |
//! |--------|------|--------|
//! | `GET` | `/maps`, `/maps/{id}`, `/maps/{id}/terrain` | [`maps`] |
//! | `GET`/`POST` | `/games` | [`games`] |
//! | `GET`/`PATCH`/`DELETE` | `/games/{id}` | [`games`] |
//! | `GET`/`POST` | `/games/{id}/players` | [`players`] |
//! | `GET`/`PATCH`/`DELETE` | `/games/{id}/players/{pid}` | [`players`] |
//! | `GET` | `/games/{id}/map/terrain` | [`points`] |
//! | `GET`/`PUT` | `/games/{id}/map/points?x=&y=` | [`points`] |
//! | `GET`/`POST` | `/games/{id}/players/{pid}/houses` | [`houses`] |
//! | `GET`/`PUT`/`DELETE` | `/games/{id}/players/{pid}/houses/{hid}` | [`houses`] |
//! | `POST` | `/games/{id}/players/{pid}/flags` | [`flags`] |
//! | `GET`/`DELETE` | `/games/{id}/players/{pid}/flags/{fid}` | [`flags`] |
//! | `POST` | `/games/{id}/players/{pid}/roads` | [`roads`] |
//! | `GET`/`DELETE` | `/games/{id}/players/{pid}/roads/{rid}` | [`roads`] |
//! | `POST` | `/rpc/games/{id}/players/{pid}/find-new-road` | [`roads`] |
//! | `GET` | `/games/{id}/players/{pid}/view` | [`view`] |
//! | `GET` | `/games/{id}/players/{pid}/gameMessages` | [`view`] |
//! | `GET` | `/games/{id}/statistics/land`, `/statistics/production` | [`statistics`] |

pub mod flags;
pub mod games;
pub mod houses;
pub mod maps;
pub mod players;
pub mod points;
pub mod roads;
pub mod statistics;
pub mod view;

use settlers_types::PlayerKey;
use settlers_world::{GameMap, Player};

use crate::error::ApiError;
use crate::extract::parse_id;
use crate::state::{AppState, RunningGame};

/// Resolve the game and player of a `/games/{id}/players/{pid}/...` path.
/// The game must be running; membership is checked under the world lock
/// with [`member`].
pub(crate) async fn running_player(
    state: &AppState,
    game: &str,
    player: &str,
) -> Result<(RunningGame, PlayerKey), ApiError> {
    let game = state.running(parse_id(game)?).await?;
    let player = state.player_key(parse_id(player)?)?;
    Ok((game, player))
}

/// The player, if it plays on this map.
pub(crate) fn member(map: &GameMap, player: PlayerKey) -> Result<&Player, ApiError> {
    map.player(player)
        .ok_or_else(|| ApiError::not_found("player is not in this game"))
}
