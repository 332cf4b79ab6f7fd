//! Error types for the REST and `WebSocket` boundary.
//!
//! [`ApiError`] unifies all failure modes into a single enum that can be
//! converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.
//!
//! Refusals are not errors on the wire: a player acting on something it
//! does not own gets `200` with a `{"message": ...}` body, as browser
//! clients expect.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use settlers_core::{RegistryError, StartError};
use settlers_types::MessageResponse;
use settlers_world::WorldError;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The id is unknown, of the wrong kind, or belongs to another game.
    #[error("not found: {0}")]
    NotFound(String),

    /// The body is empty or malformed, or the engine refused the request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The player may not act on the object. Answered with `200`.
    #[error("{0}")]
    Refused(String),

    /// The operation is not allowed in the game's current stage.
    #[error("not allowed: {0}")]
    NotAllowed(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Shorthand for a not-found error naming what was looked up.
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Refused(message) => {
                return (StatusCode::OK, axum::Json(MessageResponse::new(message)))
                    .into_response();
            }
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotAllowed(msg) => (StatusCode::METHOD_NOT_ALLOWED, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        Self::NotFound(err.to_string())
    }
}

impl From<StartError> for ApiError {
    fn from(err: StartError) -> Self {
        match err {
            StartError::World(world) => Self::from(world),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl From<WorldError> for ApiError {
    fn from(err: WorldError) -> Self {
        // Engine keys never leave the process, so variants carrying one get
        // a fixed text.
        match err {
            WorldError::EntityNotFound(_) => Self::NotFound(String::from("no such object")),
            WorldError::UnknownPlayer(_) => {
                Self::NotFound(String::from("player is not in this game"))
            }
            WorldError::NotOwner { .. } => {
                Self::Refused(String::from("Cannot act on an object of another player"))
            }
            WorldError::NotMilitary(_) => {
                Self::Refused(String::from("The building is not a military building"))
            }
            WorldError::WrongState(_) => {
                Self::Refused(String::from("The building cannot do this in its current state"))
            }
            WorldError::CannotAttack(reason) => Self::Refused(format!("Cannot attack: {reason}")),
            WorldError::InvalidPoint(_)
            | WorldError::NotAvailable { .. }
            | WorldError::UnknownBuildingType(_)
            | WorldError::NoFlagAt(_)
            | WorldError::InvalidRoad(_)
            | WorldError::NoRoadPossible { .. }
            | WorldError::TooManyPlayers { .. } => Self::BadRequest(err.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use settlers_types::{EntityKey, Point};

    use super::*;

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn errors_carry_status_in_body() {
        let response = ApiError::not_found("game 7").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_of(response).await;
        assert_eq!(json["status"], 404);
        assert_eq!(json["error"], "game 7");
    }

    #[tokio::test]
    async fn refusal_is_a_plain_message() {
        let response = ApiError::Refused(String::from("Cannot attack own building")).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_of(response).await;
        assert_eq!(json["message"], "Cannot attack own building");
    }

    #[test]
    fn engine_refusals_map_to_status() {
        let point = Point::new(3, 3);
        assert!(matches!(
            ApiError::from(WorldError::UnknownBuildingType(String::from("Castle"))),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(WorldError::NotAvailable { what: "flag", point }),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(WorldError::NotOwner {
                entity: EntityKey::new()
            }),
            ApiError::Refused(_)
        ));
        assert!(matches!(
            ApiError::from(WorldError::EntityNotFound(EntityKey::new())),
            ApiError::NotFound(_)
        ));
    }
}
