//! Error types for the `settlers-world` crate.
//!
//! Every mutator on [`GameMap`](crate::GameMap) returns [`WorldError`] when
//! the engine refuses an action. A refusal never leaves the map partially
//! changed.

use settlers_types::{EntityKey, PlayerKey, Point};

/// Errors raised by placement, removal and command operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// The coordinates do not address a grid point, or lie off the map.
    #[error("{0} is not a point on the map")]
    InvalidPoint(Point),

    /// Nothing of the requested kind can be placed at the point.
    #[error("cannot place {what} at {point}")]
    NotAvailable {
        /// What was being placed.
        what: &'static str,
        /// Where.
        point: Point,
    },

    /// The building name is not in the factory table.
    #[error("unknown building type: {0}")]
    UnknownBuildingType(String),

    /// The player is not part of this map.
    #[error("player {0} is not in this game")]
    UnknownPlayer(PlayerKey),

    /// No entity with this key lives on the map.
    #[error("entity {0} not found")]
    EntityNotFound(EntityKey),

    /// No flag stands at the point.
    #[error("no flag at {0}")]
    NoFlagAt(Point),

    /// The entity belongs to another player.
    #[error("entity {entity} belongs to another player")]
    NotOwner {
        /// The entity acted on.
        entity: EntityKey,
    },

    /// A road definition is malformed or crosses something.
    #[error("invalid road: {0}")]
    InvalidRoad(String),

    /// No road can be found between the points.
    #[error("no road possible from {from} to {to}")]
    NoRoadPossible {
        /// Start point.
        from: Point,
        /// Goal point.
        to: Point,
    },

    /// The action needs a military building.
    #[error("building {0} is not a military building")]
    NotMilitary(EntityKey),

    /// The action is not allowed in the building's current state.
    #[error("building {0} cannot do this in its current state")]
    WrongState(EntityKey),

    /// The attack cannot be carried out.
    #[error("cannot attack: {0}")]
    CannotAttack(&'static str),

    /// More players than the map has starting points.
    #[error("map supports {max} players, got {got}")]
    TooManyPlayers {
        /// Starting points on the map.
        max: usize,
        /// Players requested.
        got: usize,
    },
}
