//! Request and response bodies of the REST surface.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Construction, GameStatus, PlayerType, ResourceLevel, Vegetation};
use crate::geometry::Point;
use crate::ids::ObjectId;
use crate::views::HouseView;

// ---------------------------------------------------------------------------
// Maps
// ---------------------------------------------------------------------------

/// A map template in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    /// Stable id.
    pub id: ObjectId,
    /// Display title.
    pub title: String,
    /// Map author.
    pub author: String,
    /// Width in points.
    pub width: u32,
    /// Height in points.
    pub height: u32,
    /// Highest number of players the map supports.
    pub max_players: u32,
    /// Where headquarters are placed, in player order.
    pub starting_points: Vec<Point>,
}

/// Terrain of a map, row by row.
///
/// Rows start at `y = 1`; odd rows start at `x = 1`, even rows at `x = 2`,
/// and `x` advances by two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct TerrainView {
    /// Width in points.
    pub width: u32,
    /// Height in points.
    pub height: u32,
    /// Vegetation of the triangle straight below each point.
    pub straight_below: Vec<Vegetation>,
    /// Vegetation of the triangle below and to the right of each point.
    pub below_to_the_right: Vec<Vegetation>,
    /// Height of each point.
    pub heights: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Games and players
// ---------------------------------------------------------------------------

/// A player in a placeholder or a running game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    /// Stable id.
    pub id: ObjectId,
    /// Display name.
    pub name: String,
    /// Color as `#rrggbb`.
    pub color: String,
    /// Human or computer.
    #[serde(rename = "type")]
    pub kind: PlayerType,
    /// Position of the player's headquarter, once the game runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center_point: Option<Point>,
}

/// A player entry in statistics responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PlayerSummary {
    /// Stable id.
    pub id: ObjectId,
    /// Display name.
    pub name: String,
    /// Color as `#rrggbb`.
    pub color: String,
}

/// A game, either still a placeholder or running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    /// Stable id, kept when the placeholder starts.
    pub id: ObjectId,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Players in roster order.
    pub players: Vec<PlayerView>,
    /// Lifecycle stage.
    pub status: GameStatus,
    /// Starting resource level.
    pub resources: ResourceLevel,
    /// Selected map template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_id: Option<ObjectId>,
    /// The selected map template, expanded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<MapView>,
}

/// A player to add to a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NewPlayer {
    /// Display name.
    pub name: String,
    /// Color as `#rrggbb`.
    pub color: String,
    /// Human or computer; human when absent.
    #[serde(rename = "type", default)]
    pub kind: PlayerType,
}

/// Partial update of a player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PlayerUpdate {
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New color as `#rrggbb`.
    #[serde(default)]
    pub color: Option<String>,
}

/// Body of `POST /games`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct NewGame {
    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Initial roster.
    #[serde(default)]
    pub players: Option<Vec<NewPlayer>>,
    /// Map template to play on.
    #[serde(default)]
    pub map_id: Option<ObjectId>,
    /// Starting resource level; medium when absent.
    #[serde(default)]
    pub resources: Option<ResourceLevel>,
}

/// Body of `PATCH /games/{id}`.
///
/// Only one field is applied per request, checked in the order map,
/// status, resources, name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct GameUpdate {
    /// Select another map template.
    #[serde(default)]
    pub map_id: Option<ObjectId>,
    /// `STARTED` starts the game.
    #[serde(default)]
    pub status: Option<GameStatus>,
    /// Change the starting resource level.
    #[serde(default)]
    pub resources: Option<ResourceLevel>,
    /// Rename the game.
    #[serde(default)]
    pub name: Option<String>,
}

// ---------------------------------------------------------------------------
// Construction requests
// ---------------------------------------------------------------------------

/// Body of `POST .../houses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NewHouse {
    /// Where to build.
    #[serde(flatten)]
    pub point: Point,
    /// Building kind, for example `"Woodcutter"`.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Body of `PUT .../houses/{hid}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct HouseUpdate {
    /// Send the soldiers home, or cancel that.
    #[serde(default)]
    pub evacuate: Option<bool>,
    /// Allow or stop promotions of the hosted soldiers.
    #[serde(default)]
    pub promotions_enabled: Option<bool>,
    /// Switch production of a producer on or off.
    #[serde(default)]
    pub production_enabled: Option<bool>,
    /// Present when the requesting player attacks this building.
    #[serde(default)]
    #[ts(type = "unknown")]
    pub attack: Option<serde_json::Value>,
    /// Number of soldiers to send; one when absent.
    #[serde(default)]
    pub attackers: Option<u32>,
}

/// Body of `POST .../roads`. Two points ask for an auto-selected road
/// between them; more points are taken as the exact waypoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NewRoad {
    /// Waypoints or endpoints.
    pub points: Vec<Point>,
}

/// Body of `PUT /games/{id}/map/points`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct PointCommand {
    /// Call a geologist to the flag at the point.
    #[serde(default)]
    pub geologist_needed: bool,
    /// Call a scout to the flag at the point.
    #[serde(default)]
    pub scout_needed: bool,
}

/// Details of one point as seen by a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct PointDetails {
    /// Horizontal position.
    pub x: i32,
    /// Vertical position.
    pub y: i32,
    /// `"building"`, `"flag"` or `"road"` when something stands there.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is: Option<String>,
    /// The building at the point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building: Option<HouseView>,
    /// Id of the building at the point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building_id: Option<ObjectId>,
    /// Id of the flag at the point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag_id: Option<ObjectId>,
    /// Id of the road through the point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub road_id: Option<ObjectId>,
    /// Construction options; absent for undiscovered points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_build: Option<Vec<Construction>>,
    /// Neighbours a new road from this point could continue to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub possible_road_connections: Option<Vec<Point>>,
}

/// Body of `POST /rpc/.../find-new-road`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FindRoadRequest {
    /// Start point, normally a flag.
    pub from: Point,
    /// Goal point.
    pub to: Point,
    /// Points the road must not use.
    #[serde(default)]
    pub avoid: Option<Vec<Point>>,
}

/// Result of a road search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct FindRoadResponse {
    /// Whether a road was found.
    pub road_is_possible: bool,
    /// The road found, endpoints included.
    pub possible_road: Vec<Point>,
    /// Whether building it would end on a flag or split a road.
    pub closes_road: bool,
}

/// A plain message reply, used for refusals and acknowledgements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MessageResponse {
    /// Human readable text.
    pub message: String,
}

impl MessageResponse {
    /// Build a reply from any text.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// One sample of a per-player series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Measurement {
    /// Simulated time of the sample.
    pub time: u64,
    /// One value per player, in player order.
    pub values: Vec<u32>,
}

/// Land owned per player over time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct LandStatisticsView {
    /// Players in series order.
    pub players: Vec<PlayerSummary>,
    /// Simulated time of the game now.
    pub current_time: u64,
    /// Samples, oldest first.
    pub land_statistics: Vec<Measurement>,
}

/// Production of one material per player over time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct MaterialStatistics {
    /// Lowercase material name.
    pub material: String,
    /// Cumulative production samples, oldest first.
    pub material_statistics: Vec<Measurement>,
}

/// Production statistics of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct ProductionStatisticsView {
    /// Players in series order.
    pub players: Vec<PlayerSummary>,
    /// One entry per tracked material.
    pub material_statistics: Vec<MaterialStatistics>,
}
