//! Per-player views of a running world and the change sets between them.
//!
//! A [`ViewSnapshot`] is everything one player can currently see. Two
//! snapshots of the same player are compared into a [`ChangeSet`], which is
//! what the monitor socket pushes. Every entity view carries its stable
//! [`ObjectId`] so snapshots can be matched entity by entity.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{
    BuildingState, Construction, CropState, Material, Rank, SignAmount, SignType, WorkerType,
};
use crate::geometry::Point;
use crate::ids::ObjectId;

/// An entity view addressable by its stable id.
pub trait Identified {
    /// The stable id of the viewed entity.
    fn object_id(&self) -> ObjectId;
}

macro_rules! identified {
    ($($view:ty),* $(,)?) => {
        $(
            impl Identified for $view {
                fn object_id(&self) -> ObjectId {
                    self.id
                }
            }
        )*
    };
}

// ---------------------------------------------------------------------------
// Entity views
// ---------------------------------------------------------------------------

/// Stock and demand of one material inside a building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct ResourceAmount {
    /// Units currently stored.
    pub has: u32,
    /// Units needed in total, for construction or production.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_needed: Option<u32>,
}

/// A building as seen by a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct HouseView {
    /// Stable id.
    pub id: ObjectId,
    /// Owning player.
    pub player_id: ObjectId,
    /// Horizontal position.
    pub x: i32,
    /// Vertical position.
    pub y: i32,
    /// Building kind, for example `"Woodcutter"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Lifecycle state.
    pub state: BuildingState,
    /// Percentage built, only while unfinished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub construction_progress: Option<u32>,
    /// Stored and needed materials keyed by lowercase material name.
    pub resources: BTreeMap<String, ResourceAmount>,
    /// Percentage of recent steps that produced something.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub productivity: Option<u32>,
    /// Materials this building produces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub produces: Option<Vec<Material>>,
    /// Whether production is switched on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production_enabled: Option<bool>,
    /// Ranks of the hosted soldiers, for ready military buildings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soldiers: Option<Vec<Rank>>,
    /// Soldier capacity, for ready military buildings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_soldiers: Option<u32>,
    /// Whether the soldiers were sent home.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evacuated: Option<bool>,
    /// Whether hosted soldiers get promoted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotions_enabled: Option<bool>,
    /// Set while the building is being upgraded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrading: Option<bool>,
}

/// A flag as seen by a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct FlagView {
    /// Stable id.
    pub id: ObjectId,
    /// Owning player.
    pub player_id: ObjectId,
    /// Horizontal position.
    pub x: i32,
    /// Vertical position.
    pub y: i32,
    /// Cargo waiting at the flag.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stacked_cargo: Vec<Material>,
}

/// A road as seen by a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct RoadView {
    /// Stable id.
    pub id: ObjectId,
    /// Owning player.
    pub player_id: ObjectId,
    /// Waypoints from start flag to end flag.
    pub points: Vec<Point>,
}

/// A tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TreeView {
    /// Stable id.
    pub id: ObjectId,
    /// Horizontal position.
    pub x: i32,
    /// Vertical position.
    pub y: i32,
}

/// A stone pile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StoneView {
    /// Stable id.
    pub id: ObjectId,
    /// Horizontal position.
    pub x: i32,
    /// Vertical position.
    pub y: i32,
    /// Stone left in the pile.
    pub amount: u32,
}

/// A walker: worker or wild animal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct WorkerView {
    /// Stable id.
    pub id: ObjectId,
    /// Horizontal position of the last point reached.
    pub x: i32,
    /// Vertical position of the last point reached.
    pub y: i32,
    /// Kind of walker.
    #[serde(rename = "type")]
    pub kind: WorkerType,
    /// Always false in views; hidden workers are not listed.
    pub inside: bool,
    /// Whether the walker is between two points.
    pub between_points: bool,
    /// Point walked from, while between points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Point>,
    /// Point walked to, while between points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Point>,
    /// Percentage of the current leg already walked.
    pub percentage_traveled: u32,
    /// Walking speed, in steps per point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<u32>,
    /// Material carried, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cargo: Option<Material>,
    /// Owning player; absent for wild animals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<ObjectId>,
}

/// A geologist sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SignView {
    /// Stable id.
    pub id: ObjectId,
    /// Horizontal position.
    pub x: i32,
    /// Vertical position.
    pub y: i32,
    /// Deposit found, `null` for an empty sign.
    #[serde(rename = "type")]
    pub kind: Option<SignType>,
    /// Deposit size, absent for an empty sign.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<SignAmount>,
}

/// A crop on a farm field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CropView {
    /// Stable id.
    pub id: ObjectId,
    /// Horizontal position.
    pub x: i32,
    /// Vertical position.
    pub y: i32,
    /// Growth stage.
    pub state: CropState,
}

/// The border of one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct BorderView {
    /// Player the border belongs to.
    pub player_id: ObjectId,
    /// Border points.
    pub points: BTreeSet<Point>,
}

identified!(
    HouseView, FlagView, RoadView, TreeView, StoneView, WorkerView, SignView, CropView,
);

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// An entry in a player's message inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameMessage {
    /// A military building was finished and waits for soldiers.
    MilitaryBuildingReady {
        /// The building.
        #[serde(rename = "houseId")]
        house_id: ObjectId,
    },
    /// A producer ran out of raw material on the map.
    NoMoreResources {
        /// The building.
        #[serde(rename = "houseId")]
        house_id: ObjectId,
    },
    /// A military building got its first soldier.
    MilitaryBuildingOccupied {
        /// The building.
        #[serde(rename = "houseId")]
        house_id: ObjectId,
    },
    /// An enemy attacks one of the player's buildings.
    UnderAttack {
        /// The attacked building.
        #[serde(rename = "houseId")]
        house_id: ObjectId,
    },
    /// A geologist found a deposit.
    GeologistFind {
        /// Where the sign was put up.
        point: Point,
        /// The material found.
        material: Material,
    },
    /// A building was captured by an enemy.
    BuildingLost {
        /// The lost building.
        #[serde(rename = "houseId")]
        house_id: ObjectId,
    },
    /// The player captured an enemy building.
    BuildingCaptured {
        /// The captured building.
        #[serde(rename = "houseId")]
        house_id: ObjectId,
    },
    /// A storehouse was finished.
    StoreHouseIsReady {
        /// The storehouse.
        #[serde(rename = "houseId")]
        house_id: ObjectId,
    },
    /// A new military building of another player took some of this
    /// player's land.
    MilitaryBuildingCausedLostLand {
        /// The building that claimed the land.
        #[serde(rename = "houseId")]
        house_id: ObjectId,
    },
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Everything one player can currently see of a world.
///
/// Entity lists are sorted by id. The message inbox travels with the
/// snapshot so change sets can carry new messages, but it is not part of the
/// `/view` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct ViewSnapshot {
    /// Simulated time the snapshot was taken at.
    pub time: u64,
    /// Visible buildings.
    pub houses: Vec<HouseView>,
    /// Visible trees.
    pub trees: Vec<TreeView>,
    /// Visible stone piles.
    pub stones: Vec<StoneView>,
    /// Visible workers, not counting those inside buildings.
    pub workers: Vec<WorkerView>,
    /// Visible flags.
    pub flags: Vec<FlagView>,
    /// Roads with at least one visible waypoint.
    pub roads: Vec<RoadView>,
    /// All points the player has discovered.
    pub discovered_points: BTreeSet<Point>,
    /// The requesting player's border.
    pub borders: Vec<BorderView>,
    /// Visible geologist signs.
    pub signs: Vec<SignView>,
    /// Visible wild animals.
    pub animals: Vec<WorkerView>,
    /// Visible crops.
    pub crops: Vec<CropView>,
    /// Construction options per discovered point, keyed by `"x,y"`. Points
    /// without any option are absent.
    pub available_construction: BTreeMap<String, Vec<Construction>>,
    /// The player's message inbox, oldest first.
    #[serde(skip)]
    pub messages: Vec<GameMessage>,
}

// ---------------------------------------------------------------------------
// Change set
// ---------------------------------------------------------------------------

/// Border movement of one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct BorderChange {
    /// Player whose border moved.
    pub player_id: ObjectId,
    /// Points that became border.
    pub new_border: Vec<Point>,
    /// Points that stopped being border.
    pub removed_border: Vec<Point>,
}

/// New construction options at one point. An empty list means nothing can
/// be built there any more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AvailableConstructionChange {
    /// Horizontal position.
    pub x: i32,
    /// Vertical position.
    pub y: i32,
    /// Options now available.
    pub available: Vec<Construction>,
}

/// Difference between two snapshots of the same player.
///
/// Empty categories are left out of the JSON form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    /// Simulated time of the later snapshot.
    pub time: u64,

    /// Buildings that came into view.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_buildings: Vec<HouseView>,
    /// Buildings whose view changed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed_buildings: Vec<HouseView>,
    /// Buildings that disappeared.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_buildings: Vec<ObjectId>,

    /// Flags that came into view.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_flags: Vec<FlagView>,
    /// Flags whose view changed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed_flags: Vec<FlagView>,
    /// Flags that disappeared.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_flags: Vec<ObjectId>,

    /// Roads that came into view.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_roads: Vec<RoadView>,
    /// Roads whose view changed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed_roads: Vec<RoadView>,
    /// Roads that disappeared.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_roads: Vec<ObjectId>,

    /// Trees that came into view.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_trees: Vec<TreeView>,
    /// Trees that disappeared.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_trees: Vec<ObjectId>,

    /// Stone piles that came into view.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_stones: Vec<StoneView>,
    /// Stone piles that shrank.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed_stones: Vec<StoneView>,
    /// Stone piles that disappeared.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_stones: Vec<ObjectId>,

    /// Workers that came into view.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_workers: Vec<WorkerView>,
    /// Workers that moved or changed cargo.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed_workers: Vec<WorkerView>,
    /// Workers that disappeared or went inside.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_workers: Vec<ObjectId>,

    /// Signs that came into view.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_signs: Vec<SignView>,
    /// Signs that disappeared.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_signs: Vec<ObjectId>,

    /// Crops that came into view.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_crops: Vec<CropView>,
    /// Crops that grew.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed_crops: Vec<CropView>,
    /// Crops that disappeared.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_crops: Vec<ObjectId>,

    /// Wild animals that came into view.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_animals: Vec<WorkerView>,
    /// Wild animals that moved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed_animals: Vec<WorkerView>,
    /// Wild animals that disappeared.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_animals: Vec<ObjectId>,

    /// Points discovered since the earlier snapshot.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_discovered_land: Vec<Point>,
    /// Border movement.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed_borders: Vec<BorderChange>,
    /// Points whose construction options changed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed_available_construction: Vec<AvailableConstructionChange>,
    /// Messages received since the earlier snapshot.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_messages: Vec<GameMessage>,
}

impl ChangeSet {
    /// Whether nothing but the time differs.
    pub fn is_empty(&self) -> bool {
        self.new_buildings.is_empty()
            && self.changed_buildings.is_empty()
            && self.removed_buildings.is_empty()
            && self.new_flags.is_empty()
            && self.changed_flags.is_empty()
            && self.removed_flags.is_empty()
            && self.new_roads.is_empty()
            && self.changed_roads.is_empty()
            && self.removed_roads.is_empty()
            && self.new_trees.is_empty()
            && self.removed_trees.is_empty()
            && self.new_stones.is_empty()
            && self.changed_stones.is_empty()
            && self.removed_stones.is_empty()
            && self.new_workers.is_empty()
            && self.changed_workers.is_empty()
            && self.removed_workers.is_empty()
            && self.new_signs.is_empty()
            && self.removed_signs.is_empty()
            && self.new_crops.is_empty()
            && self.changed_crops.is_empty()
            && self.removed_crops.is_empty()
            && self.new_animals.is_empty()
            && self.changed_animals.is_empty()
            && self.removed_animals.is_empty()
            && self.new_discovered_land.is_empty()
            && self.changed_borders.is_empty()
            && self.changed_available_construction.is_empty()
            && self.new_messages.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn id(raw: u64) -> ObjectId {
        ObjectId::from_raw(raw).unwrap()
    }

    #[test]
    fn empty_categories_are_omitted() {
        let changes = ChangeSet {
            time: 12,
            new_discovered_land: vec![Point::new(3, 5)],
            ..ChangeSet::default()
        };
        let json = serde_json::to_value(&changes).unwrap();
        let object = json.as_object().cloned().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(json["time"], 12);
        assert_eq!(json["newDiscoveredLand"][0]["x"], 3);
    }

    #[test]
    fn change_set_with_only_time_is_empty() {
        let changes = ChangeSet {
            time: 99,
            ..ChangeSet::default()
        };
        assert!(changes.is_empty());
    }

    #[test]
    fn messages_are_tagged_by_type() {
        let message = GameMessage::UnderAttack { house_id: id(17) };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "UNDER_ATTACK");
        assert_eq!(json["houseId"], "17");
    }

    #[test]
    fn snapshot_hides_messages() {
        let snapshot = ViewSnapshot {
            messages: vec![GameMessage::BuildingLost { house_id: id(4) }],
            ..ViewSnapshot::default()
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("messages").is_none());
        assert!(json.get("availableConstruction").is_some());
    }

    #[test]
    fn empty_sign_has_null_type() {
        let sign = SignView {
            id: id(5),
            x: 1,
            y: 1,
            kind: None,
            amount: None,
        };
        let json = serde_json::to_value(&sign).unwrap();
        assert!(json["type"].is_null());
        assert!(json.get("amount").is_none());
    }
}
