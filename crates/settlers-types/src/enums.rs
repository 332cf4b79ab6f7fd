//! Enumeration types shared by the engine, the live-access layer and the
//! REST boundary.
//!
//! Wire spellings follow what browser clients already send and expect:
//! materials and states in `SCREAMING_CASE`, sizes and construction options
//! in lowercase, worker types by their class-like `PascalCase` name.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Game setup
// ---------------------------------------------------------------------------

/// Starting resource level of a game.
///
/// Applied to every headquarter when the game starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceLevel {
    /// Three fewer wood, plank and stone.
    Low,
    /// The default headquarter stock.
    #[default]
    Medium,
    /// Three more wood, plank and stone.
    High,
}

/// Lifecycle stage of a game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    /// Still a placeholder: players and map can be changed.
    #[default]
    NotStarted,
    /// Running in the tick scheduler.
    Started,
}

/// Whether a player is driven by a person or by the computer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerType {
    /// Controlled through the REST API.
    #[default]
    HumanPlayer,
    /// Controlled by the computer player on the scheduler's AI ticks.
    ComputerPlayer,
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Footprint of a house.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum Size {
    /// Fits any house spot.
    Small,
    /// Needs a medium or large spot.
    Medium,
    /// Needs a large spot.
    Large,
}

/// One construction option at a point, as listed in the
/// available-construction map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum Construction {
    /// A flag can be placed.
    Flag,
    /// A small house can be placed.
    Small,
    /// A medium house can be placed.
    Medium,
    /// A large house can be placed.
    Large,
    /// A mine can be placed.
    Mine,
}

impl From<Size> for Construction {
    fn from(size: Size) -> Self {
        match size {
            Size::Small => Self::Small,
            Size::Medium => Self::Medium,
            Size::Large => Self::Large,
        }
    }
}

/// Lifecycle state of a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildingState {
    /// Waiting for or receiving construction material.
    Unfinished,
    /// Built but without a worker or soldier inside.
    Unoccupied,
    /// Staffed and working.
    Occupied,
    /// Torn down or captured, burning.
    Burning,
    /// Burned out; removed from the map shortly after.
    Destroyed,
}

// ---------------------------------------------------------------------------
// Materials
// ---------------------------------------------------------------------------

/// A material carried by couriers and stored in headquarters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Material {
    /// Felled trees.
    Wood,
    /// Sawn wood, used for construction.
    Plank,
    /// Quarried stone, used for construction.
    Stone,
    /// Gold, minted into coins.
    Gold,
    /// Iron ore.
    Iron,
    /// Coal.
    Coal,
    /// Minted gold coins.
    Coin,
    /// Smelted iron bars.
    IronBar,
    /// Forged swords.
    Sword,
    /// Forged shields.
    Shield,
    /// Beer for the armory.
    Beer,
    /// Water from a well.
    Water,
    /// Wheat from a farm.
    Wheat,
    /// Flour from a mill.
    Flour,
    /// Bread from a bakery.
    Bread,
    /// Fish from a fishery.
    Fish,
    /// Meat from a slaughter house or a hunter.
    Meat,
    /// Pigs from a pig farm.
    Pig,
    /// Donkeys from a donkey farm.
    Donkey,
    /// A soldier in the headquarter stock.
    Private,
}

impl Material {
    /// Parse the wire spelling, for example `"PLANK"`.
    pub fn from_wire(name: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(name.to_owned())).ok()
    }

    /// The wire spelling, for example `"PLANK"`.
    pub fn wire_name(self) -> String {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::String(s)) => s,
            _ => format!("{self:?}").to_uppercase(),
        }
    }
}

// ---------------------------------------------------------------------------
// Terrain
// ---------------------------------------------------------------------------

/// Vegetation of one terrain triangle, serialized as its short code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Vegetation {
    /// Grass.
    #[default]
    #[serde(rename = "G")]
    Grass,
    /// Water.
    #[serde(rename = "W")]
    Water,
    /// Swamp.
    #[serde(rename = "SW")]
    Swamp,
    /// Mountain, where mines go.
    #[serde(rename = "M")]
    Mountain,
    /// Deep water, impassable.
    #[serde(rename = "DW")]
    DeepWater,
    /// Snow, impassable.
    #[serde(rename = "SN")]
    Snow,
    /// Lava, impassable.
    #[serde(rename = "L")]
    Lava,
    /// Mountain meadow.
    #[serde(rename = "MM")]
    MountainMeadow,
    /// Steppe.
    #[serde(rename = "ST")]
    Steppe,
    /// Desert.
    #[serde(rename = "DE")]
    Desert,
    /// Savannah.
    #[serde(rename = "SA")]
    Savannah,
}

impl Vegetation {
    /// Houses and flags can stand on it.
    pub const fn is_buildable(self) -> bool {
        matches!(
            self,
            Self::Grass | Self::MountainMeadow | Self::Steppe | Self::Savannah
        )
    }

    /// Mines can be dug into it.
    pub const fn is_mineable(self) -> bool {
        matches!(self, Self::Mountain)
    }

    /// Walkers can cross it.
    pub const fn is_walkable(self) -> bool {
        !matches!(
            self,
            Self::Water | Self::DeepWater | Self::Snow | Self::Lava | Self::Swamp
        )
    }
}

/// Kind of deposit a geologist sign reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum SignType {
    /// Gold deposit.
    Gold,
    /// Iron deposit.
    Iron,
    /// Coal deposit.
    Coal,
    /// Granite deposit.
    Granite,
    /// Ground water.
    Water,
}

impl SignType {
    /// The material a mine on this deposit would produce.
    pub const fn material(self) -> Material {
        match self {
            Self::Gold => Material::Gold,
            Self::Iron => Material::Iron,
            Self::Coal => Material::Coal,
            Self::Granite => Material::Stone,
            Self::Water => Material::Water,
        }
    }
}

/// Amount reported on a geologist sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum SignAmount {
    /// A small deposit.
    Small,
    /// A medium deposit.
    Medium,
    /// A large deposit.
    Large,
}

/// Growth stage of a crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CropState {
    /// Just planted.
    JustPlanted,
    /// Growing.
    SmallCrop,
    /// Almost ready.
    AlmostGrown,
    /// Ready to harvest.
    FullGrown,
    /// Harvested, waiting to rot away.
    Harvested,
}

// ---------------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------------

/// Kind of walker, serialized by its class-like name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum WorkerType {
    /// Carries cargo along one road.
    Courier,
    /// Walks out from a flag and discovers land.
    Scout,
    /// Investigates mountains around a flag and places signs.
    Geologist,
    /// Occupies and attacks military buildings.
    #[serde(rename = "Military")]
    Soldier,
    /// Fells trees for a woodcutter.
    WoodcutterWorker,
    /// Breaks stones for a quarry.
    Stonemason,
    /// Plants and harvests a farm's crops.
    Farmer,
    /// A builder or other worker without a dedicated view.
    Builder,
    /// A wild animal roaming the map.
    WildAnimal,
}

/// Military rank of a soldier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rank {
    /// Fresh recruit.
    #[default]
    Private,
    /// First promotion.
    PrivateFirstClass,
    /// Second promotion.
    Sergeant,
    /// Third promotion.
    Officer,
    /// Highest rank.
    General,
}

impl Rank {
    /// Next rank up, if any.
    pub const fn promoted(self) -> Self {
        match self {
            Self::Private => Self::PrivateFirstClass,
            Self::PrivateFirstClass => Self::Sergeant,
            Self::Sergeant => Self::Officer,
            Self::Officer | Self::General => Self::General,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vegetation_uses_short_codes() {
        let json = serde_json::to_string(&Vegetation::MountainMeadow).ok();
        assert_eq!(json.as_deref(), Some("\"MM\""));
        let parsed: Option<Vegetation> = serde_json::from_str("\"SW\"").ok();
        assert_eq!(parsed, Some(Vegetation::Swamp));
    }

    #[test]
    fn resource_level_wire_names() {
        let parsed: Option<ResourceLevel> = serde_json::from_str("\"LOW\"").ok();
        assert_eq!(parsed, Some(ResourceLevel::Low));
        assert!(serde_json::from_str::<ResourceLevel>("\"LOTS\"").is_err());
    }

    #[test]
    fn material_round_trips_its_wire_name() {
        assert_eq!(Material::IronBar.wire_name(), "IRON_BAR");
        assert_eq!(Material::from_wire("PLANK"), Some(Material::Plank));
        assert_eq!(Material::from_wire("plank"), None);
    }

    #[test]
    fn construction_options_are_lowercase() {
        let json = serde_json::to_string(&[Construction::Flag, Construction::Mine]).ok();
        assert_eq!(json.as_deref(), Some(r#"["flag","mine"]"#));
    }

    #[test]
    fn rank_tops_out_at_general() {
        assert_eq!(Rank::General.promoted(), Rank::General);
        assert_eq!(Rank::Private.promoted(), Rank::PrivateFirstClass);
    }
}
