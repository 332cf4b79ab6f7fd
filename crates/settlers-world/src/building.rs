//! Building kinds, the building factory and placed buildings.
//!
//! Every kind is described by a static [`BuildingSpec`]. The
//! [`BuildingFactory`] maps the names clients send (`"Woodcutter"`,
//! `"GuardHouse"`, ...) to their spec; an unknown name is an ordinary error.

use std::collections::{BTreeMap, HashMap, VecDeque};

use settlers_types::{BuildingState, EntityKey, Material, PlayerKey, Point, Rank, Size, WorkerType};

use crate::error::WorldError;

/// Steps a finished building waits before its worker or soldier arrives.
pub const OCCUPY_DELAY: u32 = 10;

/// Steps between two construction deliveries.
pub const DELIVERY_PERIOD: u32 = 4;

/// Steps the builder needs once every material is on site.
pub const BUILD_STEPS: u32 = 10;

/// Steps a torn-down building burns before it is destroyed.
pub const BURN_STEPS: u32 = 20;

/// Steps a destroyed building stays on the map as ruins.
pub const RUIN_STEPS: u32 = 10;

/// Production attempts remembered for the productivity figure.
const PRODUCTIVITY_WINDOW: usize = 10;

/// Land claim of a military building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MilitarySpec {
    /// Radius of owned land once occupied.
    pub radius: u32,
    /// Radius of land discovered once occupied.
    pub discovery_radius: u32,
    /// Soldiers the building can host.
    pub max_soldiers: u32,
}

/// Static description of a building kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildingSpec {
    /// Wire name, for example `"Woodcutter"`.
    pub name: &'static str,
    /// Footprint.
    pub size: Size,
    /// Needs a mountain spot instead of a house spot.
    pub mine: bool,
    /// Construction materials.
    pub materials: &'static [(Material, u32)],
    /// Materials consumed per production cycle.
    pub consumes: &'static [Material],
    /// Materials produced; several alternate per cycle.
    pub produces: &'static [Material],
    /// Steps per production cycle.
    pub production_period: u32,
    /// Land claim, for military buildings.
    pub military: Option<MilitarySpec>,
    /// Final discovery radius of a lookout tower.
    pub lookout_radius: Option<u32>,
    /// Stores materials and workers.
    pub storage: bool,
}

impl BuildingSpec {
    const fn plain(name: &'static str, size: Size, materials: &'static [(Material, u32)]) -> Self {
        Self {
            name,
            size,
            mine: false,
            materials,
            consumes: &[],
            produces: &[],
            production_period: 0,
            military: None,
            lookout_radius: None,
            storage: false,
        }
    }

    const fn producer(
        name: &'static str,
        size: Size,
        materials: &'static [(Material, u32)],
        consumes: &'static [Material],
        produces: &'static [Material],
        production_period: u32,
    ) -> Self {
        Self {
            consumes,
            produces,
            production_period,
            ..Self::plain(name, size, materials)
        }
    }

    const fn mine(name: &'static str, produces: &'static [Material]) -> Self {
        Self {
            mine: true,
            consumes: &[Material::Bread],
            produces,
            production_period: 40,
            ..Self::plain(name, Size::Small, &[(Material::Plank, 4)])
        }
    }

    const fn military(
        name: &'static str,
        size: Size,
        materials: &'static [(Material, u32)],
        radius: u32,
        max_soldiers: u32,
    ) -> Self {
        Self {
            military: Some(MilitarySpec {
                radius,
                discovery_radius: radius.saturating_add(3),
                max_soldiers,
            }),
            ..Self::plain(name, size, materials)
        }
    }

    /// Whether the building claims land.
    pub const fn is_military(&self) -> bool {
        self.military.is_some()
    }

    /// Whether the building produces anything.
    pub const fn can_produce(&self) -> bool {
        !self.produces.is_empty()
    }

    /// Whether this is the player's headquarter.
    pub fn is_headquarter(&self) -> bool {
        self.name == HEADQUARTER.name
    }

    /// Total units of construction material.
    pub fn total_materials(&self) -> u32 {
        self.materials.iter().map(|(_, n)| *n).fold(0, u32::saturating_add)
    }
}

/// The headquarter every player starts with.
pub const HEADQUARTER: BuildingSpec = BuildingSpec {
    military: Some(MilitarySpec {
        radius: 9,
        discovery_radius: 13,
        max_soldiers: 0,
    }),
    storage: true,
    ..BuildingSpec::plain("Headquarter", Size::Large, &[])
};

/// All building kinds.
pub static BUILDING_SPECS: &[BuildingSpec] = &[
    BuildingSpec::producer(
        "ForesterHut",
        Size::Small,
        &[(Material::Plank, 1), (Material::Stone, 1)],
        &[],
        &[],
        0,
    ),
    BuildingSpec::producer(
        "Woodcutter",
        Size::Small,
        &[(Material::Plank, 2)],
        &[],
        &[Material::Wood],
        30,
    ),
    BuildingSpec::producer(
        "Quarry",
        Size::Small,
        &[(Material::Plank, 2)],
        &[],
        &[Material::Stone],
        30,
    ),
    HEADQUARTER,
    BuildingSpec::producer(
        "Sawmill",
        Size::Medium,
        &[(Material::Plank, 2), (Material::Stone, 2)],
        &[Material::Wood],
        &[Material::Plank],
        25,
    ),
    BuildingSpec::producer(
        "Farm",
        Size::Large,
        &[(Material::Plank, 3), (Material::Stone, 3)],
        &[],
        &[Material::Wheat],
        40,
    ),
    BuildingSpec::military("Barracks", Size::Small, &[(Material::Plank, 2)], 6, 2),
    BuildingSpec::producer(
        "Well",
        Size::Small,
        &[(Material::Plank, 2)],
        &[],
        &[Material::Water],
        20,
    ),
    BuildingSpec::producer(
        "Mill",
        Size::Medium,
        &[(Material::Plank, 2), (Material::Stone, 2)],
        &[Material::Wheat],
        &[Material::Flour],
        25,
    ),
    BuildingSpec::producer(
        "Bakery",
        Size::Medium,
        &[(Material::Plank, 2), (Material::Stone, 2)],
        &[Material::Water, Material::Flour],
        &[Material::Bread],
        25,
    ),
    BuildingSpec::producer(
        "Fishery",
        Size::Small,
        &[(Material::Plank, 2)],
        &[],
        &[Material::Fish],
        30,
    ),
    BuildingSpec::mine("GoldMine", &[Material::Gold]),
    BuildingSpec::mine("IronMine", &[Material::Iron]),
    BuildingSpec::mine("CoalMine", &[Material::Coal]),
    BuildingSpec::mine("GraniteMine", &[Material::Stone]),
    BuildingSpec::producer(
        "PigFarm",
        Size::Large,
        &[(Material::Plank, 3), (Material::Stone, 3)],
        &[Material::Wheat, Material::Water],
        &[Material::Pig],
        40,
    ),
    BuildingSpec::producer(
        "Mint",
        Size::Medium,
        &[(Material::Plank, 2), (Material::Stone, 2)],
        &[Material::Gold, Material::Coal],
        &[Material::Coin],
        30,
    ),
    BuildingSpec::producer(
        "SlaughterHouse",
        Size::Medium,
        &[(Material::Plank, 2), (Material::Stone, 2)],
        &[Material::Pig],
        &[Material::Meat],
        25,
    ),
    BuildingSpec::producer(
        "DonkeyFarm",
        Size::Large,
        &[(Material::Plank, 3), (Material::Stone, 3)],
        &[Material::Wheat, Material::Water],
        &[Material::Donkey],
        40,
    ),
    BuildingSpec::military(
        "GuardHouse",
        Size::Small,
        &[(Material::Plank, 2), (Material::Stone, 3)],
        7,
        3,
    ),
    BuildingSpec::military(
        "WatchTower",
        Size::Medium,
        &[(Material::Plank, 3), (Material::Stone, 5)],
        9,
        6,
    ),
    BuildingSpec::military(
        "Fortress",
        Size::Large,
        &[(Material::Plank, 5), (Material::Stone, 7)],
        11,
        9,
    ),
    BuildingSpec::plain(
        "Catapult",
        Size::Medium,
        &[(Material::Plank, 4), (Material::Stone, 2)],
    ),
    BuildingSpec::producer(
        "HunterHut",
        Size::Small,
        &[(Material::Plank, 2)],
        &[],
        &[Material::Meat],
        35,
    ),
    BuildingSpec::producer(
        "IronSmelter",
        Size::Medium,
        &[(Material::Plank, 2), (Material::Stone, 2)],
        &[Material::Iron, Material::Coal],
        &[Material::IronBar],
        30,
    ),
    BuildingSpec::producer(
        "Armory",
        Size::Medium,
        &[(Material::Plank, 2), (Material::Stone, 2)],
        &[Material::IronBar, Material::Coal],
        &[Material::Sword, Material::Shield],
        30,
    ),
    BuildingSpec::producer(
        "Brewery",
        Size::Medium,
        &[(Material::Plank, 2), (Material::Stone, 2)],
        &[Material::Wheat, Material::Water],
        &[Material::Beer],
        25,
    ),
    BuildingSpec {
        storage: true,
        ..BuildingSpec::plain(
            "Storehouse",
            Size::Medium,
            &[(Material::Plank, 4), (Material::Stone, 3)],
        )
    },
    BuildingSpec {
        lookout_radius: Some(16),
        ..BuildingSpec::plain("LookoutTower", Size::Small, &[(Material::Plank, 4)])
    },
];

/// Lookup table from building name to spec.
#[derive(Debug, Clone)]
pub struct BuildingFactory {
    specs: HashMap<&'static str, &'static BuildingSpec>,
}

impl BuildingFactory {
    /// Build the table from every known kind.
    pub fn new() -> Self {
        let specs = BUILDING_SPECS.iter().map(|spec| (spec.name, spec)).collect();
        Self { specs }
    }

    /// Resolve a building name.
    pub fn create(&self, name: &str) -> Result<&'static BuildingSpec, WorldError> {
        self.specs
            .get(name)
            .copied()
            .ok_or_else(|| WorldError::UnknownBuildingType(name.to_owned()))
    }

    /// All known names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.specs.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for BuildingFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// A building placed on a map.
#[derive(Debug, Clone)]
pub struct Building {
    /// Engine key.
    pub key: EntityKey,
    /// Owning player.
    pub owner: PlayerKey,
    /// Kind.
    pub spec: &'static BuildingSpec,
    /// Position of the house; its flag is down-right of it.
    pub position: Point,
    /// Lifecycle state.
    pub state: BuildingState,
    /// Construction material received so far.
    pub delivered: BTreeMap<Material, u32>,
    /// Stored materials: stock for storage buildings, input for producers.
    pub stock: BTreeMap<Material, u32>,
    /// Workers kept in a storage building.
    pub workers: BTreeMap<WorkerType, u32>,
    /// Ranks of hosted soldiers.
    pub soldiers: Vec<Rank>,
    /// Soldiers sent home and no new ones accepted.
    pub evacuated: bool,
    /// Hosted soldiers get promoted over time.
    pub promotions_enabled: bool,
    /// Production switched on.
    pub production_enabled: bool,
    /// Steps left in the current state transition or production cycle.
    pub countdown: u32,
    /// Current discovery radius of a lookout tower.
    pub revealed_radius: u32,
    /// Cycles completed, used to alternate outputs.
    pub cycles: u32,
    /// Set once the out-of-resources message was posted.
    pub out_of_resources: bool,
    recent: VecDeque<bool>,
}

impl Building {
    /// A fresh, unfinished building.
    pub fn new(owner: PlayerKey, spec: &'static BuildingSpec, position: Point) -> Self {
        Self {
            key: EntityKey::new(),
            owner,
            spec,
            position,
            state: BuildingState::Unfinished,
            delivered: BTreeMap::new(),
            stock: BTreeMap::new(),
            workers: BTreeMap::new(),
            soldiers: Vec::new(),
            evacuated: false,
            promotions_enabled: true,
            production_enabled: true,
            countdown: 0,
            revealed_radius: 0,
            cycles: 0,
            out_of_resources: false,
            recent: VecDeque::new(),
        }
    }

    /// The flag point of the building.
    pub const fn flag_point(&self) -> Point {
        self.position.down_right()
    }

    /// Built and standing: unoccupied or occupied.
    pub const fn is_ready(&self) -> bool {
        matches!(
            self.state,
            BuildingState::Unoccupied | BuildingState::Occupied
        )
    }

    /// Staffed.
    pub const fn is_occupied(&self) -> bool {
        matches!(self.state, BuildingState::Occupied)
    }

    /// Burning or destroyed.
    pub const fn is_torn_down(&self) -> bool {
        matches!(
            self.state,
            BuildingState::Burning | BuildingState::Destroyed
        )
    }

    /// Material still missing for construction.
    pub fn missing_material(&self) -> Option<Material> {
        self.spec
            .materials
            .iter()
            .find(|(m, n)| self.delivered.get(m).copied().unwrap_or(0) < *n)
            .map(|(m, _)| *m)
    }

    /// Units of a material the building holds.
    pub fn amount(&self, material: Material) -> u32 {
        if self.state == BuildingState::Unfinished {
            self.delivered.get(&material).copied().unwrap_or(0)
        } else {
            self.stock.get(&material).copied().unwrap_or(0)
        }
    }

    /// Units of a material the building needs in total.
    pub fn total_needed(&self, material: Material) -> u32 {
        if self.state == BuildingState::Unfinished {
            self.spec
                .materials
                .iter()
                .find(|(m, _)| *m == material)
                .map_or(0, |(_, n)| *n)
        } else if self.is_ready() && self.spec.consumes.contains(&material) {
            1
        } else {
            0
        }
    }

    /// Construction progress in percent.
    pub fn construction_progress(&self) -> u32 {
        if self.state != BuildingState::Unfinished {
            return 100;
        }
        let total = self.spec.total_materials();
        if total == 0 {
            return 100;
        }
        let delivered = self.delivered.values().copied().fold(0, u32::saturating_add);
        let material_part = delivered.saturating_mul(80) / total;
        let build_part = if self.missing_material().is_none() {
            BUILD_STEPS.saturating_sub(self.countdown).saturating_mul(20) / BUILD_STEPS
        } else {
            0
        };
        material_part.saturating_add(build_part).min(100)
    }

    /// Take units out of the stock; false when not enough are stored.
    pub fn retrieve(&mut self, material: Material, amount: u32) -> bool {
        let stored = self.stock.get(&material).copied().unwrap_or(0);
        if stored < amount {
            return false;
        }
        self.stock.insert(material, stored.saturating_sub(amount));
        true
    }

    /// Put units into the stock.
    pub fn deposit(&mut self, material: Material, amount: u32) {
        let entry = self.stock.entry(material).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Put workers into a storage building.
    pub fn deposit_worker(&mut self, kind: WorkerType, amount: u32) {
        let entry = self.workers.entry(kind).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Take one worker out of a storage building.
    pub fn retrieve_worker(&mut self, kind: WorkerType) -> bool {
        match self.workers.get_mut(&kind) {
            Some(n) if *n > 0 => {
                *n = n.saturating_sub(1);
                true
            }
            _ => false,
        }
    }

    /// Record the outcome of a production attempt.
    pub fn record_production(&mut self, produced: bool) {
        self.recent.push_back(produced);
        while self.recent.len() > PRODUCTIVITY_WINDOW {
            self.recent.pop_front();
        }
    }

    /// Percentage of recent production attempts that succeeded.
    pub fn productivity(&self) -> u32 {
        if self.recent.is_empty() {
            return 0;
        }
        let hits = self.recent.iter().filter(|r| **r).count();
        let pct = hits.saturating_mul(100) / self.recent.len();
        u32::try_from(pct).unwrap_or(100)
    }

    /// Soldier capacity.
    pub fn max_soldiers(&self) -> u32 {
        self.spec.military.map_or(0, |m| m.max_soldiers)
    }

    /// Whether another soldier fits.
    pub fn wants_soldier(&self) -> bool {
        !self.evacuated
            && !self.spec.is_headquarter()
            && u32::try_from(self.soldiers.len()).unwrap_or(u32::MAX) < self.max_soldiers()
    }
}

/// Starting stock of a headquarter.
pub fn headquarter_stock() -> BTreeMap<Material, u32> {
    BTreeMap::from([
        (Material::Wood, 24),
        (Material::Plank, 44),
        (Material::Stone, 68),
        (Material::Private, 51),
        (Material::Sword, 10),
        (Material::Shield, 10),
        (Material::Fish, 4),
        (Material::Bread, 8),
        (Material::Meat, 6),
        (Material::Water, 4),
        (Material::Wheat, 4),
        (Material::Beer, 4),
        (Material::Coal, 16),
        (Material::Iron, 16),
        (Material::Gold, 0),
    ])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn factory_knows_every_kind() {
        let factory = BuildingFactory::new();
        for name in [
            "ForesterHut",
            "Woodcutter",
            "Quarry",
            "Headquarter",
            "Sawmill",
            "Farm",
            "Barracks",
            "Well",
            "Mill",
            "Bakery",
            "Fishery",
            "GoldMine",
            "IronMine",
            "CoalMine",
            "GraniteMine",
            "PigFarm",
            "Mint",
            "SlaughterHouse",
            "DonkeyFarm",
            "GuardHouse",
            "WatchTower",
            "Fortress",
            "Catapult",
            "HunterHut",
            "IronSmelter",
            "Armory",
            "Brewery",
            "Storehouse",
            "LookoutTower",
        ] {
            assert_eq!(factory.create(name).unwrap().name, name);
        }
        assert_eq!(factory.names().len(), BUILDING_SPECS.len());
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let factory = BuildingFactory::new();
        assert_eq!(
            factory.create("Castle"),
            Err(WorldError::UnknownBuildingType(String::from("Castle")))
        );
    }

    #[test]
    fn construction_progress_tracks_deliveries() {
        let spec = BuildingFactory::new().create("Sawmill").unwrap();
        let mut house = Building::new(PlayerKey::new(), spec, Point::new(4, 4));
        assert_eq!(house.construction_progress(), 0);
        assert_eq!(house.missing_material(), Some(Material::Plank));
        house.delivered.insert(Material::Plank, 2);
        house.delivered.insert(Material::Stone, 2);
        house.countdown = BUILD_STEPS;
        assert_eq!(house.construction_progress(), 80);
        house.countdown = 0;
        assert_eq!(house.construction_progress(), 100);
    }

    #[test]
    fn productivity_is_a_sliding_window() {
        let spec = BuildingFactory::new().create("Well").unwrap();
        let mut well = Building::new(PlayerKey::new(), spec, Point::new(4, 4));
        for _ in 0..10 {
            well.record_production(false);
        }
        for _ in 0..5 {
            well.record_production(true);
        }
        assert_eq!(well.productivity(), 50);
    }
}
