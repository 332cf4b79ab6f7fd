//! The world: one running map and everything on it.
//!
//! [`GameMap`] owns every entity of a game. Queries borrow it immutably;
//! mutators check the request first and only then change anything, so a
//! refused request leaves the map untouched. Callers outside the engine
//! reach a map only while holding its world lock.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::debug;

use settlers_types::{
    BuildingState, Construction, EntityKey, Material, PlayerKey, Point, Rank, ResourceLevel, Size,
    WorkerType, WorldKey,
};

use crate::building::{Building, BuildingFactory, headquarter_stock};
use crate::entities::{Flag, Road, Sign, Stone, Task, Tree, Walker, Crop};
use crate::error::WorldError;
use crate::player::{Message, Player};
use crate::statistics::Statistics;
use crate::template::MapTemplate;
use crate::terrain::Terrain;

/// Scouts put into every headquarter when a game starts.
pub const STARTING_SCOUTS: u32 = 14;

/// Geologists kept in a fresh headquarter.
pub const STARTING_GEOLOGISTS: u32 = 5;

/// Stone, plank and wood added or removed per resource level step.
pub const RESOURCE_LEVEL_DELTA: u32 = 3;

/// Points a scout visits before returning home.
const SCOUT_POINTS: u32 = 8;

/// Points a geologist investigates before returning home.
const GEOLOGIST_POINTS: u32 = 5;

/// Points blocked by something already standing on the map.
#[derive(Debug, Default)]
pub(crate) struct Occupancy {
    pub(crate) houses: HashSet<Point>,
    pub(crate) flags: HashSet<Point>,
    pub(crate) roads: HashSet<Point>,
    pub(crate) nature: HashSet<Point>,
}

impl Occupancy {
    pub(crate) fn is_free(&self, point: Point) -> bool {
        !self.houses.contains(&point)
            && !self.flags.contains(&point)
            && !self.roads.contains(&point)
            && !self.nature.contains(&point)
    }
}

/// One running game map.
#[derive(Debug)]
pub struct GameMap {
    pub(crate) key: WorldKey,
    pub(crate) time: u64,
    pub(crate) terrain: Terrain,
    pub(crate) factory: BuildingFactory,
    pub(crate) players: Vec<Player>,
    pub(crate) buildings: BTreeMap<EntityKey, Building>,
    pub(crate) flags: BTreeMap<EntityKey, Flag>,
    pub(crate) roads: BTreeMap<EntityKey, Road>,
    pub(crate) trees: BTreeMap<EntityKey, Tree>,
    pub(crate) stones: BTreeMap<EntityKey, Stone>,
    pub(crate) signs: BTreeMap<EntityKey, Sign>,
    pub(crate) crops: BTreeMap<EntityKey, Crop>,
    pub(crate) walkers: BTreeMap<EntityKey, Walker>,
    pub(crate) statistics: Statistics,
    pub(crate) rng: SmallRng,
}

impl GameMap {
    /// Start a map from a template: nature is placed and every player gets
    /// a headquarter at the starting point with the same index.
    pub fn new(template: &MapTemplate, players: Vec<Player>) -> Result<Self, WorldError> {
        if players.len() > template.max_players() {
            return Err(WorldError::TooManyPlayers {
                max: template.max_players(),
                got: players.len(),
            });
        }

        let key = WorldKey::new();
        let statistics = Statistics::new(players.iter().map(|p| p.key).collect());
        let mut map = Self {
            key,
            time: 0,
            terrain: template.terrain(),
            factory: BuildingFactory::new(),
            players,
            buildings: BTreeMap::new(),
            flags: BTreeMap::new(),
            roads: BTreeMap::new(),
            trees: BTreeMap::new(),
            stones: BTreeMap::new(),
            signs: BTreeMap::new(),
            crops: BTreeMap::new(),
            walkers: BTreeMap::new(),
            statistics,
            rng: SmallRng::seed_from_u64(key.into_inner()),
        };

        for position in &template.trees {
            if map.terrain.contains(*position) {
                let tree = Tree {
                    key: EntityKey::new(),
                    position: *position,
                };
                map.trees.insert(tree.key, tree);
            }
        }
        for (position, amount) in &template.stones {
            if map.terrain.contains(*position) {
                let stone = Stone {
                    key: EntityKey::new(),
                    position: *position,
                    amount: *amount,
                };
                map.stones.insert(stone.key, stone);
            }
        }
        for position in &template.animals {
            let animal = Walker::new(WorkerType::WildAnimal, None, *position, Task::Wander);
            map.walkers.insert(animal.key, animal);
        }

        let starts: Vec<(PlayerKey, Point)> = map
            .players
            .iter()
            .map(|p| p.key)
            .zip(template.starting_points.iter().copied())
            .collect();
        for (player, point) in starts {
            map.place_headquarter(player, point)?;
        }

        debug!(
            world = %key,
            map = %template.title,
            players = map.players.len(),
            "Game map created"
        );
        Ok(map)
    }

    fn place_headquarter(&mut self, player: PlayerKey, point: Point) -> Result<EntityKey, WorldError> {
        if !self.terrain.contains(point) {
            return Err(WorldError::InvalidPoint(point));
        }
        let spec = self.factory.create("Headquarter")?;
        let mut hq = Building::new(player, spec, point);
        hq.state = BuildingState::Occupied;
        hq.stock = headquarter_stock();
        hq.deposit_worker(WorkerType::Courier, 20);
        hq.deposit_worker(WorkerType::Geologist, STARTING_GEOLOGISTS);
        hq.deposit_worker(WorkerType::Scout, STARTING_SCOUTS);
        let key = hq.key;
        let flag = Flag::new(player, hq.flag_point());
        self.flags.insert(flag.key, flag);
        self.buildings.insert(key, hq);
        self.update_land();
        self.discover_around(key);
        Ok(key)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Key of this world.
    pub const fn key(&self) -> WorldKey {
        self.key
    }

    /// Simulated time in steps.
    pub const fn time(&self) -> u64 {
        self.time
    }

    /// The terrain.
    pub const fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    /// Players in join order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// One player.
    pub fn player(&self, key: PlayerKey) -> Option<&Player> {
        self.players.iter().find(|p| p.key == key)
    }

    /// One player, mutable; used to rename or recolor.
    pub fn player_mut(&mut self, key: PlayerKey) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.key == key)
    }

    /// All buildings.
    pub fn buildings(&self) -> impl Iterator<Item = &Building> {
        self.buildings.values()
    }

    /// One building.
    pub fn building(&self, key: EntityKey) -> Option<&Building> {
        self.buildings.get(&key)
    }

    /// The building standing at a point.
    pub fn building_at(&self, point: Point) -> Option<&Building> {
        self.buildings.values().find(|b| b.position == point)
    }

    /// A player's headquarter.
    pub fn headquarter_of(&self, player: PlayerKey) -> Option<&Building> {
        self.buildings
            .values()
            .find(|b| b.owner == player && b.spec.is_headquarter() && !b.is_torn_down())
    }

    /// All flags.
    pub fn flags(&self) -> impl Iterator<Item = &Flag> {
        self.flags.values()
    }

    /// One flag.
    pub fn flag(&self, key: EntityKey) -> Option<&Flag> {
        self.flags.get(&key)
    }

    /// The flag at a point.
    pub fn flag_at(&self, point: Point) -> Option<&Flag> {
        self.flags.values().find(|f| f.position == point)
    }

    /// All roads.
    pub fn roads(&self) -> impl Iterator<Item = &Road> {
        self.roads.values()
    }

    /// One road.
    pub fn road(&self, key: EntityKey) -> Option<&Road> {
        self.roads.get(&key)
    }

    /// The road passing through a point between its flags.
    pub fn road_at(&self, point: Point) -> Option<&Road> {
        self.roads
            .values()
            .find(|r| r.inner_points().contains(&point))
    }

    /// All trees.
    pub fn trees(&self) -> impl Iterator<Item = &Tree> {
        self.trees.values()
    }

    /// All stones.
    pub fn stones(&self) -> impl Iterator<Item = &Stone> {
        self.stones.values()
    }

    /// All geologist signs.
    pub fn signs(&self) -> impl Iterator<Item = &Sign> {
        self.signs.values()
    }

    /// All crops.
    pub fn crops(&self) -> impl Iterator<Item = &Crop> {
        self.crops.values()
    }

    /// Workers and soldiers, without wild animals.
    pub fn workers(&self) -> impl Iterator<Item = &Walker> {
        self.walkers
            .values()
            .filter(|w| w.kind != WorkerType::WildAnimal)
    }

    /// Wild animals.
    pub fn animals(&self) -> impl Iterator<Item = &Walker> {
        self.walkers
            .values()
            .filter(|w| w.kind == WorkerType::WildAnimal)
    }

    /// Land and production statistics.
    pub const fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    // -----------------------------------------------------------------------
    // Placement eligibility
    // -----------------------------------------------------------------------

    pub(crate) fn occupancy(&self) -> Occupancy {
        let mut occ = Occupancy::default();
        occ.houses.extend(self.buildings.values().map(|b| b.position));
        occ.flags.extend(self.flags.values().map(|f| f.position));
        for road in self.roads.values() {
            occ.roads.extend(road.inner_points().iter().copied());
        }
        occ.nature.extend(self.trees.values().map(|t| t.position));
        occ.nature.extend(self.stones.values().map(|s| s.position));
        occ.nature.extend(self.crops.values().map(|c| c.position));
        occ
    }

    fn flag_allowed(&self, player: &Player, occ: &Occupancy, point: Point) -> bool {
        player.owns(point)
            && self.terrain.allows_flag(point)
            && !occ.flags.contains(&point)
            && !occ.houses.contains(&point)
            && !occ.nature.contains(&point)
            && point.neighbors().iter().all(|n| !occ.flags.contains(n))
    }

    fn flag_ready_for_house(&self, player: &Player, occ: &Occupancy, point: Point) -> bool {
        let flag = point.down_right();
        self.flag_at(flag).is_some_and(|f| f.owner == player.key)
            || (!occ.roads.contains(&flag) && self.flag_allowed(player, occ, flag))
    }

    fn spot_clear(&self, player: &Player, occ: &Occupancy, point: Point) -> bool {
        let flag = point.down_right();
        self.terrain.contains(point)
            && player.owns(point)
            && occ.is_free(point)
            && point
                .neighbors()
                .iter()
                .filter(|n| **n != flag)
                .all(|n| !occ.houses.contains(n) && !occ.flags.contains(n))
            && self.flag_ready_for_house(player, occ, point)
    }

    fn house_size(&self, player: &Player, occ: &Occupancy, point: Point) -> Option<Size> {
        if !self.terrain.is_buildable(point) || !self.spot_clear(player, occ, point) {
            return None;
        }
        let flag = point.down_right();
        let around: Vec<Point> = point
            .neighbors()
            .into_iter()
            .filter(|n| *n != flag)
            .collect();
        let medium = around.iter().all(|n| {
            player.owns(*n)
                && self.terrain.is_buildable(*n)
                && !occ.nature.contains(n)
                && !occ.roads.contains(n)
        });
        if !medium {
            return Some(Size::Small);
        }
        let large = point
            .within(2)
            .into_iter()
            .filter(|p| point.distance(*p) == 2)
            .all(|p| player.owns(p) && !occ.houses.contains(&p) && !occ.nature.contains(&p));
        Some(if large { Size::Large } else { Size::Medium })
    }

    fn mine_allowed(&self, player: &Player, occ: &Occupancy, point: Point) -> bool {
        self.terrain.is_mineable(point) && self.spot_clear(player, occ, point)
    }

    fn owner_of(&self, player: PlayerKey) -> Result<&Player, WorldError> {
        self.player(player).ok_or(WorldError::UnknownPlayer(player))
    }

    /// Owned points where the player may put a flag.
    pub fn available_flag_points(&self, player: PlayerKey) -> BTreeSet<Point> {
        let Some(owner) = self.player(player) else {
            return BTreeSet::new();
        };
        let occ = self.occupancy();
        owner
            .land
            .iter()
            .filter(|p| self.flag_allowed(owner, &occ, **p))
            .copied()
            .collect()
    }

    /// Owned points where the player may build, with the largest size.
    pub fn available_house_points(&self, player: PlayerKey) -> BTreeMap<Point, Size> {
        let Some(owner) = self.player(player) else {
            return BTreeMap::new();
        };
        let occ = self.occupancy();
        owner
            .land
            .iter()
            .filter_map(|p| self.house_size(owner, &occ, *p).map(|s| (*p, s)))
            .collect()
    }

    /// Owned points where the player may dig a mine.
    pub fn available_mine_points(&self, player: PlayerKey) -> BTreeSet<Point> {
        let Some(owner) = self.player(player) else {
            return BTreeSet::new();
        };
        let occ = self.occupancy();
        owner
            .land
            .iter()
            .filter(|p| self.mine_allowed(owner, &occ, **p))
            .copied()
            .collect()
    }

    /// Everything the player may construct at one point, every house size
    /// up to the largest included.
    pub fn available_construction(&self, player: PlayerKey, point: Point) -> Vec<Construction> {
        let Some(owner) = self.player(player) else {
            return Vec::new();
        };
        let occ = self.occupancy();
        let mut options = Vec::new();
        if self.flag_allowed(owner, &occ, point) {
            options.push(Construction::Flag);
        }
        match self.house_size(owner, &occ, point) {
            Some(Size::Large) => {
                options.extend([Construction::Small, Construction::Medium, Construction::Large]);
            }
            Some(Size::Medium) => options.extend([Construction::Small, Construction::Medium]),
            Some(Size::Small) => options.push(Construction::Small),
            None => {}
        }
        if self.mine_allowed(owner, &occ, point) {
            options.push(Construction::Mine);
        }
        options
    }

    /// Neighbours a road being drawn from `point` could continue to: free
    /// walkable owned points, and the player's flags as endpoints.
    pub fn possible_road_connections(&self, player: PlayerKey, point: Point) -> Vec<Point> {
        let Some(owner) = self.player(player) else {
            return Vec::new();
        };
        let occ = self.occupancy();
        point
            .neighbors()
            .into_iter()
            .filter(|n| self.terrain.contains(*n) && owner.owns(*n))
            .filter(|n| {
                self.flag_at(*n).is_some_and(|f| f.owner == player)
                    || (occ.is_free(*n) && self.terrain.is_walkable(*n))
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    /// Place a building of the named kind. Its flag is put down-right of it
    /// unless one stands there already.
    pub fn place_building(
        &mut self,
        player: PlayerKey,
        kind: &str,
        point: Point,
    ) -> Result<EntityKey, WorldError> {
        let spec = self.factory.create(kind)?;
        if !self.terrain.contains(point) {
            return Err(WorldError::InvalidPoint(point));
        }
        let owner = self.owner_of(player)?;
        let occ = self.occupancy();
        let fits = if spec.mine {
            self.mine_allowed(owner, &occ, point)
        } else {
            !spec.is_headquarter()
                && self
                    .house_size(owner, &occ, point)
                    .is_some_and(|size| size >= spec.size)
        };
        if !fits {
            return Err(WorldError::NotAvailable {
                what: "building",
                point,
            });
        }

        let building = Building::new(player, spec, point);
        let key = building.key;
        let flag_point = building.flag_point();
        if self.flag_at(flag_point).is_none() {
            let flag = Flag::new(player, flag_point);
            self.flags.insert(flag.key, flag);
        }
        self.buildings.insert(key, building);
        debug!(building = %key, kind, %point, "Building placed");
        Ok(key)
    }

    /// Place a flag. A flag on one of the player's roads splits the road.
    pub fn place_flag(&mut self, player: PlayerKey, point: Point) -> Result<EntityKey, WorldError> {
        if !self.terrain.contains(point) {
            return Err(WorldError::InvalidPoint(point));
        }
        let owner = self.owner_of(player)?;
        let occ = self.occupancy();
        if !self.flag_allowed(owner, &occ, point) {
            return Err(WorldError::NotAvailable { what: "flag", point });
        }
        if let Some(road) = self.road_at(point) {
            if road.owner != player {
                return Err(WorldError::NotAvailable { what: "flag", point });
            }
        }

        let flag = Flag::new(player, point);
        let key = flag.key;
        self.flags.insert(key, flag);
        self.split_road_at(point);
        Ok(key)
    }

    fn split_road_at(&mut self, point: Point) {
        let Some(road) = self.road_at(point).cloned() else {
            return;
        };
        let Some(index) = road.points.iter().position(|p| *p == point) else {
            return;
        };
        self.remove_road_entity(road.key);
        let (first, second) = road.points.split_at(index);
        let mut first = first.to_vec();
        first.push(point);
        for points in [first, second.to_vec()] {
            self.insert_road(road.owner, points);
        }
    }

    fn insert_road(&mut self, owner: PlayerKey, points: Vec<Point>) -> EntityKey {
        let mut road = Road::new(owner, points);
        let middle = road
            .points
            .get(road.points.len() / 2)
            .copied()
            .or(road.start());
        if let (Some(start), Some(middle)) = (road.start(), middle) {
            let mut courier = Walker::new(
                WorkerType::Courier,
                Some(owner),
                start,
                Task::Courier { road: road.key },
            );
            courier.walk(road.points.iter().copied().take_while(|p| *p != middle).chain([middle]));
            road.courier = Some(courier.key);
            self.walkers.insert(courier.key, courier);
        }
        let key = road.key;
        self.roads.insert(key, road);
        key
    }

    /// Place a road through the given waypoints, flag to flag.
    pub fn place_road(&mut self, player: PlayerKey, points: &[Point]) -> Result<EntityKey, WorldError> {
        let owner = self.owner_of(player)?;
        let (Some(start), Some(end)) = (points.first().copied(), points.last().copied()) else {
            return Err(WorldError::InvalidRoad(String::from("a road needs at least two points")));
        };
        if points.len() < 2 {
            return Err(WorldError::InvalidRoad(String::from("a road needs at least two points")));
        }
        if let Some(bad) = points.iter().find(|p| !self.terrain.contains(**p)) {
            return Err(WorldError::InvalidPoint(*bad));
        }
        if points.windows(2).any(|w| match w {
            [a, b] => !a.is_adjacent(*b),
            _ => false,
        }) {
            return Err(WorldError::InvalidRoad(String::from("waypoints must be adjacent")));
        }
        let unique: HashSet<Point> = points.iter().copied().collect();
        if unique.len() != points.len() {
            return Err(WorldError::InvalidRoad(String::from("a road cannot cross itself")));
        }
        for end_point in [start, end] {
            match self.flag_at(end_point) {
                Some(flag) if flag.owner == player => {}
                _ => return Err(WorldError::NoFlagAt(end_point)),
            }
        }
        let occ = self.occupancy();
        let inner = points.get(1..points.len().saturating_sub(1)).unwrap_or(&[]);
        for p in inner {
            if !owner.owns(*p) || !self.terrain.is_walkable(*p) || !occ.is_free(*p) {
                return Err(WorldError::InvalidRoad(format!("{p} is blocked")));
            }
        }
        if self
            .roads
            .values()
            .any(|r| r.has_endpoint(start) && r.has_endpoint(end) && r.points.len() == points.len())
        {
            return Err(WorldError::InvalidRoad(String::from("the flags are already connected")));
        }

        let key = self.insert_road(player, points.to_vec());
        debug!(road = %key, length = points.len(), "Road placed");
        Ok(key)
    }

    /// Shortest free path from `from` to `to` over the player's land,
    /// avoiding the given points. Both ends are included.
    pub fn find_auto_selected_road(
        &self,
        player: PlayerKey,
        from: Point,
        to: Point,
        avoid: &BTreeSet<Point>,
    ) -> Option<Vec<Point>> {
        let owner = self.player(player)?;
        if from == to {
            return None;
        }
        let occ = self.occupancy();
        let mut previous: HashMap<Point, Point> = HashMap::new();
        let mut queue = VecDeque::from([from]);
        let mut seen = HashSet::from([from]);
        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = vec![to];
                let mut cursor = to;
                while let Some(prev) = previous.get(&cursor) {
                    path.push(*prev);
                    cursor = *prev;
                }
                path.reverse();
                return Some(path);
            }
            for next in current.neighbors() {
                if seen.contains(&next) || avoid.contains(&next) {
                    continue;
                }
                let passable = next == to
                    || (owner.owns(next) && self.terrain.is_walkable(next) && occ.is_free(next));
                if passable {
                    seen.insert(next);
                    previous.insert(next, current);
                    queue.push_back(next);
                }
            }
        }
        None
    }

    /// Connect two of the player's flags by the shortest free road.
    pub fn place_auto_selected_road(
        &mut self,
        player: PlayerKey,
        from: Point,
        to: Point,
    ) -> Result<EntityKey, WorldError> {
        for end_point in [from, to] {
            if self.flag_at(end_point).is_none() {
                return Err(WorldError::NoFlagAt(end_point));
            }
        }
        let path = self
            .find_auto_selected_road(player, from, to, &BTreeSet::new())
            .ok_or(WorldError::NoRoadPossible { from, to })?;
        self.place_road(player, &path)
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------

    fn check_owner(owner: PlayerKey, player: PlayerKey, entity: EntityKey) -> Result<(), WorldError> {
        if owner == player {
            Ok(())
        } else {
            Err(WorldError::NotOwner { entity })
        }
    }

    pub(crate) fn remove_road_entity(&mut self, key: EntityKey) {
        if let Some(road) = self.roads.remove(&key) {
            if let Some(courier) = road.courier {
                self.walkers.remove(&courier);
            }
        }
    }

    pub(crate) fn remove_flag_entity(&mut self, key: EntityKey) {
        let Some(flag) = self.flags.remove(&key) else {
            return;
        };
        let attached: Vec<EntityKey> = self
            .roads
            .values()
            .filter(|r| r.has_endpoint(flag.position))
            .map(|r| r.key)
            .collect();
        for road in attached {
            self.remove_road_entity(road);
        }
        let house = self
            .buildings
            .values()
            .find(|b| b.flag_point() == flag.position && !b.is_torn_down())
            .map(|b| b.key);
        if let Some(house) = house {
            self.start_burning(house);
        }
    }

    /// Remove a flag together with its roads; a building attached to it
    /// is torn down.
    pub fn remove_flag(&mut self, player: PlayerKey, key: EntityKey) -> Result<(), WorldError> {
        let flag = self.flags.get(&key).ok_or(WorldError::EntityNotFound(key))?;
        Self::check_owner(flag.owner, player, key)?;
        if self
            .headquarter_of(player)
            .is_some_and(|hq| hq.flag_point() == flag.position)
        {
            return Err(WorldError::WrongState(key));
        }
        self.remove_flag_entity(key);
        Ok(())
    }

    /// Remove a road and its courier.
    pub fn remove_road(&mut self, player: PlayerKey, key: EntityKey) -> Result<(), WorldError> {
        let road = self.roads.get(&key).ok_or(WorldError::EntityNotFound(key))?;
        Self::check_owner(road.owner, player, key)?;
        self.remove_road_entity(key);
        Ok(())
    }

    pub(crate) fn start_burning(&mut self, key: EntityKey) {
        let Some(building) = self.buildings.get_mut(&key) else {
            return;
        };
        let was_military = building.spec.is_military() && building.is_occupied();
        building.state = BuildingState::Burning;
        building.countdown = crate::building::BURN_STEPS;
        building.soldiers.clear();
        let position = building.position;
        self.walkers
            .retain(|_, w| !(w.inside && w.position == position));
        if was_military {
            self.update_land();
        }
    }

    /// Set a building on fire. It burns, then lies in ruins, then vanishes.
    pub fn tear_down(&mut self, player: PlayerKey, key: EntityKey) -> Result<(), WorldError> {
        let building = self.buildings.get(&key).ok_or(WorldError::EntityNotFound(key))?;
        Self::check_owner(building.owner, player, key)?;
        if building.is_torn_down() || building.spec.is_headquarter() {
            return Err(WorldError::WrongState(key));
        }
        self.start_burning(key);
        debug!(building = %key, "Building torn down");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Building commands
    // -----------------------------------------------------------------------

    fn owned_building_mut(
        &mut self,
        player: PlayerKey,
        key: EntityKey,
    ) -> Result<&mut Building, WorldError> {
        let building = self
            .buildings
            .get_mut(&key)
            .ok_or(WorldError::EntityNotFound(key))?;
        Self::check_owner(building.owner, player, key)?;
        Ok(building)
    }

    /// Switch production of a producer on or off.
    pub fn set_production_enabled(
        &mut self,
        player: PlayerKey,
        key: EntityKey,
        enabled: bool,
    ) -> Result<(), WorldError> {
        let building = self.owned_building_mut(player, key)?;
        if !building.spec.can_produce() {
            return Err(WorldError::WrongState(key));
        }
        building.production_enabled = enabled;
        Ok(())
    }

    /// Allow or stop soldier promotions in a military building.
    pub fn set_promotions_enabled(
        &mut self,
        player: PlayerKey,
        key: EntityKey,
        enabled: bool,
    ) -> Result<(), WorldError> {
        let building = self.owned_building_mut(player, key)?;
        if !building.spec.is_military() || building.spec.is_headquarter() {
            return Err(WorldError::NotMilitary(key));
        }
        building.promotions_enabled = enabled;
        Ok(())
    }

    /// Send all soldiers but one home, or cancel that.
    pub fn set_evacuated(
        &mut self,
        player: PlayerKey,
        key: EntityKey,
        evacuated: bool,
    ) -> Result<(), WorldError> {
        let building = self.owned_building_mut(player, key)?;
        if !building.spec.is_military() || building.spec.is_headquarter() {
            return Err(WorldError::NotMilitary(key));
        }
        building.evacuated = evacuated;
        if !evacuated || building.soldiers.len() <= 1 {
            return Ok(());
        }
        let leaving: Vec<_> = building.soldiers.drain(1..).collect();
        let flag = building.flag_point();
        for rank in leaving {
            let mut soldier = Walker::new(WorkerType::Soldier, Some(player), flag, Task::ReturnHome);
            soldier.rank = rank;
            self.send_home(&mut soldier);
            self.walkers.insert(soldier.key, soldier);
        }
        Ok(())
    }

    pub(crate) fn send_home(&self, walker: &mut Walker) {
        walker.task = Task::ReturnHome;
        if let Some(home) = walker.owner.and_then(|p| self.headquarter_of(p)) {
            let path = self.walk_path(walker.position, home.flag_point());
            walker.walk(path);
        }
    }

    /// Greedy walk from one point to another, one neighbour at a time.
    pub(crate) fn walk_path(&self, from: Point, to: Point) -> Vec<Point> {
        let mut path = Vec::new();
        let mut current = from;
        let limit = from.distance(to).saturating_mul(2).saturating_add(2);
        for _ in 0..limit {
            if current == to {
                break;
            }
            let next = current
                .neighbors()
                .into_iter()
                .filter(|n| *n == to || self.terrain.is_walkable(*n))
                .min_by_key(|n| n.distance(to));
            match next {
                Some(n) if n.distance(to) < current.distance(to) => {
                    path.push(n);
                    current = n;
                }
                _ => break,
            }
        }
        path
    }

    fn dispatch_from_headquarter(
        &mut self,
        player: PlayerKey,
        point: Point,
        kind: WorkerType,
        task: Task,
    ) -> Result<EntityKey, WorldError> {
        let flag = self
            .flag_at(point)
            .ok_or(WorldError::NoFlagAt(point))?;
        Self::check_owner(flag.owner, player, flag.key)?;
        let hq_key = self
            .headquarter_of(player)
            .map(|hq| hq.key)
            .ok_or(WorldError::UnknownPlayer(player))?;
        let start = self
            .buildings
            .get_mut(&hq_key)
            .and_then(|hq| hq.retrieve_worker(kind).then(|| hq.flag_point()))
            .ok_or(WorldError::NotAvailable {
                what: "worker",
                point,
            })?;
        let mut walker = Walker::new(kind, Some(player), start, task);
        walker.walk(self.walk_path(start, point));
        let key = walker.key;
        self.walkers.insert(key, walker);
        Ok(key)
    }

    /// Send a geologist from the headquarter to investigate around a flag.
    pub fn call_geologist(&mut self, player: PlayerKey, flag_point: Point) -> Result<EntityKey, WorldError> {
        self.dispatch_from_headquarter(
            player,
            flag_point,
            WorkerType::Geologist,
            Task::Prospect {
                remaining: GEOLOGIST_POINTS,
            },
        )
    }

    /// Send a scout from the headquarter to explore beyond a flag.
    pub fn call_scout(&mut self, player: PlayerKey, flag_point: Point) -> Result<EntityKey, WorldError> {
        self.dispatch_from_headquarter(
            player,
            flag_point,
            WorkerType::Scout,
            Task::Explore {
                remaining: SCOUT_POINTS,
            },
        )
    }

    // -----------------------------------------------------------------------
    // Setup helpers
    // -----------------------------------------------------------------------

    /// Adjust every headquarter's stone, plank and wood for a resource level.
    pub fn apply_resource_level(&mut self, level: ResourceLevel) {
        for hq in self
            .buildings
            .values_mut()
            .filter(|b| b.spec.is_headquarter())
        {
            for material in [Material::Stone, Material::Plank, Material::Wood] {
                match level {
                    ResourceLevel::Low => {
                        let left = hq.stock.get(&material).copied().unwrap_or(0);
                        hq.stock
                            .insert(material, left.saturating_sub(RESOURCE_LEVEL_DELTA));
                    }
                    ResourceLevel::Medium => {}
                    ResourceLevel::High => hq.deposit(material, RESOURCE_LEVEL_DELTA),
                }
            }
        }
    }

    /// Finish and staff a building at once.
    pub fn construct_instantly(&mut self, key: EntityKey) -> Result<(), WorldError> {
        let building = self
            .buildings
            .get_mut(&key)
            .ok_or(WorldError::EntityNotFound(key))?;
        if building.state != BuildingState::Unfinished {
            return Err(WorldError::WrongState(key));
        }
        building.delivered = building.spec.materials.iter().copied().collect();
        building.state = BuildingState::Unoccupied;
        building.countdown = 0;
        if building.spec.is_military() {
            building.soldiers.push(Rank::Private);
        }
        self.occupy(key);
        Ok(())
    }

    /// Post a message to a player.
    pub(crate) fn post(&mut self, player: PlayerKey, message: Message) {
        if let Some(p) = self.player_mut(player) {
            p.post(message);
        }
    }

    /// Let a player see everything within the discovery radius of a
    /// building.
    pub(crate) fn discover_around(&mut self, key: EntityKey) {
        let Some(building) = self.buildings.get(&key) else {
            return;
        };
        let Some(radius) = building.spec.military.map(|m| m.discovery_radius) else {
            return;
        };
        let owner = building.owner;
        let points: Vec<Point> = building
            .position
            .within(radius)
            .into_iter()
            .filter(|p| self.terrain.contains(*p))
            .collect();
        if let Some(player) = self.player_mut(owner) {
            player.discover(points);
        }
    }

    /// Points reachable from the player's headquarter flag over roads, with
    /// their distance in roads.
    pub(crate) fn road_network(&self, player: PlayerKey) -> HashMap<Point, u32> {
        let mut distances = HashMap::new();
        let Some(hq) = self.headquarter_of(player) else {
            return distances;
        };
        let start = hq.flag_point();
        distances.insert(start, 0_u32);
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            let here = distances.get(&current).copied().unwrap_or(0);
            for road in self.roads.values().filter(|r| r.owner == player) {
                if let Some(other) = road.other_end(current) {
                    if !distances.contains_key(&other) {
                        distances.insert(other, here.saturating_add(1));
                        queue.push_back(other);
                    }
                }
            }
        }
        distances
    }
}
