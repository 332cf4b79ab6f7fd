//! The simulation step.
//!
//! One call to [`GameMap::step`] advances the world by one unit of time.
//! The phases run in a fixed order: construction, occupation, lookout
//! towers, production, walkers, nature, ruins, statistics.

use rand::Rng;
use tracing::debug;

use settlers_types::{
    BuildingState, CropState, EntityKey, Material, PlayerKey, Point, SignAmount, SignType,
    Vegetation, WorkerType,
};

use crate::building::{BUILD_STEPS, Building, DELIVERY_PERIOD, OCCUPY_DELAY, RUIN_STEPS};
use crate::entities::{Crop, FLAG_CAPACITY, SIGN_LIFETIME, Sign, Task, Tree};
use crate::game_map::GameMap;
use crate::military::{PROMOTION_PERIOD, REINFORCE_PERIOD};
use crate::player::Message;
use crate::statistics::LAND_SAMPLE_PERIOD;

/// Steps between two rings revealed by a lookout tower.
pub const LOOKOUT_REVEAL_PERIOD: u64 = 5;

/// Radius in which producers look for trees, stones, water or game.
const WORK_RADIUS: u32 = 4;

/// Radius around a farm where crops are planted.
const FIELD_RADIUS: u32 = 2;

/// Radius around a scout in which land is discovered.
const SCOUT_SIGHT: u32 = 2;

/// Steps between two trees planted by a forester.
const FORESTER_PERIOD: u64 = 40;

impl GameMap {
    /// Advance the world by one step.
    pub fn step(&mut self) {
        self.time = self.time.saturating_add(1);
        self.advance_construction();
        self.advance_occupation();
        self.advance_lookouts();
        self.advance_production();
        self.advance_walkers();
        self.advance_nature();
        self.advance_ruins();
        if self.every(PROMOTION_PERIOD) {
            self.promote_soldiers();
        }
        if self.every(LAND_SAMPLE_PERIOD) {
            let time = self.time;
            let sizes: Vec<(PlayerKey, usize)> =
                self.players.iter().map(|p| (p.key, p.land.len())).collect();
            self.statistics.sample_land(time, |player| {
                sizes
                    .iter()
                    .find(|(key, _)| *key == player)
                    .map_or(0, |(_, n)| *n)
            });
        }
    }

    /// Whether the current step falls on a multiple of `period`.
    fn every(&self, period: u64) -> bool {
        self.time.checked_rem(period) == Some(0)
    }

    fn keys_where(&self, keep: impl Fn(&Building) -> bool) -> Vec<EntityKey> {
        self.buildings
            .values()
            .filter(|b| keep(b))
            .map(|b| b.key)
            .collect()
    }

    /// Deliver construction material from the headquarter to unfinished
    /// buildings connected to it by road, then let the builder work.
    fn advance_construction(&mut self) {
        let deliver = self.every(u64::from(DELIVERY_PERIOD));
        for key in self.keys_where(|b| b.state == BuildingState::Unfinished) {
            let Some(building) = self.buildings.get(&key) else {
                continue;
            };
            let owner = building.owner;
            let flag = building.flag_point();
            let missing = building.missing_material();

            match missing {
                Some(material) if deliver => {
                    if !self.road_network(owner).contains_key(&flag) {
                        continue;
                    }
                    let Some(hq) = self.headquarter_of(owner).map(|hq| hq.key) else {
                        continue;
                    };
                    let taken = self
                        .buildings
                        .get_mut(&hq)
                        .is_some_and(|hq| hq.retrieve(material, 1));
                    if !taken {
                        continue;
                    }
                    if let Some(building) = self.buildings.get_mut(&key) {
                        let entry = building.delivered.entry(material).or_insert(0);
                        *entry = entry.saturating_add(1);
                        if building.missing_material().is_none() {
                            building.countdown = BUILD_STEPS;
                        }
                    }
                }
                Some(_) => {}
                None => self.build(key),
            }
        }
    }

    fn build(&mut self, key: EntityKey) {
        let Some(building) = self.buildings.get_mut(&key) else {
            return;
        };
        building.countdown = building.countdown.saturating_sub(1);
        if building.countdown > 0 {
            return;
        }
        building.state = BuildingState::Unoccupied;
        building.countdown = OCCUPY_DELAY;
        let owner = building.owner;
        let message = if building.spec.is_military() {
            Some(Message::MilitaryBuildingReady(key))
        } else if building.spec.storage {
            Some(Message::StoreHouseIsReady(key))
        } else {
            None
        };
        debug!(building = %key, kind = building.spec.name, "Construction finished");
        if let Some(message) = message {
            self.post(owner, message);
        }
    }

    /// Staff finished buildings and top up military buildings.
    fn advance_occupation(&mut self) {
        for key in self.keys_where(|b| b.state == BuildingState::Unoccupied) {
            let Some(building) = self.buildings.get_mut(&key) else {
                continue;
            };
            building.countdown = building.countdown.saturating_sub(1);
            if building.countdown > 0 {
                continue;
            }
            if building.spec.is_military() && !building.spec.is_headquarter() {
                if self.reinforce(key) {
                    self.occupy(key);
                } else if let Some(building) = self.buildings.get_mut(&key) {
                    building.countdown = OCCUPY_DELAY;
                }
            } else {
                self.occupy(key);
            }
        }

        if self.every(REINFORCE_PERIOD) {
            for key in self.keys_where(|b| b.is_occupied() && b.wants_soldier()) {
                self.reinforce(key);
            }
        }
    }

    /// Lookout towers reveal one more ring of land every few steps.
    fn advance_lookouts(&mut self) {
        if !self.every(LOOKOUT_REVEAL_PERIOD) {
            return;
        }
        let mut reveals = Vec::new();
        for building in self.buildings.values_mut() {
            let Some(limit) = building.spec.lookout_radius else {
                continue;
            };
            if !building.is_occupied() || building.revealed_radius >= limit {
                continue;
            }
            building.revealed_radius = building.revealed_radius.saturating_add(1);
            reveals.push((building.owner, building.position, building.revealed_radius));
        }
        for (owner, center, radius) in reveals {
            let points: Vec<Point> = center
                .within(radius)
                .into_iter()
                .filter(|p| self.terrain.contains(*p))
                .collect();
            if let Some(player) = self.player_mut(owner) {
                player.discover(points);
            }
        }
    }

    /// Run one production cycle in every staffed producer whose timer ran
    /// out.
    fn advance_production(&mut self) {
        for key in self.keys_where(|b| {
            b.is_occupied() && b.production_enabled && b.spec.production_period > 0
        }) {
            let Some(building) = self.buildings.get_mut(&key) else {
                continue;
            };
            building.countdown = building.countdown.saturating_sub(1);
            if building.countdown > 0 {
                continue;
            }
            building.countdown = building.spec.production_period;
            let produced = self.produce(key);
            if let Some(building) = self.buildings.get_mut(&key) {
                building.record_production(produced);
            }
        }
        for key in self.keys_where(|b| b.is_occupied() && b.spec.name == "ForesterHut") {
            if self.every(FORESTER_PERIOD) {
                self.plant_tree(key);
            }
        }
    }

    fn produce(&mut self, key: EntityKey) -> bool {
        let Some(building) = self.buildings.get(&key) else {
            return false;
        };
        let owner = building.owner;
        let position = building.position;
        let flag_point = building.flag_point();
        let consumes = building.spec.consumes;
        let name = building.spec.name;
        let cycle = usize::try_from(building.cycles).unwrap_or(0);
        let Some(output) = building
            .spec
            .produces
            .get(cycle.checked_rem(building.spec.produces.len()).unwrap_or(0))
            .copied()
        else {
            return false;
        };

        let raw_available = match name {
            "Woodcutter" => self.fell_tree(position),
            "Quarry" => self.cut_stone(position),
            "Fishery" => position
                .within(WORK_RADIUS)
                .iter()
                .any(|p| self.terrain.tile(*p).below == Vegetation::Water),
            "HunterHut" => self.hunt(position),
            "Farm" => self.harvest(position),
            _ => true,
        };
        if !raw_available {
            let notify = self
                .buildings
                .get_mut(&key)
                .is_some_and(|b| !std::mem::replace(&mut b.out_of_resources, true));
            if notify && matches!(name, "Woodcutter" | "Quarry" | "Fishery" | "HunterHut") {
                self.post(owner, Message::NoMoreResources(key));
            }
            return false;
        }

        if !consumes.is_empty() {
            let Some(hq) = self.headquarter_of(owner).map(|hq| hq.key) else {
                return false;
            };
            let connected = self.road_network(owner).contains_key(&flag_point);
            let stocked = connected
                && self.buildings.get(&hq).is_some_and(|hq| {
                    consumes.iter().all(|m| hq.amount(*m) > 0)
                });
            if !stocked {
                return false;
            }
            if let Some(hq) = self.buildings.get_mut(&hq) {
                for material in consumes {
                    hq.retrieve(*material, 1);
                }
            }
        }

        let Some(flag) = self.flags.values_mut().find(|f| f.position == flag_point) else {
            return false;
        };
        if flag.cargo.len() >= FLAG_CAPACITY {
            return false;
        }
        flag.cargo.push(output);
        if let Some(building) = self.buildings.get_mut(&key) {
            building.cycles = building.cycles.saturating_add(1);
            building.out_of_resources = false;
        }
        let time = self.time;
        self.statistics.record_production(time, owner, output);
        true
    }

    fn fell_tree(&mut self, around: Point) -> bool {
        let tree = self
            .trees
            .values()
            .filter(|t| t.position.distance(around) <= WORK_RADIUS)
            .min_by_key(|t| (t.position.distance(around), t.key))
            .map(|t| t.key);
        tree.is_some_and(|key| self.trees.remove(&key).is_some())
    }

    fn cut_stone(&mut self, around: Point) -> bool {
        let stone = self
            .stones
            .values()
            .filter(|s| s.position.distance(around) <= WORK_RADIUS)
            .min_by_key(|s| (s.position.distance(around), s.key))
            .map(|s| s.key);
        let Some(key) = stone else {
            return false;
        };
        let empty = match self.stones.get_mut(&key) {
            Some(stone) => {
                stone.amount = stone.amount.saturating_sub(1);
                stone.amount == 0
            }
            None => return false,
        };
        if empty {
            self.stones.remove(&key);
        }
        true
    }

    fn hunt(&mut self, around: Point) -> bool {
        let animal = self
            .animals()
            .filter(|a| a.position.distance(around) <= WORK_RADIUS.saturating_add(2))
            .map(|a| a.key)
            .next();
        animal.is_some_and(|key| self.walkers.remove(&key).is_some())
    }

    /// Harvest a full-grown field, or plant a new one. Only a harvest
    /// yields wheat.
    fn harvest(&mut self, farm: Point) -> bool {
        let ripe = self
            .crops
            .values()
            .find(|c| c.state == CropState::FullGrown && c.position.distance(farm) <= FIELD_RADIUS)
            .map(|c| c.key);
        if let Some(key) = ripe {
            self.crops.remove(&key);
            return true;
        }
        let occ = self.occupancy();
        let spot = farm
            .within(FIELD_RADIUS)
            .into_iter()
            .filter(|p| *p != farm.down_right() && *p != farm)
            .find(|p| self.terrain.is_buildable(*p) && occ.is_free(*p));
        if let Some(position) = spot {
            let crop = Crop {
                key: EntityKey::new(),
                position,
                state: CropState::JustPlanted,
                age: 0,
            };
            self.crops.insert(crop.key, crop);
        }
        false
    }

    fn plant_tree(&mut self, key: EntityKey) {
        let Some(center) = self.buildings.get(&key).map(|b| b.position) else {
            return;
        };
        let occ = self.occupancy();
        let candidates: Vec<Point> = center
            .within(WORK_RADIUS)
            .into_iter()
            .filter(|p| {
                center.distance(*p) > 1
                    && self.terrain.contains(*p)
                    && self.terrain.is_buildable(*p)
                    && occ.is_free(*p)
            })
            .collect();
        if candidates.is_empty() {
            return;
        }
        let index = self.rng.random_range(0..candidates.len());
        if let Some(position) = candidates.get(index).copied() {
            let tree = Tree {
                key: EntityKey::new(),
                position,
            };
            self.trees.insert(tree.key, tree);
        }
    }

    // -----------------------------------------------------------------------
    // Walkers
    // -----------------------------------------------------------------------

    fn advance_walkers(&mut self) {
        let keys: Vec<EntityKey> = self.walkers.keys().copied().collect();
        for key in keys {
            let Some(walker) = self.walkers.get_mut(&key) else {
                continue;
            };
            if walker.inside {
                continue;
            }
            let moved = walker.advance();
            let arrived = walker.has_arrived();
            let task = walker.task;
            let position = walker.position;
            let owner = walker.owner;

            if moved && walker.kind == WorkerType::Scout {
                if let Some(owner) = owner {
                    let points: Vec<Point> = position
                        .within(SCOUT_SIGHT)
                        .into_iter()
                        .filter(|p| self.terrain.contains(*p))
                        .collect();
                    if let Some(player) = self.player_mut(owner) {
                        player.discover(points);
                    }
                }
            }
            if !arrived {
                continue;
            }
            match task {
                Task::Idle => {}
                Task::Courier { road } => self.courier_arrived(key, road),
                Task::Explore { remaining } => self.explore(key, remaining),
                Task::Prospect { remaining } => self.prospect(key, remaining),
                Task::Attack { building } => self.resolve_attack(key, building),
                Task::ReturnHome => self.walker_home(key),
                Task::Wander => self.wander(key),
            }
        }
    }

    /// A courier stands still: drop carried cargo, or fetch cargo waiting
    /// at the end of the road farther from the headquarter.
    fn courier_arrived(&mut self, key: EntityKey, road_key: EntityKey) {
        let Some(road) = self.roads.get(&road_key) else {
            self.walkers.remove(&key);
            return;
        };
        let (Some(start), Some(end)) = (road.start(), road.end()) else {
            return;
        };
        let points = road.points.clone();
        let owner = road.owner;
        let network = self.road_network(owner);
        let (far, near) = match (network.get(&start), network.get(&end)) {
            (Some(a), Some(b)) if a < b => (end, start),
            (Some(_), Some(_)) => (start, end),
            _ => return,
        };
        let Some(courier) = self.walkers.get(&key) else {
            return;
        };
        let here = courier.position;

        if let Some(cargo) = courier.cargo {
            if here != near {
                return;
            }
            let hq = self
                .headquarter_of(owner)
                .filter(|hq| hq.flag_point() == near)
                .map(|hq| hq.key);
            let dropped = match hq {
                Some(hq) => {
                    if let Some(hq) = self.buildings.get_mut(&hq) {
                        hq.deposit(cargo, 1);
                    }
                    true
                }
                None => self
                    .flags
                    .values_mut()
                    .find(|f| f.position == near)
                    .is_some_and(|flag| {
                        if flag.cargo.len() < FLAG_CAPACITY {
                            flag.cargo.push(cargo);
                            true
                        } else {
                            false
                        }
                    }),
            };
            if dropped {
                if let Some(courier) = self.walkers.get_mut(&key) {
                    courier.cargo = None;
                }
            }
            return;
        }

        let waiting = self
            .flags
            .values()
            .any(|f| f.position == far && !f.cargo.is_empty());
        if !waiting {
            return;
        }
        if here == far {
            let picked = self
                .flags
                .values_mut()
                .find(|f| f.position == far)
                .and_then(|f| (!f.cargo.is_empty()).then(|| f.cargo.remove(0)));
            if let Some(courier) = self.walkers.get_mut(&key) {
                courier.cargo = picked;
                courier.walk(segment(&points, far, near));
            }
        } else if let Some(courier) = self.walkers.get_mut(&key) {
            courier.walk(segment(&points, here, far));
        }
    }

    fn explore(&mut self, key: EntityKey, remaining: u32) {
        if remaining == 0 {
            self.return_walker(key);
            return;
        }
        let Some(position) = self.walkers.get(&key).map(|w| w.position) else {
            return;
        };
        let target = self.random_walkable_near(position, 4);
        let path = self.walk_path(position, target);
        if let Some(walker) = self.walkers.get_mut(&key) {
            walker.task = Task::Explore {
                remaining: remaining.saturating_sub(1),
            };
            walker.walk(path);
        }
    }

    /// Investigate the current point, put up a sign, and move on.
    fn prospect(&mut self, key: EntityKey, remaining: u32) {
        if remaining == 0 {
            self.return_walker(key);
            return;
        }
        let Some((position, owner)) = self.walkers.get(&key).map(|w| (w.position, w.owner)) else {
            return;
        };
        let occ = self.occupancy();
        let has_sign = self.signs.values().any(|s| s.position == position);
        if !has_sign && !occ.houses.contains(&position) && !occ.flags.contains(&position) {
            let (kind, amount) = if self.terrain.touches_mountain(position) {
                if self.rng.random_bool(0.6) {
                    let kinds = [SignType::Gold, SignType::Iron, SignType::Coal, SignType::Granite];
                    let index = self.rng.random_range(0..kinds.len());
                    (kinds.get(index).copied(), Some(self.random_amount()))
                } else {
                    (None, None)
                }
            } else if self.rng.random_bool(0.5) {
                (Some(SignType::Water), Some(self.random_amount()))
            } else {
                (None, None)
            };
            let sign = Sign {
                key: EntityKey::new(),
                position,
                kind,
                amount,
                expires_at: self.time.saturating_add(SIGN_LIFETIME),
            };
            self.signs.insert(sign.key, sign);
            if let (Some(kind), Some(owner)) = (kind, owner) {
                self.post(
                    owner,
                    Message::GeologistFind {
                        point: position,
                        material: kind.material(),
                    },
                );
            }
        }
        let target = self.random_walkable_near(position, 2);
        let path = self.walk_path(position, target);
        if let Some(walker) = self.walkers.get_mut(&key) {
            walker.task = Task::Prospect {
                remaining: remaining.saturating_sub(1),
            };
            walker.walk(path);
        }
    }

    fn random_amount(&mut self) -> SignAmount {
        match self.rng.random_range(0..3) {
            0 => SignAmount::Small,
            1 => SignAmount::Medium,
            _ => SignAmount::Large,
        }
    }

    fn random_walkable_near(&mut self, center: Point, radius: u32) -> Point {
        let candidates: Vec<Point> = center
            .within(radius)
            .into_iter()
            .filter(|p| *p != center && self.terrain.is_walkable(*p))
            .collect();
        if candidates.is_empty() {
            return center;
        }
        let index = self.rng.random_range(0..candidates.len());
        candidates.get(index).copied().unwrap_or(center)
    }

    fn return_walker(&mut self, key: EntityKey) {
        let Some(mut walker) = self.walkers.remove(&key) else {
            return;
        };
        self.send_home(&mut walker);
        if walker.is_walking() {
            self.walkers.insert(key, walker);
        } else {
            self.walker_home_now(walker.owner, walker.kind);
        }
    }

    fn walker_home(&mut self, key: EntityKey) {
        if let Some(walker) = self.walkers.remove(&key) {
            self.walker_home_now(walker.owner, walker.kind);
        }
    }

    fn walker_home_now(&mut self, owner: Option<PlayerKey>, kind: WorkerType) {
        let Some(hq) = owner.and_then(|p| self.headquarter_of(p)).map(|hq| hq.key) else {
            return;
        };
        if let Some(hq) = self.buildings.get_mut(&hq) {
            if kind == WorkerType::Soldier {
                hq.deposit(Material::Private, 1);
            } else {
                hq.deposit_worker(kind, 1);
            }
        }
    }

    fn wander(&mut self, key: EntityKey) {
        if !self.rng.random_bool(0.1) {
            return;
        }
        let Some(position) = self.walkers.get(&key).map(|w| w.position) else {
            return;
        };
        let target = self.random_walkable_near(position, 3);
        let path = self.walk_path(position, target);
        if let Some(animal) = self.walkers.get_mut(&key) {
            animal.walk(path);
        }
    }

    // -----------------------------------------------------------------------
    // Nature and ruins
    // -----------------------------------------------------------------------

    fn advance_nature(&mut self) {
        for crop in self.crops.values_mut() {
            crop.grow();
        }
        let now = self.time;
        self.signs.retain(|_, sign| sign.expires_at > now);
    }

    fn advance_ruins(&mut self) {
        let mut gone = Vec::new();
        for building in self.buildings.values_mut() {
            match building.state {
                BuildingState::Burning => {
                    building.countdown = building.countdown.saturating_sub(1);
                    if building.countdown == 0 {
                        building.state = BuildingState::Destroyed;
                        building.countdown = RUIN_STEPS;
                    }
                }
                BuildingState::Destroyed => {
                    building.countdown = building.countdown.saturating_sub(1);
                    if building.countdown == 0 {
                        gone.push(building.key);
                    }
                }
                _ => {}
            }
        }
        for key in gone {
            self.buildings.remove(&key);
            debug!(building = %key, "Ruins cleared");
        }
    }
}

/// Waypoints of a road from one of its points to another, excluding the
/// start.
fn segment(points: &[Point], from: Point, to: Point) -> Vec<Point> {
    let (Some(a), Some(b)) = (
        points.iter().position(|p| *p == from),
        points.iter().position(|p| *p == to),
    ) else {
        return Vec::new();
    };
    if a <= b {
        points.get(a..=b).map(<[Point]>::to_vec).unwrap_or_default()
    } else {
        let mut back = points.get(b..=a).map(<[Point]>::to_vec).unwrap_or_default();
        back.reverse();
        back
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use settlers_types::PlayerType;

    use crate::player::Player;
    use crate::template::MapTemplate;

    use super::*;

    fn map_with(template: &MapTemplate) -> (GameMap, PlayerKey) {
        let player = Player::new(PlayerKey::new(), "Anna", "#00FF00", PlayerType::HumanPlayer);
        let key = player.key;
        (GameMap::new(template, vec![player]).unwrap(), key)
    }

    fn quiet() -> MapTemplate {
        MapTemplate::blank("Quiet", 60, 60, vec![Point::new(20, 20)])
    }

    #[test]
    fn time_advances_one_per_step() {
        let (mut map, _) = map_with(&quiet());
        map.step();
        map.step();
        assert_eq!(map.time(), 2);
    }

    #[test]
    fn connected_building_gets_built() {
        let (mut map, player) = map_with(&quiet());
        let key = map.place_building(player, "Well", Point::new(26, 20)).unwrap();
        let flag = map.building(key).unwrap().flag_point();
        let hq_flag = map.headquarter_of(player).unwrap().flag_point();
        map.place_auto_selected_road(player, flag, hq_flag).unwrap();
        for _ in 0..100 {
            map.step();
        }
        let well = map.building(key).unwrap();
        assert_eq!(well.state, BuildingState::Occupied);
        assert_eq!(well.construction_progress(), 100);
    }

    #[test]
    fn material_arrives_on_delivery_steps_only() {
        let (mut map, player) = map_with(&quiet());
        let key = map.place_building(player, "Well", Point::new(26, 20)).unwrap();
        let flag = map.building(key).unwrap().flag_point();
        let hq_flag = map.headquarter_of(player).unwrap().flag_point();
        map.place_auto_selected_road(player, flag, hq_flag).unwrap();
        let delivered = |map: &GameMap| -> u32 {
            map.building(key).unwrap().delivered.values().sum()
        };

        for _ in 1..DELIVERY_PERIOD {
            map.step();
        }
        assert_eq!(delivered(&map), 0);
        map.step();
        assert_eq!(delivered(&map), 1);
    }

    #[test]
    fn unconnected_building_stays_unfinished() {
        let (mut map, player) = map_with(&quiet());
        let key = map.place_building(player, "Well", Point::new(26, 20)).unwrap();
        for _ in 0..100 {
            map.step();
        }
        assert_eq!(map.building(key).unwrap().state, BuildingState::Unfinished);
    }

    #[test]
    fn lookout_tower_reveals_beyond_headquarter_sight() {
        let (mut map, player) = map_with(&quiet());
        let tower = map.place_building(player, "LookoutTower", Point::new(26, 20)).unwrap();
        map.construct_instantly(tower).unwrap();
        let before = map.player(player).unwrap().discovered.len();
        for _ in 0..(LOOKOUT_REVEAL_PERIOD * 16) {
            map.step();
        }
        let after = map.player(player).unwrap();
        assert!(after.discovered.len() > before);
        assert!(after.has_discovered(Point::new(50, 20)));
    }

    #[test]
    fn torn_down_building_burns_then_vanishes() {
        let (mut map, player) = map_with(&quiet());
        let key = map.place_building(player, "Well", Point::new(26, 20)).unwrap();
        map.tear_down(player, key).unwrap();
        let mut seen_destroyed = false;
        for _ in 0..40 {
            map.step();
            seen_destroyed |= map
                .building(key)
                .is_some_and(|b| b.state == BuildingState::Destroyed);
        }
        assert!(seen_destroyed);
        assert!(map.building(key).is_none());
    }

    #[test]
    fn quarry_reports_when_stone_runs_out() {
        let mut template = quiet();
        template.stones = vec![(Point::new(28, 24), 1)];
        let (mut map, player) = map_with(&template);
        let quarry = map.place_building(player, "Quarry", Point::new(26, 22)).unwrap();
        map.construct_instantly(quarry).unwrap();
        for _ in 0..100 {
            map.step();
        }
        assert_eq!(map.stones().count(), 0);
        assert!(
            map.player(player)
                .unwrap()
                .messages
                .contains(&Message::NoMoreResources(quarry))
        );
        let stone_made = map.statistics().production(Material::Stone);
        assert_eq!(stone_made.len(), 1);
    }

    #[test]
    fn courier_carries_cargo_to_headquarter() {
        let (mut map, player) = map_with(&quiet());
        let hq_flag = map.headquarter_of(player).unwrap().flag_point();
        let far = Point::new(27, 19);
        map.place_flag(player, far).unwrap();
        map.place_auto_selected_road(player, far, hq_flag).unwrap();
        map.flags
            .values_mut()
            .find(|f| f.position == far)
            .unwrap()
            .cargo
            .push(Material::Gold);
        for _ in 0..80 {
            map.step();
        }
        assert_eq!(map.headquarter_of(player).unwrap().amount(Material::Gold), 1);
    }

    #[test]
    fn segment_walks_either_way() {
        let points = [Point::new(2, 2), Point::new(4, 2), Point::new(6, 2)];
        assert_eq!(segment(&points, Point::new(6, 2), Point::new(2, 2)).len(), 3);
        assert_eq!(
            segment(&points, Point::new(2, 2), Point::new(4, 2)),
            vec![Point::new(2, 2), Point::new(4, 2)]
        );
    }
}
