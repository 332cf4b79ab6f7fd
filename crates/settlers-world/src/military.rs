//! Land ownership, occupation and fighting.
//!
//! Owned land is recomputed from scratch whenever a headquarter or military
//! building is occupied, captured or lost. A point contested by several
//! buildings goes to the closest one; ties go to the older building.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use tracing::{debug, info};

use settlers_types::{BuildingState, EntityKey, Material, PlayerKey, Point, Rank, WorkerType};

use crate::entities::{Task, Walker};
use crate::error::WorldError;
use crate::game_map::GameMap;
use crate::player::Message;

/// Steps between two promotions in a military building.
pub const PROMOTION_PERIOD: u64 = 100;

/// Steps between two soldiers sent to fill a military building.
pub const REINFORCE_PERIOD: u64 = 20;

/// Workers living inside the building they staff.
const WORKER_KINDS: [(&str, WorkerType); 3] = [
    ("Woodcutter", WorkerType::WoodcutterWorker),
    ("Quarry", WorkerType::Stonemason),
    ("Farm", WorkerType::Farmer),
];

impl GameMap {
    /// Recompute every player's owned land and clear what now stands on
    /// foreign ground.
    pub(crate) fn update_land(&mut self) {
        let mut claims: BTreeMap<Point, (u32, EntityKey, PlayerKey)> = BTreeMap::new();
        for building in self.buildings.values() {
            let Some(military) = building.spec.military else {
                continue;
            };
            if !building.is_occupied() {
                continue;
            }
            for point in building.position.within(military.radius) {
                if !self.terrain.contains(point) {
                    continue;
                }
                let claim = (building.position.distance(point), building.key, building.owner);
                claims
                    .entry(point)
                    .and_modify(|held| {
                        if (claim.0, claim.1) < (held.0, held.1) {
                            *held = claim;
                        }
                    })
                    .or_insert(claim);
            }
        }

        let mut lost_to: Vec<(PlayerKey, EntityKey)> = Vec::new();
        for player in &mut self.players {
            let land: BTreeSet<Point> = claims
                .iter()
                .filter(|(_, claim)| claim.2 == player.key)
                .map(|(p, _)| *p)
                .collect();
            let cause = player
                .land
                .difference(&land)
                .find_map(|p| claims.get(p).map(|claim| claim.1));
            if let Some(building) = cause {
                lost_to.push((player.key, building));
            }
            player.land = land;
        }
        for (player, building) in lost_to {
            self.post(player, Message::MilitaryBuildingCausedLostLand(building));
        }
        self.clear_foreign_ground();
    }

    fn clear_foreign_ground(&mut self) {
        let owns = |map: &Self, player: PlayerKey, point: Point| {
            map.player(player).is_some_and(|p| p.owns(point))
        };
        let roads: Vec<EntityKey> = self
            .roads
            .values()
            .filter(|r| r.points.iter().any(|p| !owns(self, r.owner, *p)))
            .map(|r| r.key)
            .collect();
        for road in roads {
            self.remove_road_entity(road);
        }
        let flags: Vec<EntityKey> = self
            .flags
            .values()
            .filter(|f| !owns(self, f.owner, f.position))
            .map(|f| f.key)
            .collect();
        for flag in flags {
            self.remove_flag_entity(flag);
        }
        let houses: Vec<EntityKey> = self
            .buildings
            .values()
            .filter(|b| !b.is_torn_down() && !owns(self, b.owner, b.position))
            .map(|b| b.key)
            .collect();
        for house in houses {
            self.start_burning(house);
        }
    }

    /// Staff a finished building.
    pub(crate) fn occupy(&mut self, key: EntityKey) {
        let Some(building) = self.buildings.get_mut(&key) else {
            return;
        };
        building.state = BuildingState::Occupied;
        building.countdown = building.spec.production_period;
        let owner = building.owner;
        let position = building.position;
        let military = building.spec.is_military();
        let worker = WORKER_KINDS
            .iter()
            .find(|(name, _)| *name == building.spec.name)
            .map(|(_, kind)| *kind);

        if let Some(kind) = worker {
            let mut walker = Walker::new(kind, Some(owner), position, Task::Idle);
            walker.inside = true;
            self.walkers.insert(walker.key, walker);
        }
        if military {
            self.post(owner, Message::MilitaryBuildingOccupied(key));
            self.update_land();
            self.discover_around(key);
            info!(building = %key, player = %owner, "Military building occupied");
        }
    }

    /// Move one soldier from the owner's headquarter into a military
    /// building. Returns false when none is available.
    pub(crate) fn reinforce(&mut self, key: EntityKey) -> bool {
        let Some(owner) = self.buildings.get(&key).map(|b| b.owner) else {
            return false;
        };
        let Some(hq) = self.headquarter_of(owner).map(|hq| hq.key) else {
            return false;
        };
        let took = self
            .buildings
            .get_mut(&hq)
            .is_some_and(|hq| hq.retrieve(Material::Private, 1));
        if took {
            if let Some(building) = self.buildings.get_mut(&key) {
                building.soldiers.push(Rank::Private);
            }
        }
        took
    }

    /// Promote the lowest-ranked soldier of every military building that
    /// allows promotions.
    pub(crate) fn promote_soldiers(&mut self) {
        for building in self.buildings.values_mut() {
            if !building.promotions_enabled || !building.is_occupied() {
                continue;
            }
            if let Some(lowest) = building.soldiers.iter_mut().min() {
                *lowest = lowest.promoted();
            }
        }
    }

    /// Soldiers the player could send against a building.
    pub fn available_attackers(&self, player: PlayerKey, target: EntityKey) -> u32 {
        let Some(target) = self.buildings.get(&target) else {
            return 0;
        };
        self.buildings
            .values()
            .filter(|b| b.owner == player && b.is_occupied() && !b.spec.is_headquarter())
            .filter(|b| {
                b.spec
                    .military
                    .is_some_and(|m| b.position.distance(target.position) <= m.discovery_radius)
            })
            .map(|b| u32::try_from(b.soldiers.len().saturating_sub(1)).unwrap_or(0))
            .fold(0, u32::saturating_add)
    }

    /// Send up to `strength` soldiers against another player's military
    /// building. Returns how many left.
    pub fn attack(
        &mut self,
        player: PlayerKey,
        target: EntityKey,
        strength: u32,
    ) -> Result<u32, WorldError> {
        let building = self
            .buildings
            .get(&target)
            .ok_or(WorldError::EntityNotFound(target))?;
        if building.owner == player {
            return Err(WorldError::CannotAttack("the building is your own"));
        }
        if !building.spec.is_military() {
            return Err(WorldError::NotMilitary(target));
        }
        if !building.is_ready() {
            return Err(WorldError::CannotAttack("the building is not finished"));
        }
        let attacker = self.player(player).ok_or(WorldError::UnknownPlayer(player))?;
        if !attacker.has_discovered(building.position) {
            return Err(WorldError::CannotAttack("the building has not been discovered"));
        }
        let defender = building.owner;
        let goal = building.flag_point();
        let target_position = building.position;
        if self.available_attackers(player, target) == 0 {
            return Err(WorldError::CannotAttack("no soldiers available"));
        }

        let sources: Vec<EntityKey> = self
            .buildings
            .values()
            .filter(|b| b.owner == player && b.is_occupied() && !b.spec.is_headquarter())
            .filter(|b| {
                b.spec
                    .military
                    .is_some_and(|m| b.position.distance(target_position) <= m.discovery_radius)
            })
            .map(|b| b.key)
            .collect();

        let mut sent = 0_u32;
        for source in sources {
            while sent < strength {
                let Some(building) = self.buildings.get_mut(&source) else {
                    break;
                };
                if building.soldiers.len() <= 1 {
                    break;
                }
                let Some(rank) = building.soldiers.pop() else {
                    break;
                };
                let start = building.flag_point();
                let mut soldier = Walker::new(
                    WorkerType::Soldier,
                    Some(player),
                    start,
                    Task::Attack { building: target },
                );
                soldier.rank = rank;
                soldier.walk(self.walk_path(start, goal));
                self.walkers.insert(soldier.key, soldier);
                sent = sent.saturating_add(1);
            }
        }

        self.post(defender, Message::UnderAttack(target));
        info!(
            building = %target,
            attacker = %player,
            defender = %defender,
            soldiers = sent,
            "Attack launched"
        );
        Ok(sent)
    }

    /// An attacking soldier reached its target: fight one defender, or
    /// take the building when none is left.
    pub(crate) fn resolve_attack(&mut self, soldier_key: EntityKey, target: EntityKey) {
        let Some(soldier) = self.walkers.get(&soldier_key).cloned() else {
            return;
        };
        let Some(attacker) = soldier.owner else {
            return;
        };
        let defender_rank = match self.buildings.get(&target) {
            Some(b) if b.owner != attacker && !b.is_torn_down() => b.soldiers.iter().max().copied(),
            _ => {
                let mut soldier = soldier;
                self.send_home(&mut soldier);
                self.walkers.insert(soldier_key, soldier);
                return;
            }
        };

        let Some(defender_rank) = defender_rank else {
            self.capture(target, attacker, soldier);
            return;
        };
        let attacker_wins = match soldier.rank.cmp(&defender_rank) {
            core::cmp::Ordering::Greater => true,
            core::cmp::Ordering::Less => false,
            core::cmp::Ordering::Equal => self.rng.random_bool(0.5),
        };
        if attacker_wins {
            if let Some(building) = self.buildings.get_mut(&target) {
                if let Some(index) = building.soldiers.iter().position(|r| *r == defender_rank) {
                    building.soldiers.remove(index);
                }
            }
            debug!(building = %target, "Defender fell");
        } else {
            self.walkers.remove(&soldier_key);
            debug!(building = %target, "Attacker fell");
        }
    }

    fn capture(&mut self, target: EntityKey, attacker: PlayerKey, soldier: Walker) {
        self.walkers.remove(&soldier.key);
        let Some(building) = self.buildings.get_mut(&target) else {
            return;
        };
        let defender = building.owner;
        if building.spec.is_headquarter() {
            building.soldiers.clear();
            self.start_burning(target);
            self.post(defender, Message::BuildingLost(target));
            self.update_land();
            return;
        }
        building.owner = attacker;
        building.soldiers = vec![soldier.rank];
        building.evacuated = false;
        let flag_point = building.flag_point();
        if let Some(flag) = self.flags.values_mut().find(|f| f.position == flag_point) {
            let attached: Vec<EntityKey> = self
                .roads
                .values()
                .filter(|r| r.has_endpoint(flag.position))
                .map(|r| r.key)
                .collect();
            flag.owner = attacker;
            flag.cargo.clear();
            for road in attached {
                self.remove_road_entity(road);
            }
        }
        self.post(attacker, Message::BuildingCaptured(target));
        self.post(defender, Message::BuildingLost(target));
        self.update_land();
        self.discover_around(target);
        info!(building = %target, attacker = %attacker, defender = %defender, "Building captured");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use settlers_types::PlayerType;

    use crate::player::Player;
    use crate::template::MapTemplate;

    use super::*;

    fn two_player_map() -> (GameMap, PlayerKey, PlayerKey) {
        let template = MapTemplate::blank(
            "Duel",
            60,
            40,
            vec![Point::new(10, 20), Point::new(44, 20)],
        );
        let a = Player::new(PlayerKey::new(), "A", "#FF0000", PlayerType::HumanPlayer);
        let b = Player::new(PlayerKey::new(), "B", "#0000FF", PlayerType::HumanPlayer);
        let (ka, kb) = (a.key, b.key);
        (GameMap::new(&template, vec![a, b]).unwrap(), ka, kb)
    }

    #[test]
    fn occupied_barracks_extend_land() {
        let (mut map, a, _) = two_player_map();
        let point = Point::new(18, 20);
        let barracks = map.place_building(a, "Barracks", point).unwrap();
        assert!(!map.player(a).unwrap().owns(Point::new(30, 20)));
        map.construct_instantly(barracks).unwrap();
        let player = map.player(a).unwrap();
        assert!(player.owns(Point::new(30, 20)));
        assert!(player.messages.contains(&Message::MilitaryBuildingOccupied(barracks)));
    }

    #[test]
    fn contested_land_goes_to_the_closest_building() {
        let (map, a, b) = two_player_map();
        let a_land = &map.player(a).unwrap().land;
        let b_land = &map.player(b).unwrap().land;
        assert!(a_land.is_disjoint(b_land));
        assert!(a_land.contains(&Point::new(18, 20)));
        assert!(b_land.contains(&Point::new(36, 20)));
    }

    #[test]
    fn cannot_attack_own_or_civil_buildings() {
        let (mut map, a, b) = two_player_map();
        let own = map.headquarter_of(a).unwrap().key;
        assert_eq!(
            map.attack(a, own, 1),
            Err(WorldError::CannotAttack("the building is your own"))
        );
        let well = map.place_building(b, "Well", Point::new(40, 24)).unwrap();
        assert_eq!(map.attack(a, well, 1), Err(WorldError::NotMilitary(well)));
    }

    #[test]
    fn attack_sends_soldiers_and_warns_defender() {
        let (mut map, a, b) = two_player_map();
        let guard = map.place_building(a, "GuardHouse", Point::new(18, 20)).unwrap();
        map.construct_instantly(guard).unwrap();
        assert!(map.reinforce(guard));
        assert!(map.reinforce(guard));
        let target = map.place_building(b, "Barracks", Point::new(36, 20)).unwrap();
        map.construct_instantly(target).unwrap();
        assert!(map.player(a).unwrap().has_discovered(Point::new(36, 20)));

        let sent = map.attack(a, target, 5).unwrap();
        assert_eq!(sent, 2);
        assert_eq!(map.building(guard).unwrap().soldiers.len(), 1);
        assert!(map.player(b).unwrap().messages.contains(&Message::UnderAttack(target)));
        assert_eq!(
            map.workers()
                .filter(|w| matches!(w.task, Task::Attack { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn empty_building_is_captured() {
        let (mut map, a, b) = two_player_map();
        let target = map.place_building(b, "Barracks", Point::new(36, 20)).unwrap();
        map.construct_instantly(target).unwrap();
        map.buildings.get_mut(&target).unwrap().soldiers.clear();
        let mut soldier = Walker::new(
            WorkerType::Soldier,
            Some(a),
            Point::new(37, 19),
            Task::Attack { building: target },
        );
        soldier.rank = Rank::General;
        let key = soldier.key;
        map.walkers.insert(key, soldier);
        map.resolve_attack(key, target);
        assert_eq!(map.building(target).unwrap().owner, a);
        assert!(map.player(a).unwrap().messages.contains(&Message::BuildingCaptured(target)));
        assert!(map.player(b).unwrap().messages.contains(&Message::BuildingLost(target)));
    }
}
