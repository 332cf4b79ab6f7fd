//! Engine objects rendered as wire views with stable ids.
//!
//! A [`Renderer`] is bound to one world and the shared
//! [`IdentityRegistry`]; rendering an object allocates its id on first
//! sight. Callers hold the world lock while rendering, the registry lock is
//! taken and released per id.

use std::collections::BTreeMap;

use settlers_types::{
    BuildingState, CropView, EntityKey, FlagView, GameMessage, HouseView, ObjectId, PlayerKey,
    PlayerView, ResourceAmount, RoadView, SignView, StoneView, TreeView, WorkerView,
    WorldKey,
};
use settlers_world::entities::WALK_SPEED;
use settlers_world::{Building, Crop, Flag, GameMap, Message, Player, Road, Sign, Stone, Tree, Walker};

use crate::registry::{EntityKind, IdentityRegistry, ObjectRef};

/// Renders the objects of one world.
#[derive(Debug, Clone, Copy)]
pub struct Renderer<'a> {
    registry: &'a IdentityRegistry,
    world: WorldKey,
}

impl<'a> Renderer<'a> {
    /// A renderer for the objects of one world.
    pub const fn new(registry: &'a IdentityRegistry, world: WorldKey) -> Self {
        Self { registry, world }
    }

    /// The id of an entity of this world.
    pub fn id(&self, kind: EntityKind, key: EntityKey) -> ObjectId {
        self.registry.id_for(ObjectRef::entity(self.world, kind, key))
    }

    /// The id of a player.
    pub fn player_id(&self, player: PlayerKey) -> ObjectId {
        self.registry.id_for(ObjectRef::Player(player))
    }

    /// A player with the position of its headquarter.
    pub fn player(&self, map: &GameMap, player: &Player) -> PlayerView {
        PlayerView {
            id: self.player_id(player.key),
            name: player.name.clone(),
            color: player.color.clone(),
            kind: player.kind,
            center_point: map.headquarter_of(player.key).map(|hq| hq.position),
        }
    }

    /// A building.
    pub fn house(&self, building: &Building) -> HouseView {
        let spec = building.spec;
        let unfinished = building.state == BuildingState::Unfinished;
        let ready = building.is_ready();

        let mut resources = BTreeMap::new();
        if unfinished {
            for (material, needed) in spec.materials {
                resources.insert(
                    material.wire_name().to_lowercase(),
                    ResourceAmount {
                        has: building.amount(*material),
                        total_needed: Some(*needed),
                    },
                );
            }
        } else if spec.storage {
            for (material, amount) in &building.stock {
                resources.insert(
                    material.wire_name().to_lowercase(),
                    ResourceAmount {
                        has: *amount,
                        total_needed: None,
                    },
                );
            }
        } else if ready {
            for material in spec.consumes {
                resources.insert(
                    material.wire_name().to_lowercase(),
                    ResourceAmount {
                        has: building.amount(*material),
                        total_needed: Some(building.total_needed(*material)),
                    },
                );
            }
        }

        let military = ready && spec.is_military();
        let producer = ready && !spec.produces.is_empty() && !spec.storage;
        HouseView {
            id: self.id(EntityKind::Building, building.key),
            player_id: self.player_id(building.owner),
            x: building.position.x,
            y: building.position.y,
            kind: spec.name.to_owned(),
            state: building.state,
            construction_progress: unfinished.then(|| building.construction_progress()),
            resources,
            productivity: producer.then(|| building.productivity()),
            produces: producer.then(|| spec.produces.to_vec()),
            production_enabled: producer.then_some(building.production_enabled),
            soldiers: military.then(|| building.soldiers.clone()),
            max_soldiers: military.then(|| building.max_soldiers()),
            evacuated: military.then_some(building.evacuated),
            promotions_enabled: military.then_some(building.promotions_enabled),
            upgrading: None,
        }
    }

    /// A flag.
    pub fn flag(&self, flag: &Flag) -> FlagView {
        FlagView {
            id: self.id(EntityKind::Flag, flag.key),
            player_id: self.player_id(flag.owner),
            x: flag.position.x,
            y: flag.position.y,
            stacked_cargo: flag.cargo.clone(),
        }
    }

    /// A road.
    pub fn road(&self, road: &Road) -> RoadView {
        RoadView {
            id: self.id(EntityKind::Road, road.key),
            player_id: self.player_id(road.owner),
            points: road.points.clone(),
        }
    }

    /// A tree.
    pub fn tree(&self, tree: &Tree) -> TreeView {
        TreeView {
            id: self.id(EntityKind::Tree, tree.key),
            x: tree.position.x,
            y: tree.position.y,
        }
    }

    /// A stone pile.
    pub fn stone(&self, stone: &Stone) -> StoneView {
        StoneView {
            id: self.id(EntityKind::Stone, stone.key),
            x: stone.position.x,
            y: stone.position.y,
            amount: stone.amount,
        }
    }

    /// A sign.
    pub fn sign(&self, sign: &Sign) -> SignView {
        SignView {
            id: self.id(EntityKind::Sign, sign.key),
            x: sign.position.x,
            y: sign.position.y,
            kind: sign.kind,
            amount: sign.amount,
        }
    }

    /// A crop.
    pub fn crop(&self, crop: &Crop) -> CropView {
        CropView {
            id: self.id(EntityKind::Crop, crop.key),
            x: crop.position.x,
            y: crop.position.y,
            state: crop.state,
        }
    }

    /// A worker or, when it has no owner, a wild animal.
    pub fn walker(&self, walker: &Walker) -> WorkerView {
        let kind = if walker.owner.is_some() {
            EntityKind::Worker
        } else {
            EntityKind::Animal
        };
        let walking = walker.is_walking();
        WorkerView {
            id: self.id(kind, walker.key),
            x: walker.position.x,
            y: walker.position.y,
            kind: walker.kind,
            inside: walker.inside,
            between_points: walking,
            previous: walking.then_some(walker.position),
            next: walker.next(),
            percentage_traveled: walker.progress,
            speed: walking.then_some(WALK_SPEED),
            cargo: walker.cargo,
            player_id: walker.owner.map(|owner| self.player_id(owner)),
        }
    }

    /// A message of a player's inbox.
    pub fn message(&self, message: &Message) -> GameMessage {
        let house = |key: EntityKey| self.id(EntityKind::Building, key);
        match *message {
            Message::MilitaryBuildingReady(key) => GameMessage::MilitaryBuildingReady {
                house_id: house(key),
            },
            Message::MilitaryBuildingOccupied(key) => GameMessage::MilitaryBuildingOccupied {
                house_id: house(key),
            },
            Message::NoMoreResources(key) => GameMessage::NoMoreResources {
                house_id: house(key),
            },
            Message::UnderAttack(key) => GameMessage::UnderAttack {
                house_id: house(key),
            },
            Message::GeologistFind { point, material } => {
                GameMessage::GeologistFind { point, material }
            }
            Message::BuildingLost(key) => GameMessage::BuildingLost {
                house_id: house(key),
            },
            Message::BuildingCaptured(key) => GameMessage::BuildingCaptured {
                house_id: house(key),
            },
            Message::StoreHouseIsReady(key) => GameMessage::StoreHouseIsReady {
                house_id: house(key),
            },
            Message::MilitaryBuildingCausedLostLand(key) => {
                GameMessage::MilitaryBuildingCausedLostLand {
                    house_id: house(key),
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use settlers_types::{Material, PlayerType, Point};
    use settlers_world::MapTemplate;

    use super::*;

    fn map() -> (GameMap, PlayerKey) {
        let template = MapTemplate::blank("Render", 40, 40, vec![Point::new(20, 20)]);
        let player = Player::new(PlayerKey::new(), "Anna", "#00FF00", PlayerType::HumanPlayer);
        let key = player.key;
        (GameMap::new(&template, vec![player]).unwrap(), key)
    }

    #[test]
    fn ids_are_stable_across_renders() {
        let (map, player) = map();
        let registry = IdentityRegistry::new();
        let renderer = Renderer::new(&registry, map.key());
        let hq = map.headquarter_of(player).unwrap();
        let first = renderer.house(hq);
        let second = renderer.house(hq);
        assert_eq!(first.id, second.id);
        assert_eq!(first.player_id, renderer.player_id(player));
    }

    #[test]
    fn headquarter_shows_its_stock() {
        let (map, player) = map();
        let registry = IdentityRegistry::new();
        let renderer = Renderer::new(&registry, map.key());
        let view = renderer.house(map.headquarter_of(player).unwrap());
        assert_eq!(view.kind, "Headquarter");
        assert_eq!(view.resources.get("plank").map(|r| r.has), Some(44));
        assert!(view.construction_progress.is_none());
    }

    #[test]
    fn unfinished_house_lists_construction_materials() {
        let (mut map, player) = map();
        let key = map.place_building(player, "Woodcutter", Point::new(26, 20)).unwrap();
        let registry = IdentityRegistry::new();
        let renderer = Renderer::new(&registry, map.key());
        let view = renderer.house(map.building(key).unwrap());
        assert_eq!(view.state, BuildingState::Unfinished);
        assert_eq!(view.construction_progress, Some(0));
        let plank = view.resources.get("plank").unwrap();
        assert_eq!(plank.has, 0);
        assert!(plank.total_needed.is_some());
        assert!(view.soldiers.is_none());
    }

    #[test]
    fn messages_refer_to_house_ids() {
        let registry = IdentityRegistry::new();
        let world = WorldKey::new();
        let renderer = Renderer::new(&registry, world);
        let building = EntityKey::new();
        let message = renderer.message(&Message::UnderAttack(building));
        assert_eq!(
            message,
            GameMessage::UnderAttack {
                house_id: renderer.id(EntityKind::Building, building)
            }
        );
        let find = renderer.message(&Message::GeologistFind {
            point: Point::new(3, 3),
            material: Material::Gold,
        });
        assert!(matches!(find, GameMessage::GeologistFind { .. }));
    }
}
