//! Releasing the ids of entities the engine removed.
//!
//! The engine drops felled trees, expired signs, finished walkers and burnt
//! down buildings without telling anyone. The [`IdReaper`] runs after every
//! tick, under the tick's world lock, and releases the bindings of entities
//! that are no longer in the world. Buildings named in a message inbox keep
//! their id so old messages stay stable.

use std::collections::HashSet;
use std::sync::Arc;

use settlers_types::{EntityKey, WorldKey};
use settlers_world::GameMap;
use tracing::debug;

use crate::registry::{EntityKind, IdentityRegistry, ObjectRef};
use crate::tick::{DeferredWork, TickObserver};

/// Tick observer releasing ids of vanished entities.
#[derive(Debug, Clone)]
pub struct IdReaper {
    registry: Arc<IdentityRegistry>,
}

impl IdReaper {
    /// A reaper working on the shared registry.
    pub const fn new(registry: Arc<IdentityRegistry>) -> Self {
        Self { registry }
    }

    /// Release the ids of every entity of `world` that `map` no longer
    /// holds. The caller holds the world lock. Returns the number of ids
    /// released.
    pub fn reap(&self, world: WorldKey, map: &GameMap) -> usize {
        let live = live_entities(map);
        let released = self.registry.release_where(|object| match *object {
            ObjectRef::Entity { world: w, kind, key } => w == world && !live.contains(&(kind, key)),
            _ => false,
        });
        if released > 0 {
            debug!(world = %world, released, "Released ids of removed entities");
        }
        released
    }
}

impl TickObserver<GameMap> for IdReaper {
    fn capture(&self, world: WorldKey, state: &GameMap) -> Option<DeferredWork> {
        // Must run under the lock: an entity created later in the same
        // critical section would otherwise lose its fresh id.
        self.reap(world, state);
        None
    }
}

fn live_entities(map: &GameMap) -> HashSet<(EntityKind, EntityKey)> {
    let mut live = HashSet::new();
    live.extend(map.buildings().map(|b| (EntityKind::Building, b.key)));
    live.extend(map.flags().map(|f| (EntityKind::Flag, f.key)));
    live.extend(map.roads().map(|r| (EntityKind::Road, r.key)));
    live.extend(map.trees().map(|t| (EntityKind::Tree, t.key)));
    live.extend(map.stones().map(|s| (EntityKind::Stone, s.key)));
    live.extend(map.signs().map(|s| (EntityKind::Sign, s.key)));
    live.extend(map.crops().map(|c| (EntityKind::Crop, c.key)));
    live.extend(map.workers().map(|w| (EntityKind::Worker, w.key)));
    live.extend(map.animals().map(|a| (EntityKind::Animal, a.key)));
    live.extend(
        map.players()
            .iter()
            .flat_map(|p| p.messages.iter())
            .filter_map(|m| m.building())
            .map(|key| (EntityKind::Building, key)),
    );
    live
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use settlers_types::{PlayerKey, PlayerType, Point};
    use settlers_world::{MapTemplate, Message, Player};

    use super::*;
    use crate::render::Renderer;

    fn map() -> (GameMap, PlayerKey) {
        let template = MapTemplate::blank("Reap", 60, 60, vec![Point::new(20, 20)]);
        let player = Player::new(PlayerKey::new(), "Anna", "#00FF00", PlayerType::HumanPlayer);
        let key = player.key;
        (GameMap::new(&template, vec![player]).unwrap(), key)
    }

    #[test]
    fn removed_flag_no_longer_resolves() {
        let (mut map, player) = map();
        let registry = Arc::new(IdentityRegistry::new());
        let reaper = IdReaper::new(Arc::clone(&registry));
        let renderer = Renderer::new(&registry, map.key());

        let flag = map.place_flag(player, Point::new(26, 20)).unwrap();
        let flag_id = renderer.flag(map.flag(flag).unwrap()).id;
        let hq_id = renderer.house(map.headquarter_of(player).unwrap()).id;
        assert_eq!(reaper.reap(map.key(), &map), 0);

        map.remove_flag(player, flag).unwrap();
        assert_eq!(reaper.reap(map.key(), &map), 1);
        assert!(registry.object_for(flag_id).is_err());
        assert!(registry.object_for(hq_id).is_ok());
    }

    #[test]
    fn buildings_named_in_messages_keep_their_id() {
        let (mut map, player) = map();
        let registry = Arc::new(IdentityRegistry::new());
        let reaper = IdReaper::new(Arc::clone(&registry));
        let renderer = Renderer::new(&registry, map.key());

        let gone = EntityKey::new();
        let message = Message::BuildingLost(gone);
        let rendered = renderer.message(&message);
        map.player_mut(player).unwrap().post(message);
        let untracked = renderer.id(EntityKind::Tree, EntityKey::new());

        reaper.reap(map.key(), &map);
        assert_eq!(renderer.message(&message), rendered);
        assert!(registry.object_for(untracked).is_err());
    }

    #[test]
    fn other_worlds_are_left_alone() {
        let (map, _) = map();
        let registry = Arc::new(IdentityRegistry::new());
        let reaper = IdReaper::new(Arc::clone(&registry));
        let elsewhere = registry.id_for(ObjectRef::entity(
            WorldKey::new(),
            EntityKind::Flag,
            EntityKey::new(),
        ));
        reaper.reap(map.key(), &map);
        assert!(registry.object_for(elsewhere).is_ok());
    }
}
