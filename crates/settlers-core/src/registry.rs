//! Stable external ids for in-memory objects.
//!
//! Engine objects are addressed by process-local keys that must never leave
//! the server. The [`IdentityRegistry`] hands out [`ObjectId`]s for them:
//! one id per distinct object, positive, monotonically increasing and never
//! reused. Lookups in both directions are O(1) behind one short-lived lock
//! that is independent of every world lock.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use settlers_types::{EntityKey, GameKey, MapKey, ObjectId, PlayerKey, WorldKey};

/// Errors returned by registry lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No live object is bound to the id.
    #[error("no object with id {0}")]
    UnknownId(ObjectId),
}

/// Kind of a world-owned entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A building.
    Building,
    /// A flag.
    Flag,
    /// A road.
    Road,
    /// A tree.
    Tree,
    /// A stone pile.
    Stone,
    /// A geologist sign.
    Sign,
    /// A crop.
    Crop,
    /// A worker.
    Worker,
    /// A wild animal.
    Animal,
}

/// Identity of an addressable object.
///
/// Engine keys are unique for the life of the process, so equality of two
/// refs is identity of the objects behind them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectRef {
    /// A game that has not been started.
    Placeholder(GameKey),
    /// A running world.
    World(WorldKey),
    /// A player, in a placeholder or a world.
    Player(PlayerKey),
    /// A map template.
    Map(MapKey),
    /// An entity owned by a world.
    Entity {
        /// The owning world.
        world: WorldKey,
        /// Entity kind.
        kind: EntityKind,
        /// Engine key of the entity.
        key: EntityKey,
    },
}

impl ObjectRef {
    /// Shorthand for an entity ref.
    pub const fn entity(world: WorldKey, kind: EntityKind, key: EntityKey) -> Self {
        Self::Entity { world, kind, key }
    }

    /// The world the object lives in, if it is a world or an entity of one.
    pub const fn world(&self) -> Option<WorldKey> {
        match self {
            Self::World(world) | Self::Entity { world, .. } => Some(*world),
            Self::Placeholder(_) | Self::Player(_) | Self::Map(_) => None,
        }
    }
}

#[derive(Debug)]
struct Bindings {
    last: Option<ObjectId>,
    by_id: HashMap<ObjectId, ObjectRef>,
    by_object: HashMap<ObjectRef, ObjectId>,
}

/// Bidirectional mapping between [`ObjectId`]s and live objects.
///
/// Built once at startup and shared through an `Arc` by the REST state and
/// the push layer.
#[derive(Debug)]
pub struct IdentityRegistry {
    bindings: Mutex<Bindings>,
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityRegistry {
    /// Create an empty registry. The first id handed out is 1.
    pub fn new() -> Self {
        Self {
            bindings: Mutex::new(Bindings {
                last: None,
                by_id: HashMap::new(),
                by_object: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Bindings> {
        // The maps are updated together before any call that could panic,
        // so a poisoned lock still guards consistent data.
        self.bindings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The id of an object, allocating a new one on first use.
    pub fn id_for(&self, object: ObjectRef) -> ObjectId {
        let mut bindings = self.lock();
        if let Some(id) = bindings.by_object.get(&object) {
            return *id;
        }
        let id = bindings.last.map_or(ObjectId::FIRST, ObjectId::successor);
        bindings.last = Some(id);
        bindings.by_id.insert(id, object);
        bindings.by_object.insert(object, id);
        id
    }

    /// The object bound to an id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownId`] if nothing is bound to it.
    pub fn object_for(&self, id: ObjectId) -> Result<ObjectRef, RegistryError> {
        self.lock()
            .by_id
            .get(&id)
            .copied()
            .ok_or(RegistryError::UnknownId(id))
    }

    /// The id of an object if it already has one.
    pub fn existing_id(&self, object: &ObjectRef) -> Option<ObjectId> {
        self.lock().by_object.get(object).copied()
    }

    /// Drop the binding of an object. A later [`id_for`](Self::id_for) on
    /// the same object allocates a fresh id.
    pub fn release(&self, object: &ObjectRef) -> Option<ObjectId> {
        let mut bindings = self.lock();
        let id = bindings.by_object.remove(object)?;
        bindings.by_id.remove(&id);
        Some(id)
    }

    /// Move an existing id onto a replacement object. Any id the
    /// replacement already had is released.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownId`] if the id is not bound.
    pub fn rebind(&self, id: ObjectId, object: ObjectRef) -> Result<(), RegistryError> {
        let mut bindings = self.lock();
        let previous = bindings
            .by_id
            .get(&id)
            .copied()
            .ok_or(RegistryError::UnknownId(id))?;
        bindings.by_object.remove(&previous);
        if let Some(stale) = bindings.by_object.insert(object, id) {
            bindings.by_id.remove(&stale);
        }
        bindings.by_id.insert(id, object);
        Ok(())
    }

    /// Release every binding whose object matches the predicate. Returns
    /// the number of released ids.
    pub fn release_where(&self, predicate: impl Fn(&ObjectRef) -> bool) -> usize {
        let mut bindings = self.lock();
        let doomed: Vec<(ObjectId, ObjectRef)> = bindings
            .by_id
            .iter()
            .filter(|(_, object)| predicate(object))
            .map(|(id, object)| (*id, *object))
            .collect();
        for (id, object) in &doomed {
            bindings.by_id.remove(id);
            bindings.by_object.remove(object);
        }
        doomed.len()
    }

    /// Number of live bindings.
    pub fn len(&self) -> usize {
        self.lock().by_id.len()
    }

    /// Whether no binding is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn ids_start_at_one_and_increase() {
        let registry = IdentityRegistry::new();
        let a = registry.id_for(ObjectRef::Map(MapKey::new()));
        let b = registry.id_for(ObjectRef::Map(MapKey::new()));
        assert_eq!(a.into_inner(), 1);
        assert_eq!(b.into_inner(), 2);
    }

    #[test]
    fn same_object_same_id() {
        let registry = IdentityRegistry::new();
        let player = ObjectRef::Player(PlayerKey::new());
        assert_eq!(registry.id_for(player), registry.id_for(player));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn object_for_round_trips_until_release() {
        let registry = IdentityRegistry::new();
        let world = WorldKey::new();
        let flag = ObjectRef::entity(world, EntityKind::Flag, EntityKey::new());
        let id = registry.id_for(flag);
        assert_eq!(registry.object_for(id), Ok(flag));

        assert_eq!(registry.release(&flag), Some(id));
        assert_eq!(registry.object_for(id), Err(RegistryError::UnknownId(id)));

        let fresh = registry.id_for(flag);
        assert_ne!(fresh, id);
        assert!(fresh > id);
    }

    #[test]
    fn released_ids_are_never_reused() {
        let registry = IdentityRegistry::new();
        let first = registry.id_for(ObjectRef::Player(PlayerKey::new()));
        registry.release_where(|_| true);
        let second = registry.id_for(ObjectRef::Player(PlayerKey::new()));
        assert!(second > first);
    }

    #[test]
    fn rebind_moves_the_id() {
        let registry = IdentityRegistry::new();
        let placeholder = ObjectRef::Placeholder(GameKey::new());
        let world = ObjectRef::World(WorldKey::new());
        let id = registry.id_for(placeholder);

        registry.rebind(id, world).unwrap();
        assert_eq!(registry.object_for(id), Ok(world));
        assert_eq!(registry.existing_id(&placeholder), None);
        assert_eq!(registry.id_for(world), id);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn rebind_unknown_id_fails() {
        let registry = IdentityRegistry::new();
        let id = ObjectId::from_raw(99).unwrap();
        let result = registry.rebind(id, ObjectRef::World(WorldKey::new()));
        assert_eq!(result, Err(RegistryError::UnknownId(id)));
    }

    #[test]
    fn release_where_drops_one_world() {
        let registry = IdentityRegistry::new();
        let doomed = WorldKey::new();
        let kept = WorldKey::new();
        registry.id_for(ObjectRef::World(doomed));
        registry.id_for(ObjectRef::entity(doomed, EntityKind::Road, EntityKey::new()));
        registry.id_for(ObjectRef::entity(doomed, EntityKind::Tree, EntityKey::new()));
        let survivor = registry.id_for(ObjectRef::entity(kept, EntityKind::Tree, EntityKey::new()));

        let released = registry.release_where(|o| o.world() == Some(doomed));
        assert_eq!(released, 3);
        assert_eq!(registry.len(), 1);
        assert!(registry.object_for(survivor).is_ok());
    }

    #[test]
    fn concurrent_id_for_yields_one_id_per_object() {
        let registry = Arc::new(IdentityRegistry::new());
        let objects: Vec<ObjectRef> = (0..64)
            .map(|_| ObjectRef::Player(PlayerKey::new()))
            .collect();
        let objects = Arc::new(objects);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let objects = Arc::clone(&objects);
                std::thread::spawn(move || {
                    objects
                        .iter()
                        .map(|o| registry.id_for(*o))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let results: Vec<Vec<ObjectId>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let first = results.first().unwrap();
        for other in &results {
            assert_eq!(other, first);
        }
        let distinct: HashSet<_> = first.iter().collect();
        assert_eq!(distinct.len(), objects.len());
        assert_eq!(registry.len(), objects.len());
    }
}
