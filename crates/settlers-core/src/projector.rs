//! Per-player views of a world and the deltas between them.
//!
//! [`ViewProjector::snapshot`] filters a world down to what one player has
//! discovered and copies it into a [`ViewSnapshot`] while the world lock is
//! held. [`delta`] compares two snapshots of the same player into the
//! [`ChangeSet`] pushed to monitors, and [`apply`] replays a change set on
//! the earlier snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use settlers_types::{
    AvailableConstructionChange, BorderChange, BorderView, ChangeSet, Construction, Identified,
    ObjectId, PlayerKey, Point, Size, ViewSnapshot,
};
use settlers_world::GameMap;

use crate::registry::IdentityRegistry;
use crate::render::Renderer;
use crate::world::WorldHandle;

/// Builds per-player snapshots of worlds.
#[derive(Debug, Clone)]
pub struct ViewProjector {
    registry: Arc<IdentityRegistry>,
}

impl ViewProjector {
    /// A projector allocating ids in the shared registry.
    pub const fn new(registry: Arc<IdentityRegistry>) -> Self {
        Self { registry }
    }

    /// The registry ids are allocated in.
    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    /// Take a snapshot under the world lock. `None` when the player is not
    /// part of the world.
    pub async fn snapshot(&self, world: &WorldHandle, player: PlayerKey) -> Option<ViewSnapshot> {
        world.with_world(|map| self.snapshot_of(map, player)).await
    }

    /// Take a snapshot of a world the caller already holds the lock of.
    pub fn snapshot_of(&self, map: &GameMap, player: PlayerKey) -> Option<ViewSnapshot> {
        let viewer = map.player(player)?;
        let seen = |p: Point| viewer.discovered.contains(&p);
        let render = Renderer::new(&self.registry, map.key());

        let mut snapshot = ViewSnapshot {
            time: map.time(),
            houses: map
                .buildings()
                .filter(|b| seen(b.position))
                .map(|b| render.house(b))
                .collect(),
            trees: map
                .trees()
                .filter(|t| seen(t.position))
                .map(|t| render.tree(t))
                .collect(),
            stones: map
                .stones()
                .filter(|s| seen(s.position))
                .map(|s| render.stone(s))
                .collect(),
            workers: map
                .workers()
                .filter(|w| !w.inside && seen(w.position))
                .map(|w| render.walker(w))
                .collect(),
            flags: map
                .flags()
                .filter(|f| seen(f.position))
                .map(|f| render.flag(f))
                .collect(),
            roads: map
                .roads()
                .filter(|r| r.points.iter().any(|p| seen(*p)))
                .map(|r| render.road(r))
                .collect(),
            discovered_points: viewer.discovered.clone(),
            borders: Vec::new(),
            signs: map
                .signs()
                .filter(|s| seen(s.position))
                .map(|s| render.sign(s))
                .collect(),
            animals: map
                .animals()
                .filter(|a| seen(a.position))
                .map(|a| render.walker(a))
                .collect(),
            crops: map
                .crops()
                .filter(|c| seen(c.position))
                .map(|c| render.crop(c))
                .collect(),
            available_construction: available_construction(map, player, &viewer.discovered),
            messages: viewer.messages.iter().map(|m| render.message(m)).collect(),
        };

        let border = viewer.border();
        if !border.is_empty() {
            snapshot.borders.push(BorderView {
                player_id: render.player_id(player),
                points: border,
            });
        }
        sort_by_id(&mut snapshot);
        Some(snapshot)
    }
}

/// Construction options per discovered point, keyed `"x,y"`. Houses are
/// listed with their largest size only.
fn available_construction(
    map: &GameMap,
    player: PlayerKey,
    discovered: &BTreeSet<Point>,
) -> BTreeMap<String, Vec<Construction>> {
    let mut options: BTreeMap<Point, Vec<Construction>> = BTreeMap::new();
    for point in map.available_flag_points(player) {
        options.entry(point).or_default().push(Construction::Flag);
    }
    for (point, size) in map.available_house_points(player) {
        let option = match size {
            Size::Small => Construction::Small,
            Size::Medium => Construction::Medium,
            Size::Large => Construction::Large,
        };
        options.entry(point).or_default().push(option);
    }
    for point in map.available_mine_points(player) {
        options.entry(point).or_default().push(Construction::Mine);
    }
    options
        .into_iter()
        .filter(|(p, _)| discovered.contains(p))
        .map(|(p, o)| (p.key(), o))
        .collect()
}

fn sort_by_id(snapshot: &mut ViewSnapshot) {
    snapshot.houses.sort_by_key(Identified::object_id);
    snapshot.trees.sort_by_key(Identified::object_id);
    snapshot.stones.sort_by_key(Identified::object_id);
    snapshot.workers.sort_by_key(Identified::object_id);
    snapshot.flags.sort_by_key(Identified::object_id);
    snapshot.roads.sort_by_key(Identified::object_id);
    snapshot.signs.sort_by_key(Identified::object_id);
    snapshot.animals.sort_by_key(Identified::object_id);
    snapshot.crops.sort_by_key(Identified::object_id);
    snapshot.borders.sort_by_key(|b| b.player_id);
}

// ---------------------------------------------------------------------------
// Delta
// ---------------------------------------------------------------------------

/// New, changed and removed entities of one category.
struct Diff<T> {
    added: Vec<T>,
    changed: Vec<T>,
    removed: Vec<ObjectId>,
}

fn diff<T: Identified + PartialEq + Clone>(previous: &[T], current: &[T]) -> Diff<T> {
    let before: BTreeMap<ObjectId, &T> = previous.iter().map(|e| (e.object_id(), e)).collect();
    let now: BTreeSet<ObjectId> = current.iter().map(Identified::object_id).collect();
    let mut out = Diff {
        added: Vec::new(),
        changed: Vec::new(),
        removed: Vec::new(),
    };
    for entity in current {
        match before.get(&entity.object_id()) {
            None => out.added.push(entity.clone()),
            Some(old) if *old != entity => out.changed.push(entity.clone()),
            Some(_) => {}
        }
    }
    out.removed = before.keys().filter(|id| !now.contains(id)).copied().collect();
    out
}

/// The minimal change set turning `previous` into `current`.
///
/// Both snapshots must belong to the same player.
pub fn delta(previous: &ViewSnapshot, current: &ViewSnapshot) -> ChangeSet {
    let houses = diff(&previous.houses, &current.houses);
    let flags = diff(&previous.flags, &current.flags);
    let roads = diff(&previous.roads, &current.roads);
    let trees = diff(&previous.trees, &current.trees);
    let stones = diff(&previous.stones, &current.stones);
    let workers = diff(&previous.workers, &current.workers);
    let signs = diff(&previous.signs, &current.signs);
    let crops = diff(&previous.crops, &current.crops);
    let animals = diff(&previous.animals, &current.animals);

    // Trees and signs never change in place; a changed one is replaced.
    let mut removed_trees = trees.removed;
    removed_trees.extend(trees.changed.iter().map(Identified::object_id));
    let mut new_trees = trees.added;
    new_trees.extend(trees.changed);
    let mut removed_signs = signs.removed;
    removed_signs.extend(signs.changed.iter().map(Identified::object_id));
    let mut new_signs = signs.added;
    new_signs.extend(signs.changed);

    ChangeSet {
        time: current.time,
        new_buildings: houses.added,
        changed_buildings: houses.changed,
        removed_buildings: houses.removed,
        new_flags: flags.added,
        changed_flags: flags.changed,
        removed_flags: flags.removed,
        new_roads: roads.added,
        changed_roads: roads.changed,
        removed_roads: roads.removed,
        new_trees,
        removed_trees,
        new_stones: stones.added,
        changed_stones: stones.changed,
        removed_stones: stones.removed,
        new_workers: workers.added,
        changed_workers: workers.changed,
        removed_workers: workers.removed,
        new_signs,
        removed_signs,
        new_crops: crops.added,
        changed_crops: crops.changed,
        removed_crops: crops.removed,
        new_animals: animals.added,
        changed_animals: animals.changed,
        removed_animals: animals.removed,
        new_discovered_land: current
            .discovered_points
            .difference(&previous.discovered_points)
            .copied()
            .collect(),
        changed_borders: border_changes(&previous.borders, &current.borders),
        changed_available_construction: construction_changes(
            &previous.available_construction,
            &current.available_construction,
        ),
        new_messages: new_messages(previous, current),
    }
}

fn border_changes(previous: &[BorderView], current: &[BorderView]) -> Vec<BorderChange> {
    let empty = BTreeSet::new();
    let players: BTreeSet<ObjectId> = previous
        .iter()
        .chain(current)
        .map(|b| b.player_id)
        .collect();
    let points_of = |borders: &[BorderView], player: ObjectId| -> BTreeSet<Point> {
        borders
            .iter()
            .find(|b| b.player_id == player)
            .map_or_else(|| empty.clone(), |b| b.points.clone())
    };
    players
        .into_iter()
        .filter_map(|player| {
            let before = points_of(previous, player);
            let after = points_of(current, player);
            let new_border: Vec<Point> = after.difference(&before).copied().collect();
            let removed_border: Vec<Point> = before.difference(&after).copied().collect();
            (!new_border.is_empty() || !removed_border.is_empty()).then_some(BorderChange {
                player_id: player,
                new_border,
                removed_border,
            })
        })
        .collect()
}

fn construction_changes(
    previous: &BTreeMap<String, Vec<Construction>>,
    current: &BTreeMap<String, Vec<Construction>>,
) -> Vec<AvailableConstructionChange> {
    let keys: BTreeSet<&String> = previous.keys().chain(current.keys()).collect();
    keys.into_iter()
        .filter(|key| previous.get(*key) != current.get(*key))
        .filter_map(|key| {
            let point = parse_point_key(key)?;
            Some(AvailableConstructionChange {
                x: point.x,
                y: point.y,
                available: current.get(key).cloned().unwrap_or_default(),
            })
        })
        .collect()
}

fn parse_point_key(key: &str) -> Option<Point> {
    let (x, y) = key.split_once(',')?;
    Some(Point::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
}

fn new_messages(
    previous: &ViewSnapshot,
    current: &ViewSnapshot,
) -> Vec<settlers_types::GameMessage> {
    // Inboxes only grow, so the earlier inbox is a prefix of the later one.
    if current.messages.starts_with(&previous.messages) {
        return current
            .messages
            .get(previous.messages.len()..)
            .map(<[_]>::to_vec)
            .unwrap_or_default();
    }
    current
        .messages
        .iter()
        .filter(|m| !previous.messages.contains(m))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

fn replay<T: Identified + Clone>(
    previous: &[T],
    added: &[T],
    changed: &[T],
    removed: &[ObjectId],
) -> Vec<T> {
    let mut by_id: BTreeMap<ObjectId, T> = previous
        .iter()
        .map(|e| (e.object_id(), e.clone()))
        .collect();
    for id in removed {
        by_id.remove(id);
    }
    for entity in added.iter().chain(changed) {
        by_id.insert(entity.object_id(), entity.clone());
    }
    by_id.into_values().collect()
}

/// Replay a change set on the snapshot it was computed from.
pub fn apply(previous: &ViewSnapshot, changes: &ChangeSet) -> ViewSnapshot {
    let mut discovered_points = previous.discovered_points.clone();
    discovered_points.extend(changes.new_discovered_land.iter().copied());

    let mut borders: BTreeMap<ObjectId, BTreeSet<Point>> = previous
        .borders
        .iter()
        .map(|b| (b.player_id, b.points.clone()))
        .collect();
    for change in &changes.changed_borders {
        let points = borders.entry(change.player_id).or_default();
        for point in &change.removed_border {
            points.remove(point);
        }
        points.extend(change.new_border.iter().copied());
    }

    let mut available_construction = previous.available_construction.clone();
    for change in &changes.changed_available_construction {
        let key = Point::new(change.x, change.y).key();
        if change.available.is_empty() {
            available_construction.remove(&key);
        } else {
            available_construction.insert(key, change.available.clone());
        }
    }

    let mut messages = previous.messages.clone();
    messages.extend(changes.new_messages.iter().cloned());

    ViewSnapshot {
        time: changes.time,
        houses: replay(
            &previous.houses,
            &changes.new_buildings,
            &changes.changed_buildings,
            &changes.removed_buildings,
        ),
        trees: replay(&previous.trees, &changes.new_trees, &[], &changes.removed_trees),
        stones: replay(
            &previous.stones,
            &changes.new_stones,
            &changes.changed_stones,
            &changes.removed_stones,
        ),
        workers: replay(
            &previous.workers,
            &changes.new_workers,
            &changes.changed_workers,
            &changes.removed_workers,
        ),
        flags: replay(
            &previous.flags,
            &changes.new_flags,
            &changes.changed_flags,
            &changes.removed_flags,
        ),
        roads: replay(
            &previous.roads,
            &changes.new_roads,
            &changes.changed_roads,
            &changes.removed_roads,
        ),
        discovered_points,
        borders: borders
            .into_iter()
            .filter(|(_, points)| !points.is_empty())
            .map(|(player_id, points)| BorderView { player_id, points })
            .collect(),
        signs: replay(&previous.signs, &changes.new_signs, &[], &changes.removed_signs),
        animals: replay(
            &previous.animals,
            &changes.new_animals,
            &changes.changed_animals,
            &changes.removed_animals,
        ),
        crops: replay(
            &previous.crops,
            &changes.new_crops,
            &changes.changed_crops,
            &changes.removed_crops,
        ),
        available_construction,
        messages,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use settlers_types::{
        BuildingState, CropState, CropView, FlagView, GameMessage, HouseView, Material,
        PlayerType, StoneView, TreeView, WorkerType, WorkerView,
    };
    use settlers_world::{MapTemplate, Player};

    use super::*;

    fn id(raw: u64) -> ObjectId {
        ObjectId::from_raw(raw).unwrap()
    }

    fn house(raw: u64, state: BuildingState) -> HouseView {
        HouseView {
            id: id(raw),
            player_id: id(1),
            x: 10,
            y: 10,
            kind: "Woodcutter".to_owned(),
            state,
            construction_progress: None,
            resources: BTreeMap::new(),
            productivity: None,
            produces: None,
            production_enabled: None,
            soldiers: None,
            max_soldiers: None,
            evacuated: None,
            promotions_enabled: None,
            upgrading: None,
        }
    }

    fn worker(raw: u64, x: i32) -> WorkerView {
        WorkerView {
            id: id(raw),
            x,
            y: 4,
            kind: WorkerType::Courier,
            inside: false,
            between_points: false,
            previous: None,
            next: None,
            percentage_traveled: 0,
            speed: None,
            cargo: None,
            player_id: Some(id(1)),
        }
    }

    fn border(points: &[(i32, i32)]) -> BorderView {
        BorderView {
            player_id: id(1),
            points: points.iter().map(|(x, y)| Point::new(*x, *y)).collect(),
        }
    }

    fn earlier() -> ViewSnapshot {
        ViewSnapshot {
            time: 10,
            houses: vec![house(2, BuildingState::Unfinished), house(3, BuildingState::Occupied)],
            trees: vec![TreeView { id: id(4), x: 2, y: 2 }, TreeView { id: id(5), x: 4, y: 2 }],
            stones: vec![StoneView { id: id(6), x: 6, y: 6, amount: 7 }],
            workers: vec![worker(7, 4), worker(8, 6)],
            flags: vec![FlagView {
                id: id(9),
                player_id: id(1),
                x: 11,
                y: 9,
                stacked_cargo: Vec::new(),
            }],
            roads: Vec::new(),
            discovered_points: [Point::new(1, 1), Point::new(3, 1)].into(),
            borders: vec![border(&[(1, 1), (3, 1)])],
            signs: Vec::new(),
            animals: Vec::new(),
            crops: vec![CropView { id: id(10), x: 8, y: 8, state: CropState::JustPlanted }],
            available_construction: BTreeMap::from([
                ("1,1".to_owned(), vec![Construction::Flag]),
                ("3,1".to_owned(), vec![Construction::Flag, Construction::Small]),
            ]),
            messages: vec![GameMessage::MilitaryBuildingOccupied { house_id: id(3) }],
        }
    }

    fn later() -> ViewSnapshot {
        let mut snapshot = earlier();
        snapshot.time = 11;
        snapshot.houses = vec![house(2, BuildingState::Unoccupied), house(11, BuildingState::Unfinished)];
        snapshot.trees = vec![TreeView { id: id(5), x: 4, y: 2 }];
        snapshot.stones = vec![StoneView { id: id(6), x: 6, y: 6, amount: 6 }];
        snapshot.workers = vec![worker(7, 6), worker(8, 6), worker(12, 2)];
        snapshot.flags.first_mut().unwrap().stacked_cargo = vec![Material::Plank];
        snapshot.discovered_points.insert(Point::new(5, 1));
        snapshot.borders = vec![border(&[(3, 1), (5, 1)])];
        snapshot.crops = Vec::new();
        snapshot.available_construction = BTreeMap::from([
            ("3,1".to_owned(), vec![Construction::Flag]),
            ("5,1".to_owned(), vec![Construction::Flag, Construction::Medium]),
        ]);
        snapshot.messages.push(GameMessage::NoMoreResources { house_id: id(2) });
        snapshot
    }

    #[test]
    fn delta_of_identical_snapshots_is_empty() {
        let snapshot = earlier();
        let changes = delta(&snapshot, &snapshot);
        assert!(changes.is_empty());
        assert_eq!(changes.time, snapshot.time);
    }

    #[test]
    fn delta_lists_each_category() {
        let changes = delta(&earlier(), &later());
        assert_eq!(changes.time, 11);
        assert_eq!(changes.new_buildings.iter().map(|h| h.id).collect::<Vec<_>>(), vec![id(11)]);
        assert_eq!(changes.changed_buildings.iter().map(|h| h.id).collect::<Vec<_>>(), vec![id(2)]);
        assert_eq!(changes.removed_buildings, vec![id(3)]);
        assert_eq!(changes.removed_trees, vec![id(4)]);
        assert_eq!(changes.changed_stones.len(), 1);
        assert_eq!(changes.changed_workers.iter().map(|w| w.id).collect::<Vec<_>>(), vec![id(7)]);
        assert_eq!(changes.new_workers.iter().map(|w| w.id).collect::<Vec<_>>(), vec![id(12)]);
        assert_eq!(changes.changed_flags.len(), 1);
        assert_eq!(changes.removed_crops, vec![id(10)]);
        assert_eq!(changes.new_discovered_land, vec![Point::new(5, 1)]);

        let border = changes.changed_borders.first().unwrap();
        assert_eq!(border.new_border, vec![Point::new(5, 1)]);
        assert_eq!(border.removed_border, vec![Point::new(1, 1)]);

        assert_eq!(changes.changed_available_construction.len(), 3);
        let gone = changes
            .changed_available_construction
            .iter()
            .find(|c| c.x == 1 && c.y == 1)
            .unwrap();
        assert!(gone.available.is_empty());

        assert_eq!(
            changes.new_messages,
            vec![GameMessage::NoMoreResources { house_id: id(2) }]
        );
    }

    #[test]
    fn apply_reproduces_the_later_snapshot() {
        let previous = earlier();
        let current = later();
        let replayed = apply(&previous, &delta(&previous, &current));
        assert_eq!(replayed, current);
    }

    #[test]
    fn apply_reproduces_the_earlier_snapshot_backwards() {
        // Going back in time removes discovered land, which a delta cannot
        // express; everything else must still round-trip.
        let mut previous = later();
        let mut current = earlier();
        previous.discovered_points = current.discovered_points.clone();
        previous.messages.clone_from(&current.messages);
        current.time = 12;
        let replayed = apply(&previous, &delta(&previous, &current));
        assert_eq!(replayed, current);
    }

    #[test]
    fn vanished_border_is_dropped() {
        let previous = earlier();
        let mut current = earlier();
        current.borders.clear();
        let changes = delta(&previous, &current);
        assert_eq!(changes.changed_borders.len(), 1);
        assert_eq!(apply(&previous, &changes), current);
    }

    #[test]
    fn point_keys_parse() {
        assert_eq!(parse_point_key("12,-4"), Some(Point::new(12, -4)));
        assert_eq!(parse_point_key("12"), None);
        assert_eq!(parse_point_key("a,b"), None);
    }

    // -----------------------------------------------------------------------
    // Snapshots of a real map
    // -----------------------------------------------------------------------

    fn two_player_map() -> (GameMap, PlayerKey, PlayerKey) {
        let template = MapTemplate::blank(
            "Apart",
            100,
            40,
            vec![Point::new(20, 20), Point::new(80, 20)],
        );
        let anna = Player::new(PlayerKey::new(), "Anna", "#00FF00", PlayerType::HumanPlayer);
        let bert = Player::new(PlayerKey::new(), "Bert", "#0000FF", PlayerType::HumanPlayer);
        let (a, b) = (anna.key, bert.key);
        (GameMap::new(&template, vec![anna, bert]).unwrap(), a, b)
    }

    #[test]
    fn snapshot_only_contains_discovered_entities() {
        let (map, anna, _) = two_player_map();
        let projector = ViewProjector::new(Arc::new(IdentityRegistry::new()));
        let snapshot = projector.snapshot_of(&map, anna).unwrap();
        let seen = &snapshot.discovered_points;

        assert!(!snapshot.houses.is_empty());
        for house in &snapshot.houses {
            assert!(seen.contains(&Point::new(house.x, house.y)));
        }
        for flag in &snapshot.flags {
            assert!(seen.contains(&Point::new(flag.x, flag.y)));
        }
        for worker in snapshot.workers.iter().chain(&snapshot.animals) {
            assert!(seen.contains(&Point::new(worker.x, worker.y)));
            assert!(!worker.inside);
        }
        for key in snapshot.available_construction.keys() {
            assert!(seen.contains(&parse_point_key(key).unwrap()));
        }
        // The other headquarter is out of sight.
        assert_eq!(snapshot.houses.len(), 1);
    }

    #[test]
    fn road_seen_through_one_waypoint_shows_without_its_flags() {
        let (mut map, anna, bert) = two_player_map();
        let start = map.headquarter_of(bert).unwrap().flag_point();
        let end = Point::new(start.x.saturating_add(6), start.y);
        map.place_flag(bert, end).unwrap();
        let road = map.place_auto_selected_road(bert, start, end).unwrap();
        let points = map.road(road).unwrap().points.clone();
        assert!(points.len() > 2);
        let inner = *points.get(1).unwrap();

        let viewer = map.player_mut(anna).unwrap();
        viewer.discovered.clear();
        viewer.discovered.insert(inner);

        let projector = ViewProjector::new(Arc::new(IdentityRegistry::new()));
        let snapshot = projector.snapshot_of(&map, anna).unwrap();
        assert_eq!(snapshot.roads.len(), 1);
        assert_eq!(snapshot.roads.first().unwrap().points, points);
        assert!(snapshot.flags.is_empty());
        assert!(snapshot.houses.is_empty());
    }

    #[test]
    fn snapshot_carries_only_own_border() {
        let (map, anna, bert) = two_player_map();
        let registry = Arc::new(IdentityRegistry::new());
        let projector = ViewProjector::new(Arc::clone(&registry));
        let snapshot = projector.snapshot_of(&map, anna).unwrap();
        assert_eq!(snapshot.borders.len(), 1);
        let own = registry.id_for(crate::registry::ObjectRef::Player(anna));
        assert_eq!(snapshot.borders.first().unwrap().player_id, own);
        assert_ne!(registry.id_for(crate::registry::ObjectRef::Player(bert)), own);
    }

    #[test]
    fn snapshot_of_unknown_player_is_none() {
        let (map, _, _) = two_player_map();
        let projector = ViewProjector::new(Arc::new(IdentityRegistry::new()));
        assert!(projector.snapshot_of(&map, PlayerKey::new()).is_none());
    }

    #[tokio::test]
    async fn snapshot_through_the_handle_matches_locked_snapshot() {
        let (map, anna, _) = two_player_map();
        let projector = ViewProjector::new(Arc::new(IdentityRegistry::new()));
        let direct = projector.snapshot_of(&map, anna).unwrap();
        let handle = WorldHandle::new(map);
        let locked = projector.snapshot(&handle, anna).await.unwrap();
        assert_eq!(direct, locked);
    }
}
