//! Games that have not been started yet.
//!
//! A [`GamePlaceholder`] collects the roster, the map and the resource
//! level. [`GamePlaceholder::start`] turns it into a running [`GameMap`];
//! players keep their keys, so ids handed out for them stay valid.

use settlers_types::{GameKey, MapKey, PlayerKey, PlayerType, ResourceLevel};
use settlers_world::{GameMap, MapTemplate, Player, WorldError};
use tracing::info;

/// Why a placeholder could not be started.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// No map was selected.
    #[error("no map selected")]
    NoMap,

    /// The selected map is not in the catalog.
    #[error("unknown map {0}")]
    UnknownMap(MapKey),

    /// The roster is empty.
    #[error("a game needs at least one player")]
    NoPlayers,

    /// The engine refused the setup.
    #[error(transparent)]
    World(#[from] WorldError),
}

/// Pre-start configuration of a game.
#[derive(Debug, Clone)]
pub struct GamePlaceholder {
    /// Key of the placeholder.
    pub key: GameKey,
    /// Optional display name.
    pub name: Option<String>,
    /// Roster in join order.
    pub players: Vec<Player>,
    /// Selected map template.
    pub map: Option<MapKey>,
    /// Starting resource level.
    pub resources: ResourceLevel,
}

impl GamePlaceholder {
    /// An empty placeholder with medium resources.
    pub fn new(name: Option<String>) -> Self {
        Self {
            key: GameKey::new(),
            name,
            players: Vec::new(),
            map: None,
            resources: ResourceLevel::default(),
        }
    }

    /// Add a player to the roster and return its key.
    pub fn add_player(
        &mut self,
        name: impl Into<String>,
        color: impl Into<String>,
        kind: PlayerType,
    ) -> PlayerKey {
        let player = Player::new(PlayerKey::new(), name, color, kind);
        let key = player.key;
        self.players.push(player);
        key
    }

    /// A player of the roster.
    pub fn player(&self, key: PlayerKey) -> Option<&Player> {
        self.players.iter().find(|p| p.key == key)
    }

    /// A player of the roster, for editing.
    pub fn player_mut(&mut self, key: PlayerKey) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.key == key)
    }

    /// Take a player off the roster.
    pub fn remove_player(&mut self, key: PlayerKey) -> Option<Player> {
        let index = self.players.iter().position(|p| p.key == key)?;
        Some(self.players.remove(index))
    }

    /// Create the world: headquarters at the map's starting points in
    /// roster order, then the resource level applied to each headquarter.
    pub fn start(&self, catalog: &[MapTemplate]) -> Result<GameMap, StartError> {
        let map_key = self.map.ok_or(StartError::NoMap)?;
        let template = catalog
            .iter()
            .find(|t| t.key == map_key)
            .ok_or(StartError::UnknownMap(map_key))?;
        if self.players.is_empty() {
            return Err(StartError::NoPlayers);
        }
        let players = self
            .players
            .iter()
            .map(|p| Player::new(p.key, p.name.clone(), p.color.clone(), p.kind))
            .collect();
        let mut world = GameMap::new(template, players)?;
        world.apply_resource_level(self.resources);
        info!(
            game = %self.key,
            world = %world.key(),
            map = %template.title,
            players = self.players.len(),
            resources = ?self.resources,
            "Game started"
        );
        Ok(world)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use settlers_types::{Material, Point};
    use settlers_world::builtin_maps;

    use super::*;

    fn placeholder(resources: ResourceLevel) -> (GamePlaceholder, Vec<MapTemplate>) {
        let catalog = builtin_maps();
        let mut game = GamePlaceholder::new(Some("Test".to_owned()));
        game.add_player("Anna", "#00FF00", PlayerType::HumanPlayer);
        game.add_player("Bert", "#0000FF", PlayerType::ComputerPlayer);
        game.map = catalog.first().map(|t| t.key);
        game.resources = resources;
        (game, catalog)
    }

    fn hq_stock(world: &GameMap, material: Material) -> u32 {
        let player = world.players().first().unwrap().key;
        world
            .headquarter_of(player)
            .unwrap()
            .stock
            .get(&material)
            .copied()
            .unwrap_or(0)
    }

    #[test]
    fn started_game_has_headquarters_at_starting_points() {
        let (game, catalog) = placeholder(ResourceLevel::Medium);
        let world = game.start(&catalog).unwrap();
        let starts: Vec<Point> = catalog.first().unwrap().starting_points.clone();
        for (player, start) in game.players.iter().zip(&starts) {
            let hq = world.headquarter_of(player.key).unwrap();
            assert_eq!(hq.position, *start);
        }
    }

    #[test]
    fn low_resources_shrink_the_headquarter_stock() {
        let (medium, catalog) = placeholder(ResourceLevel::Medium);
        let (mut low, _) = placeholder(ResourceLevel::Low);
        low.map = medium.map;
        let medium = medium.start(&catalog).unwrap();
        let low = low.start(&catalog).unwrap();
        for material in [Material::Stone, Material::Plank, Material::Wood] {
            assert!(hq_stock(&low, material) < hq_stock(&medium, material));
        }
    }

    #[test]
    fn start_needs_map_and_players() {
        let catalog = builtin_maps();
        let mut game = GamePlaceholder::new(None);
        assert!(matches!(game.start(&catalog), Err(StartError::NoMap)));

        game.map = Some(MapKey::new());
        assert!(matches!(game.start(&catalog), Err(StartError::UnknownMap(_))));

        game.map = catalog.first().map(|t| t.key);
        assert!(matches!(game.start(&catalog), Err(StartError::NoPlayers)));
    }

    #[test]
    fn players_keep_their_keys() {
        let (game, catalog) = placeholder(ResourceLevel::High);
        let world = game.start(&catalog).unwrap();
        let roster: Vec<PlayerKey> = game.players.iter().map(|p| p.key).collect();
        let started: Vec<PlayerKey> = world.players().iter().map(|p| p.key).collect();
        assert_eq!(roster, started);
    }

    #[test]
    fn remove_player_drops_from_roster() {
        let (mut game, _) = placeholder(ResourceLevel::Medium);
        let first = game.players.first().unwrap().key;
        assert!(game.remove_player(first).is_some());
        assert!(game.player(first).is_none());
        assert!(game.remove_player(first).is_none());
    }
}
