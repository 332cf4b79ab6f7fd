//! Shared application state for the API server.
//!
//! [`AppState`] owns the game table and holds the pieces the live-access
//! layer is built from: the one [`IdentityRegistry`] of the process, the
//! [`TickScheduler`] driving running worlds, the [`ChangeFeed`] pushing to
//! monitors and the map catalog. Handlers reach everything through it; there
//! is no global.
//!
//! The game table lock is only held for bookkeeping. World state is always
//! read and written through [`WorldHandle::with_world`], after the table
//! lock has been released.

use std::collections::BTreeMap;
use std::sync::Arc;

use settlers_core::{
    ChangeFeed, EntityKind, GamePlaceholder, IdReaper, IdentityRegistry, ObjectRef, Renderer,
    SettlersConfig, TickScheduler, ViewProjector, WorldHandle,
};
use settlers_types::{
    EntityKey, GameStatus, GameView, MapKey, MapView, ObjectId, PlayerKey, PlayerView,
    ResourceLevel, WorldKey,
};
use settlers_world::{GameMap, MapTemplate, Player, builtin_maps};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::ApiError;

/// A game that has been started.
#[derive(Debug, Clone)]
pub struct RunningGame {
    /// The world, registered with the scheduler.
    pub world: WorldHandle,
    /// Display name carried over from the placeholder.
    pub name: Option<String>,
    /// The map template the world was created from.
    pub map: MapKey,
    /// The resource level the game started with.
    pub resources: ResourceLevel,
}

impl RunningGame {
    /// Run a closure on the world under its lock.
    ///
    /// A game deleted while the request waited for the lock is reported as
    /// not found and the closure does not run, so nothing renders ids into
    /// a world whose ids were already released.
    pub async fn with_map<T>(
        &self,
        f: impl FnOnce(&mut GameMap) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        self.world
            .with_world(|map| {
                if self.world.is_retired() {
                    return Err(ApiError::not_found("game"));
                }
                f(map)
            })
            .await
    }
}

/// An entry of the game table.
#[derive(Debug, Clone)]
pub enum Game {
    /// Not started yet.
    Waiting(GamePlaceholder),
    /// Running in the scheduler.
    Running(RunningGame),
}

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug)]
pub struct AppState {
    /// The configuration the server was started with.
    pub config: SettlersConfig,
    /// Stable ids of every addressable object.
    pub registry: Arc<IdentityRegistry>,
    /// Per-player snapshots for `/view`.
    pub projector: ViewProjector,
    /// Monitor subscriptions.
    pub feed: ChangeFeed,
    /// The background driver of running worlds.
    pub scheduler: Arc<TickScheduler>,
    catalog: Vec<MapTemplate>,
    games: RwLock<BTreeMap<ObjectId, Game>>,
}

impl AppState {
    /// State with the built-in map catalog.
    pub fn new(config: SettlersConfig) -> Self {
        Self::with_catalog(config, builtin_maps())
    }

    /// State with an explicit map catalog. Every map gets its id up front
    /// and the change feed is attached to the scheduler.
    pub fn with_catalog(config: SettlersConfig, catalog: Vec<MapTemplate>) -> Self {
        let registry = Arc::new(IdentityRegistry::new());
        for template in &catalog {
            registry.id_for(ObjectRef::Map(template.key));
        }
        let projector = ViewProjector::new(Arc::clone(&registry));
        let feed = ChangeFeed::new(projector.clone());
        let scheduler = Arc::new(TickScheduler::new(config.ticker.clone()));
        scheduler.add_observer(Arc::new(feed.clone()));
        scheduler.add_observer(Arc::new(IdReaper::new(Arc::clone(&registry))));
        Self {
            config,
            registry,
            projector,
            feed,
            scheduler,
            catalog,
            games: RwLock::new(BTreeMap::new()),
        }
    }

    // -----------------------------------------------------------------------
    // Maps
    // -----------------------------------------------------------------------

    /// The map catalog.
    pub fn catalog(&self) -> &[MapTemplate] {
        &self.catalog
    }

    /// Resolve a map id.
    pub fn template(&self, id: ObjectId) -> Result<&MapTemplate, ApiError> {
        match self.registry.object_for(id)? {
            ObjectRef::Map(key) => self
                .catalog
                .iter()
                .find(|t| t.key == key)
                .ok_or_else(|| ApiError::not_found(format!("map {id}"))),
            _ => Err(ApiError::not_found(format!("map {id}"))),
        }
    }

    /// A catalog entry on the wire.
    pub fn map_view(&self, template: &MapTemplate) -> MapView {
        MapView {
            id: self.registry.id_for(ObjectRef::Map(template.key)),
            title: template.title.clone(),
            author: template.author.clone(),
            width: template.width,
            height: template.height,
            max_players: u32::try_from(template.max_players()).unwrap_or(u32::MAX),
            starting_points: template.starting_points.clone(),
        }
    }

    fn expanded_map(&self, key: MapKey) -> Option<MapView> {
        self.catalog
            .iter()
            .find(|t| t.key == key)
            .map(|t| self.map_view(t))
    }

    // -----------------------------------------------------------------------
    // Game table
    // -----------------------------------------------------------------------

    /// Every game, ordered by id.
    pub async fn games(&self) -> Vec<(ObjectId, Game)> {
        self.games
            .read()
            .await
            .iter()
            .map(|(id, game)| (*id, game.clone()))
            .collect()
    }

    /// One game.
    pub async fn game(&self, id: ObjectId) -> Result<Game, ApiError> {
        self.games
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("game {id}")))
    }

    /// One game that must be running.
    pub async fn running(&self, id: ObjectId) -> Result<RunningGame, ApiError> {
        match self.game(id).await? {
            Game::Running(running) => Ok(running),
            Game::Waiting(_) => Err(ApiError::NotAllowed(format!(
                "game {id} has not been started"
            ))),
        }
    }

    /// Add a placeholder to the table and return its id.
    pub async fn create_game(&self, placeholder: GamePlaceholder) -> ObjectId {
        let id = self.registry.id_for(ObjectRef::Placeholder(placeholder.key));
        info!(game = %id, players = placeholder.players.len(), "Game created");
        self.games
            .write()
            .await
            .insert(id, Game::Waiting(placeholder));
        id
    }

    /// Edit a placeholder. Started games refuse with `405`.
    pub async fn update_placeholder<R>(
        &self,
        id: ObjectId,
        f: impl FnOnce(&mut GamePlaceholder) -> Result<R, ApiError>,
    ) -> Result<R, ApiError> {
        let mut games = self.games.write().await;
        match games.get_mut(&id) {
            Some(Game::Waiting(placeholder)) => f(placeholder),
            Some(Game::Running(_)) => Err(ApiError::NotAllowed(format!(
                "game {id} has already been started"
            ))),
            None => Err(ApiError::not_found(format!("game {id}"))),
        }
    }

    /// Rename a game, started or not.
    pub async fn rename_game(&self, id: ObjectId, name: String) -> Result<(), ApiError> {
        let mut games = self.games.write().await;
        match games.get_mut(&id) {
            Some(Game::Waiting(placeholder)) => placeholder.name = Some(name),
            Some(Game::Running(running)) => running.name = Some(name),
            None => return Err(ApiError::not_found(format!("game {id}"))),
        }
        Ok(())
    }

    /// Turn a placeholder into a running world. The game keeps its id and
    /// its players keep theirs.
    pub async fn start_game(&self, id: ObjectId) -> Result<RunningGame, ApiError> {
        let mut games = self.games.write().await;
        let entry = games
            .get_mut(&id)
            .ok_or_else(|| ApiError::not_found(format!("game {id}")))?;
        let Game::Waiting(placeholder) = entry else {
            return Err(ApiError::NotAllowed(format!(
                "game {id} has already been started"
            )));
        };
        let Some(template) = placeholder.map else {
            return Err(ApiError::BadRequest(String::from("no map selected")));
        };
        let map = placeholder.start(&self.catalog)?;
        let running = RunningGame {
            world: WorldHandle::new(map),
            name: placeholder.name.clone(),
            map: template,
            resources: placeholder.resources,
        };
        self.registry
            .rebind(id, ObjectRef::World(running.world.key()))?;
        *entry = Game::Running(running.clone());
        drop(games);

        self.scheduler.register(running.world.clone());
        info!(game = %id, world = %running.world.key(), "Game registered with the scheduler");
        Ok(running)
    }

    /// Remove a game. A running world is unregistered first, so no tick is
    /// in flight when its ids are released.
    pub async fn delete_game(&self, id: ObjectId) -> Result<(), ApiError> {
        let game = self
            .games
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| ApiError::not_found(format!("game {id}")))?;

        let players: Vec<PlayerKey> = match game {
            Game::Waiting(placeholder) => {
                self.registry
                    .release(&ObjectRef::Placeholder(placeholder.key));
                placeholder.players.iter().map(|p| p.key).collect()
            }
            Game::Running(running) => {
                let world = running.world.key();
                self.scheduler.unregister(world).await;
                let monitors = self.feed.unsubscribe_world(world);
                let players = running
                    .world
                    .with_world(|map| map.players().iter().map(|p| p.key).collect::<Vec<_>>())
                    .await;
                let released = self.registry.release_where(|o| o.world() == Some(world));
                info!(game = %id, %world, monitors, released, "World removed");
                players
            }
        };
        for player in players {
            self.registry.release(&ObjectRef::Player(player));
        }
        info!(game = %id, "Game deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Id resolution
    // -----------------------------------------------------------------------

    /// Resolve a player id. Membership in a game is checked by the caller.
    pub fn player_key(&self, id: ObjectId) -> Result<PlayerKey, ApiError> {
        match self.registry.object_for(id)? {
            ObjectRef::Player(key) => Ok(key),
            _ => Err(ApiError::not_found(format!("player {id}"))),
        }
    }

    /// Resolve the id of an entity of the given kind living in `world`.
    pub fn entity_key(
        &self,
        id: ObjectId,
        world: WorldKey,
        kind: EntityKind,
    ) -> Result<EntityKey, ApiError> {
        match self.registry.object_for(id)? {
            ObjectRef::Entity {
                world: owner,
                kind: found,
                key,
            } if owner == world && found == kind => Ok(key),
            _ => Err(ApiError::not_found(format!("{kind:?} {id}").to_lowercase())),
        }
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    /// A roster entry of a placeholder.
    pub fn roster_view(&self, player: &Player) -> PlayerView {
        PlayerView {
            id: self.registry.id_for(ObjectRef::Player(player.key)),
            name: player.name.clone(),
            color: player.color.clone(),
            kind: player.kind,
            center_point: None,
        }
    }

    /// The players of a running game, headquarter positions included. A
    /// game deleted in the meantime has none.
    pub async fn world_players(&self, running: &RunningGame) -> Vec<PlayerView> {
        running
            .with_map(|map| {
                let renderer = Renderer::new(&self.registry, map.key());
                Ok(map
                    .players()
                    .iter()
                    .map(|p| renderer.player(map, p))
                    .collect())
            })
            .await
            .unwrap_or_default()
    }

    /// A game on the wire.
    pub async fn game_view(&self, id: ObjectId, game: &Game) -> GameView {
        match game {
            Game::Waiting(placeholder) => GameView {
                id,
                name: placeholder.name.clone(),
                players: placeholder
                    .players
                    .iter()
                    .map(|p| self.roster_view(p))
                    .collect(),
                status: GameStatus::NotStarted,
                resources: placeholder.resources,
                map_id: placeholder
                    .map
                    .map(|key| self.registry.id_for(ObjectRef::Map(key))),
                map: placeholder.map.and_then(|key| self.expanded_map(key)),
            },
            Game::Running(running) => GameView {
                id,
                name: running.name.clone(),
                players: self.world_players(running).await,
                status: GameStatus::Started,
                resources: running.resources,
                map_id: Some(self.registry.id_for(ObjectRef::Map(running.map))),
                map: self.expanded_map(running.map),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use settlers_types::{ChangeSet, PlayerType};

    use super::*;

    fn state() -> AppState {
        AppState::new(SettlersConfig::default())
    }

    fn placeholder(state: &AppState) -> GamePlaceholder {
        let mut game = GamePlaceholder::new(Some(String::from("Test")));
        game.add_player("Anna", "#00FF00", PlayerType::HumanPlayer);
        game.map = state.catalog().first().map(|t| t.key);
        game
    }

    #[test]
    fn catalog_maps_have_ids() {
        let state = state();
        assert_eq!(state.registry.len(), state.catalog().len());
        let first = state.catalog().first().unwrap();
        let view = state.map_view(first);
        assert_eq!(state.template(view.id).unwrap().key, first.key);
    }

    #[tokio::test]
    async fn start_keeps_the_game_id() {
        let state = state();
        let id = state.create_game(placeholder(&state)).await;
        let running = state.start_game(id).await.unwrap();
        assert_eq!(
            state.registry.object_for(id).unwrap(),
            ObjectRef::World(running.world.key())
        );
        assert!(state.scheduler.is_registered(running.world.key()));
        assert!(matches!(state.game(id).await.unwrap(), Game::Running(_)));
    }

    #[tokio::test]
    async fn starting_twice_is_not_allowed() {
        let state = state();
        let id = state.create_game(placeholder(&state)).await;
        state.start_game(id).await.unwrap();
        assert!(matches!(
            state.start_game(id).await,
            Err(ApiError::NotAllowed(_))
        ));
    }

    #[tokio::test]
    async fn delete_releases_every_id_of_the_world() {
        let state = state();
        let maps = state.registry.len();
        let id = state.create_game(placeholder(&state)).await;
        let running = state.start_game(id).await.unwrap();
        let players = state.world_players(&running).await;
        assert_eq!(players.len(), 1);

        state.delete_game(id).await.unwrap();
        assert_eq!(state.registry.len(), maps);
        assert!(!state.scheduler.is_registered(running.world.key()));
        assert!(matches!(state.game(id).await, Err(ApiError::NotFound(_))));
        assert!(matches!(state.delete_game(id).await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn requests_racing_a_delete_render_nothing() {
        let state = state();
        let id = state.create_game(placeholder(&state)).await;
        let running = state.start_game(id).await.unwrap();
        let player = running
            .world
            .with_world(|map| map.players().first().unwrap().key)
            .await;

        state.delete_game(id).await.unwrap();
        let remaining = state.registry.len();

        let rendered = running
            .with_map(|map| {
                let hq = map.headquarter_of(player).unwrap();
                Ok(Renderer::new(&state.registry, map.key()).house(hq).id)
            })
            .await;
        assert!(matches!(rendered, Err(ApiError::NotFound(_))));
        assert!(state.world_players(&running).await.is_empty());

        let (tx, _rx) = tokio::sync::mpsc::channel::<ChangeSet>(4);
        assert!(!state.feed.subscribe(&running.world, player, Arc::new(tx)).await);
        assert_eq!(state.feed.subscriber_count(), 0);
        assert_eq!(state.registry.len(), remaining);
    }

    #[tokio::test]
    async fn entity_of_another_world_is_not_found() {
        let state = state();
        let id = state.create_game(placeholder(&state)).await;
        let running = state.start_game(id).await.unwrap();
        let house = running
            .world
            .with_world(|map| {
                let hq = map.headquarter_of(map.players().first().unwrap().key).unwrap();
                Renderer::new(&state.registry, map.key()).house(hq).id
            })
            .await;

        let own = state.entity_key(house, running.world.key(), EntityKind::Building);
        assert!(own.is_ok());
        let foreign = state.entity_key(house, WorldKey::new(), EntityKind::Building);
        assert!(matches!(foreign, Err(ApiError::NotFound(_))));
        let wrong_kind = state.entity_key(house, running.world.key(), EntityKind::Flag);
        assert!(matches!(wrong_kind, Err(ApiError::NotFound(_))));
    }
}
