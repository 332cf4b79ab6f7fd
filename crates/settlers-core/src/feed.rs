//! Push subscriptions: one change stream per (world, player).
//!
//! A subscriber hands the [`ChangeFeed`] a [`ChangeSink`]. The feed keeps
//! the last snapshot the sink accepted as its baseline, starting from an
//! empty view: the first change set a sink receives carries everything the
//! player currently sees. After every tick of the world the feed snapshots
//! the player under the tick's lock and, once the lock is released, pushes
//! the delta against the baseline.
//!
//! Sink failures stay inside the feed: a closed sink ends the subscription,
//! a full sink keeps it and the old baseline so the next delta carries the
//! missed changes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use settlers_types::{ChangeSet, PlayerKey, ViewSnapshot, WorldKey};
use settlers_world::GameMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};

use crate::projector::{ViewProjector, delta};
use crate::tick::{DeferredWork, TickObserver};
use crate::world::WorldHandle;

/// Why a sink refused a change set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// The sink cannot take more right now.
    #[error("sink is full")]
    Full,

    /// The receiving side is gone.
    #[error("sink is closed")]
    Closed,
}

/// Receiver of pushed change sets. Must not block.
pub trait ChangeSink: Send + Sync + std::fmt::Debug {
    /// Hand over one change set.
    fn push(&self, changes: ChangeSet) -> Result<(), SinkError>;
}

impl ChangeSink for mpsc::Sender<ChangeSet> {
    fn push(&self, changes: ChangeSet) -> Result<(), SinkError> {
        self.try_send(changes).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Full,
            TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

#[derive(Debug)]
struct Subscription {
    sink: Arc<dyn ChangeSink>,
    baseline: ViewSnapshot,
    generation: u64,
}

#[derive(Debug)]
struct Subscriptions {
    projector: ViewProjector,
    active: Mutex<HashMap<(WorldKey, PlayerKey), Subscription>>,
    generations: AtomicU64,
}

impl Subscriptions {
    fn lock(&self) -> MutexGuard<'_, HashMap<(WorldKey, PlayerKey), Subscription>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push snapshots taken during one tick to their subscribers.
    fn push_all(&self, world: WorldKey, snapshots: Vec<(PlayerKey, u64, ViewSnapshot)>) {
        let mut active = self.lock();
        for (player, generation, snapshot) in snapshots {
            // Replaced while the tick ran; the new baseline is newer.
            let current = active
                .get(&(world, player))
                .is_some_and(|s| s.generation == generation);
            if current {
                offer(&mut active, world, player, snapshot);
            }
        }
    }
}

/// Push the delta from the subscription's baseline to `snapshot`, moving the
/// baseline forward when the sink takes it.
fn offer(
    active: &mut HashMap<(WorldKey, PlayerKey), Subscription>,
    world: WorldKey,
    player: PlayerKey,
    snapshot: ViewSnapshot,
) {
    let Some(subscription) = active.get_mut(&(world, player)) else {
        return;
    };
    let changes = delta(&subscription.baseline, &snapshot);
    if changes.is_empty() {
        return;
    }
    match subscription.sink.push(changes) {
        Ok(()) => subscription.baseline = snapshot,
        Err(SinkError::Full) => {
            debug!(world = %world, player = %player, "Monitor sink full, delta deferred");
        }
        Err(SinkError::Closed) => {
            active.remove(&(world, player));
            info!(world = %world, player = %player, "Monitor sink closed, unsubscribed");
        }
    }
}

/// The set of live push subscriptions. Cloning is cheap; clones share the
/// subscriptions.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    inner: Arc<Subscriptions>,
}

impl ChangeFeed {
    /// A feed taking snapshots with the given projector.
    pub fn new(projector: ViewProjector) -> Self {
        Self {
            inner: Arc::new(Subscriptions {
                projector,
                active: Mutex::new(HashMap::new()),
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribe a player of a world, replacing any earlier sink of that
    /// player. The whole current view is pushed right away, as a change set
    /// against an empty view.
    ///
    /// Returns false when the player is not part of the world or the world
    /// was taken out of the scheduler. The subscription is recorded under
    /// the world lock, so it cannot slip in after the world was retired.
    pub async fn subscribe(
        &self,
        world: &WorldHandle,
        player: PlayerKey,
        sink: Arc<dyn ChangeSink>,
    ) -> bool {
        let key = world.key();
        let subscribed = world
            .with_world(|map| {
                if world.is_retired() {
                    return None;
                }
                let current = self.inner.projector.snapshot_of(map, player)?;
                let generation = self.inner.generations.fetch_add(1, Ordering::SeqCst);
                let mut active = self.inner.lock();
                let replaced = active
                    .insert(
                        (key, player),
                        Subscription {
                            sink,
                            baseline: ViewSnapshot::default(),
                            generation,
                        },
                    )
                    .is_some();
                offer(&mut active, key, player, current);
                Some(replaced)
            })
            .await;
        let Some(replaced) = subscribed else {
            return false;
        };
        info!(world = %key, player = %player, replaced, "Monitor subscribed");
        true
    }

    /// End a subscription. Unsubscribing twice is harmless.
    pub fn unsubscribe(&self, world: WorldKey, player: PlayerKey) -> bool {
        let removed = self.inner.lock().remove(&(world, player)).is_some();
        if removed {
            info!(world = %world, player = %player, "Monitor unsubscribed");
        }
        removed
    }

    /// End a subscription only if it still uses the given sink, so a closing
    /// connection does not end the subscription of its replacement.
    pub fn unsubscribe_sink(
        &self,
        world: WorldKey,
        player: PlayerKey,
        sink: &Arc<dyn ChangeSink>,
    ) -> bool {
        let mut active = self.inner.lock();
        let owned = active
            .get(&(world, player))
            .is_some_and(|s| Arc::ptr_eq(&s.sink, sink));
        if owned {
            active.remove(&(world, player));
            info!(world = %world, player = %player, "Monitor unsubscribed");
        }
        owned
    }

    /// End every subscription into a world.
    pub fn unsubscribe_world(&self, world: WorldKey) -> usize {
        let mut active = self.inner.lock();
        let before = active.len();
        active.retain(|(w, _), _| *w != world);
        before.saturating_sub(active.len())
    }

    /// Whether a player of a world is subscribed.
    pub fn is_subscribed(&self, world: WorldKey, player: PlayerKey) -> bool {
        self.inner.lock().contains_key(&(world, player))
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().len()
    }
}

impl TickObserver<GameMap> for ChangeFeed {
    fn capture(&self, world: WorldKey, state: &GameMap) -> Option<DeferredWork> {
        let subscribed: Vec<(PlayerKey, u64)> = self
            .inner
            .lock()
            .iter()
            .filter(|((w, _), _)| *w == world)
            .map(|((_, player), s)| (*player, s.generation))
            .collect();
        if subscribed.is_empty() {
            return None;
        }
        let snapshots: Vec<(PlayerKey, u64, ViewSnapshot)> = subscribed
            .into_iter()
            .filter_map(|(player, generation)| {
                self.inner
                    .projector
                    .snapshot_of(state, player)
                    .map(|s| (player, generation, s))
            })
            .collect();
        let inner = Arc::clone(&self.inner);
        Some(Box::new(move || inner.push_all(world, snapshots)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use settlers_types::{PlayerType, Point};
    use settlers_world::{MapTemplate, Player};

    use super::*;
    use crate::config::TickerConfig;
    use crate::projector::apply;
    use crate::registry::IdentityRegistry;
    use crate::tick::TickScheduler;

    fn quiet_world() -> (WorldHandle, PlayerKey) {
        let template = MapTemplate::blank("Quiet", 60, 60, vec![Point::new(20, 20)]);
        let player = Player::new(PlayerKey::new(), "Anna", "#00FF00", PlayerType::HumanPlayer);
        let key = player.key;
        (WorldHandle::new(GameMap::new(&template, vec![player]).unwrap()), key)
    }

    fn feed() -> ChangeFeed {
        ChangeFeed::new(ViewProjector::new(Arc::new(IdentityRegistry::new())))
    }

    /// Capture and push as a tick would.
    async fn push_now(feed: &ChangeFeed, world: &WorldHandle) {
        let key = world.key();
        let work = world.with_world(|map| feed.capture(key, map)).await;
        if let Some(work) = work {
            work();
        }
    }

    /// Subscribe and take the initial full view off the channel.
    async fn subscribed(
        feed: &ChangeFeed,
        world: &WorldHandle,
        player: PlayerKey,
        capacity: usize,
    ) -> mpsc::Receiver<ChangeSet> {
        let (tx, mut rx) = mpsc::channel::<ChangeSet>(capacity);
        assert!(feed.subscribe(world, player, Arc::new(tx)).await);
        let initial = rx.try_recv().unwrap();
        assert_eq!(initial.new_buildings.len(), 1);
        rx
    }

    #[tokio::test]
    async fn unknown_player_cannot_subscribe() {
        let (world, _) = quiet_world();
        let feed = feed();
        let (tx, _rx) = mpsc::channel::<ChangeSet>(4);
        assert!(!feed.subscribe(&world, PlayerKey::new(), Arc::new(tx)).await);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn first_frame_is_the_whole_view() {
        let (world, player) = quiet_world();
        let feed = feed();
        let projector = feed.inner.projector.clone();
        let fetched = projector.snapshot(&world, player).await.unwrap();

        // Changes between fetching the view and subscribing still arrive.
        world
            .with_world(|map| map.place_flag(player, Point::new(26, 20)))
            .await
            .unwrap();
        let (tx, mut rx) = mpsc::channel::<ChangeSet>(4);
        assert!(feed.subscribe(&world, player, Arc::new(tx)).await);

        let client = apply(&ViewSnapshot::default(), &rx.try_recv().unwrap());
        let server = projector.snapshot(&world, player).await.unwrap();
        assert_eq!(client, server);
        assert_eq!(server.flags.len(), fetched.flags.len().saturating_add(1));
    }

    #[tokio::test]
    async fn unchanged_world_pushes_nothing() {
        let (world, player) = quiet_world();
        let feed = feed();
        let mut rx = subscribed(&feed, &world, player, 4).await;
        push_now(&feed, &world).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn new_flag_is_pushed() {
        let (world, player) = quiet_world();
        let feed = feed();
        let mut rx = subscribed(&feed, &world, player, 4).await;

        world
            .with_world(|map| map.place_flag(player, Point::new(26, 20)))
            .await
            .unwrap();
        push_now(&feed, &world).await;

        let changes = rx.try_recv().unwrap();
        assert_eq!(changes.new_flags.len(), 1);
        let flag = changes.new_flags.first().unwrap();
        assert_eq!((flag.x, flag.y), (26, 20));
        assert!(!changes.changed_available_construction.is_empty());

        // The baseline advanced: nothing new to push.
        push_now(&feed, &world).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_sink_keeps_the_old_baseline() {
        let (world, player) = quiet_world();
        let feed = feed();
        let mut rx = subscribed(&feed, &world, player, 1).await;

        world.with_world(|map| map.place_flag(player, Point::new(26, 20))).await.unwrap();
        push_now(&feed, &world).await;
        world.with_world(|map| map.place_flag(player, Point::new(24, 24))).await.unwrap();
        push_now(&feed, &world).await;
        assert!(feed.is_subscribed(world.key(), player));

        let first = rx.try_recv().unwrap();
        assert_eq!(first.new_flags.len(), 1);
        assert!(rx.try_recv().is_err());

        push_now(&feed, &world).await;
        let second = rx.try_recv().unwrap();
        assert_eq!(second.new_flags.len(), 1);
        let flag = second.new_flags.first().unwrap();
        assert_eq!((flag.x, flag.y), (24, 24));
    }

    #[tokio::test]
    async fn closed_sink_ends_the_subscription() {
        let (world, player) = quiet_world();
        let feed = feed();
        let rx = subscribed(&feed, &world, player, 4).await;
        drop(rx);

        world.with_world(|map| map.place_flag(player, Point::new(26, 20))).await.unwrap();
        push_now(&feed, &world).await;
        assert!(!feed.is_subscribed(world.key(), player));
    }

    #[tokio::test]
    async fn subscribing_again_replaces_the_sink() {
        let (world, player) = quiet_world();
        let feed = feed();
        let (old_tx, mut old_rx) = mpsc::channel::<ChangeSet>(4);
        let old_sink: Arc<dyn ChangeSink> = Arc::new(old_tx);
        feed.subscribe(&world, player, Arc::clone(&old_sink)).await;
        assert!(old_rx.try_recv().is_ok());
        let mut new_rx = subscribed(&feed, &world, player, 4).await;
        assert_eq!(feed.subscriber_count(), 1);

        // The old connection closing must not end the new subscription.
        assert!(!feed.unsubscribe_sink(world.key(), player, &old_sink));

        world.with_world(|map| map.place_flag(player, Point::new(26, 20))).await.unwrap();
        push_now(&feed, &world).await;
        assert!(old_rx.try_recv().is_err());
        assert!(new_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let (world, player) = quiet_world();
        let feed = feed();
        let _rx = subscribed(&feed, &world, player, 4).await;
        assert!(feed.unsubscribe(world.key(), player));
        assert!(!feed.unsubscribe(world.key(), player));
        assert_eq!(feed.unsubscribe_world(world.key()), 0);
    }

    #[tokio::test]
    async fn unregistered_world_refuses_subscriptions() {
        let (world, player) = quiet_world();
        let feed = feed();
        let scheduler = Arc::new(TickScheduler::new(TickerConfig::default()));
        scheduler.register(world.clone());
        assert!(scheduler.unregister(world.key()).await);

        let (tx, _rx) = mpsc::channel::<ChangeSet>(4);
        assert!(!feed.subscribe(&world, player, Arc::new(tx)).await);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn one_discovering_tick_pushes_only_the_new_land() {
        let template = MapTemplate::blank("Quiet", 60, 60, vec![Point::new(20, 20)]);
        let anna = Player::new(PlayerKey::new(), "Anna", "#00FF00", PlayerType::HumanPlayer);
        let player = anna.key;
        let mut map = GameMap::new(&template, vec![anna]).unwrap();
        let tower = map.place_building(player, "LookoutTower", Point::new(26, 20)).unwrap();
        map.construct_instantly(tower).unwrap();
        let world = WorldHandle::new(map);

        let feed = feed();
        let scheduler = Arc::new(TickScheduler::new(TickerConfig::default()));
        scheduler.add_observer(Arc::new(feed.clone()));
        scheduler.register(world.clone());
        let (tx, mut rx) = mpsc::channel::<ChangeSet>(16);
        assert!(feed.subscribe(&world, player, Arc::new(tx)).await);
        assert!(rx.try_recv().is_ok());

        let mut pushed = None;
        for _ in 0..200 {
            scheduler.tick_once().await;
            if let Ok(changes) = rx.try_recv() {
                pushed = Some(changes);
                break;
            }
        }
        let changes = pushed.unwrap();
        assert!(!changes.new_discovered_land.is_empty());
        assert_eq!(
            changes,
            ChangeSet {
                time: changes.time,
                new_discovered_land: changes.new_discovered_land.clone(),
                ..ChangeSet::default()
            }
        );
        assert!(rx.try_recv().is_err());
    }
}
