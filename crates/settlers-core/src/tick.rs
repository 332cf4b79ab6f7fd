//! The background simulation driver.
//!
//! Every tick interval the [`TickScheduler`] advances a shared clock. Each
//! registered world follows the clock on its own task, so a slow world
//! skips ticks instead of holding up another. Every Nth clock tick the
//! computer players of each world take a turn as well. A world tick runs
//! entirely under that world's lock, on the blocking thread pool:
//!
//! 1. **Step** -- advance simulated time.
//! 2. **Computer players** -- every Nth tick, scheduler-wide.
//! 3. **Capture** -- tick observers copy what they need.
//!
//! After the lock is released the tick is timed against the running
//! maximum and the configured threshold, then the observers' deferred work
//! (pushes to monitors) runs.
//!
//! Faults of one world, error results or panics, are logged and the world
//! ticks again on the next interval.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use settlers_types::WorldKey;
use settlers_world::GameMap;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::TickerConfig;
use crate::simulation::{Simulation, SimulationFault, guarded};
use crate::world::WorldHandle;

/// Work an observer hands back from [`TickObserver::capture`], run after
/// the world lock is released.
pub type DeferredWork = Box<dyn FnOnce() + Send>;

/// Something that looks at every world right after it ticked.
pub trait TickObserver<W>: Send + Sync {
    /// Copy what is needed from the world. Called with the world lock held;
    /// must not block.
    fn capture(&self, world: WorldKey, state: &W) -> Option<DeferredWork>;
}

/// Lock a std mutex, recovering the data of a poisoned one.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Timing statistics
// ---------------------------------------------------------------------------

/// Timing of one world tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldTiming {
    /// The world.
    pub world: WorldKey,
    /// Time spent in the step.
    pub step: Duration,
    /// Time spent in the step and the computer players together.
    pub total: Duration,
    /// Whether computer players took a turn.
    pub computer_players: bool,
    /// Whether the step or a turn failed.
    pub faulted: bool,
}

/// Why a tick was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Regression {
    /// The step or total time beat the running maximum.
    pub new_maximum: bool,
    /// The total time exceeded the configured threshold.
    pub over_threshold: bool,
}

/// Running timing statistics over all worlds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickStats {
    /// World ticks recorded.
    pub recorded: u64,
    /// Slowest step seen.
    pub max_step: Duration,
    /// Slowest step plus computer players seen.
    pub max_total: Duration,
    /// World ticks that exceeded the threshold.
    pub over_threshold: u64,
    /// Faulted world ticks.
    pub faults: u64,
    /// When the last regression was seen.
    pub last_regression_at: Option<DateTime<Utc>>,
}

impl TickStats {
    /// Record one world tick. Returns a [`Regression`] when the tick set a
    /// new maximum or exceeded the threshold.
    pub fn record(&mut self, timing: &WorldTiming, threshold: Duration) -> Option<Regression> {
        self.recorded = self.recorded.saturating_add(1);
        if timing.faulted {
            self.faults = self.faults.saturating_add(1);
        }
        let new_maximum = timing.step > self.max_step || timing.total > self.max_total;
        self.max_step = self.max_step.max(timing.step);
        self.max_total = self.max_total.max(timing.total);
        let over_threshold = timing.total > threshold;
        if over_threshold {
            self.over_threshold = self.over_threshold.saturating_add(1);
        }
        if !new_maximum && !over_threshold {
            return None;
        }
        self.last_regression_at = Some(Utc::now());
        Some(Regression {
            new_maximum,
            over_threshold,
        })
    }

    /// Render the diagnostic table logged on a regression.
    pub fn table(&self, timing: &WorldTiming, threshold: Duration) -> String {
        let rows = [
            ("world", timing.world.to_string()),
            ("step", format!("{:?}", timing.step)),
            ("step+computer", format!("{:?}", timing.total)),
            ("computer players", timing.computer_players.to_string()),
            ("max step", format!("{:?}", self.max_step)),
            ("max step+computer", format!("{:?}", self.max_total)),
            ("threshold", format!("{threshold:?}")),
            ("over threshold", self.over_threshold.to_string()),
            ("recorded", self.recorded.to_string()),
        ];
        let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
        let mut table = String::new();
        for (name, value) in rows {
            let _ = writeln!(table, "| {name:<width$} | {value} |");
        }
        table
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Summary of one manual scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Scheduler tick number, starting at 1.
    pub tick: u64,
    /// Worlds that were advanced.
    pub worlds: usize,
    /// Whether computer players took a turn.
    pub computer_players: bool,
}

/// The task ticking one world while the scheduler runs.
#[derive(Debug)]
struct WorldTask {
    stop: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl WorldTask {
    /// Signal the task and wait until it has finished its tick in flight.
    async fn finish(self, world: WorldKey) {
        self.stop.send_replace(true);
        if let Err(e) = self.join.await {
            error!(world = %world, error = %e, "World task failed");
        }
    }
}

#[derive(Debug)]
struct Registered<W> {
    handle: WorldHandle<W>,
    task: Option<WorldTask>,
}

#[derive(Debug)]
struct Worlds<W> {
    running: bool,
    entries: BTreeMap<WorldKey, Registered<W>>,
}

/// Fixed-rate driver of all running worlds.
///
/// A clock task advances the scheduler tick every interval. Each registered
/// world follows the clock on its own task, so a world that is slow to step,
/// or whose lock a request holds, falls behind on its own: it skips the
/// ticks it missed and never delays another world.
pub struct TickScheduler<W: Simulation = GameMap> {
    config: TickerConfig,
    worlds: Mutex<Worlds<W>>,
    observers: Mutex<Vec<Arc<dyn TickObserver<W>>>>,
    clock: watch::Sender<u64>,
    stats: Mutex<TickStats>,
    shutdown: watch::Sender<bool>,
    driver: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<W: Simulation> std::fmt::Debug for TickScheduler<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickScheduler")
            .field("config", &self.config)
            .field("worlds", &lock(&self.worlds).entries.len())
            .field("ticks", &self.ticks())
            .finish_non_exhaustive()
    }
}

impl<W: Simulation> TickScheduler<W> {
    /// A stopped scheduler with no worlds.
    pub fn new(config: TickerConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        let (clock, _) = watch::channel(0);
        Self {
            config,
            worlds: Mutex::new(Worlds {
                running: false,
                entries: BTreeMap::new(),
            }),
            observers: Mutex::new(Vec::new()),
            clock,
            stats: Mutex::new(TickStats::default()),
            shutdown,
            driver: tokio::sync::Mutex::new(None),
        }
    }

    /// The configuration the scheduler runs with.
    pub const fn config(&self) -> &TickerConfig {
        &self.config
    }

    /// Add an observer called after every world tick.
    pub fn add_observer(&self, observer: Arc<dyn TickObserver<W>>) {
        lock(&self.observers).push(observer);
    }

    /// Start ticking a world. Registering a world twice is a no-op;
    /// returns whether the world was newly added. On a running scheduler
    /// the world's task starts right away.
    pub fn register(self: &Arc<Self>, world: WorldHandle<W>) -> bool {
        let key = world.key();
        let mut worlds = lock(&self.worlds);
        if worlds.entries.contains_key(&key) {
            return false;
        }
        let task = worlds.running.then(|| self.spawn_world(world.clone()));
        worlds.entries.insert(
            key,
            Registered {
                handle: world,
                task,
            },
        );
        info!(world = %key, "World registered with the scheduler");
        true
    }

    /// Stop ticking a world. Returns once any tick of the world that is in
    /// flight has completed; no later tick touches it.
    pub async fn unregister(&self, key: WorldKey) -> bool {
        let Some(entry) = lock(&self.worlds).entries.remove(&key) else {
            return false;
        };
        entry.handle.retire();
        if let Some(task) = entry.task {
            task.finish(key).await;
        }
        // Manual ticks that got the lock before us finish first.
        entry.handle.with_world(|_| ()).await;
        info!(world = %key, "World unregistered from the scheduler");
        true
    }

    /// Whether a world is registered.
    pub fn is_registered(&self, key: WorldKey) -> bool {
        lock(&self.worlds).entries.contains_key(&key)
    }

    /// Number of registered worlds.
    pub fn world_count(&self) -> usize {
        lock(&self.worlds).entries.len()
    }

    /// Scheduler ticks run so far.
    pub fn ticks(&self) -> u64 {
        *self.clock.borrow()
    }

    /// A copy of the timing statistics.
    pub fn stats(&self) -> TickStats {
        lock(&self.stats).clone()
    }

    /// Advance the clock by one tick and advance every registered world by
    /// hand, waiting for all of them. Meant for a stopped scheduler.
    pub async fn tick_once(&self) -> TickReport {
        let tick = self.advance_clock();
        let computer_players = self.computer_turn_due(tick.saturating_sub(1), tick);
        let worlds: Vec<WorldHandle<W>> = lock(&self.worlds)
            .entries
            .values()
            .map(|entry| entry.handle.clone())
            .collect();

        let mut tasks = JoinSet::new();
        for world in worlds {
            tasks.spawn(tick_world(world, computer_players, self.observers()));
        }

        let mut advanced = 0_usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(timing)) => {
                    advanced = advanced.saturating_add(1);
                    self.record(&timing);
                }
                Ok(None) => {}
                Err(e) => error!(tick, error = %e, "World tick task failed"),
            }
        }
        debug!(tick, worlds = advanced, computer_players, "Tick finished");
        TickReport {
            tick,
            worlds: advanced,
            computer_players,
        }
    }

    fn advance_clock(&self) -> u64 {
        let mut tick = 0;
        self.clock.send_modify(|current| {
            *current = current.wrapping_add(1);
            tick = *current;
        });
        tick
    }

    /// Whether a world that last ticked at `previous` owes its computer
    /// players a turn at `tick`: some multiple of the frequency lies in
    /// between. A frequency of zero disables computer players.
    fn computer_turn_due(&self, previous: u64, tick: u64) -> bool {
        let frequency = self.config.computer_player_frequency;
        match (tick.checked_div(frequency), previous.checked_div(frequency)) {
            (Some(now), Some(before)) => now > before,
            _ => false,
        }
    }

    fn observers(&self) -> Arc<[Arc<dyn TickObserver<W>>]> {
        lock(&self.observers).clone().into()
    }

    fn record(&self, timing: &WorldTiming) {
        let threshold = Duration::from_millis(self.config.tick_time_upper_threshold_ms);
        let mut stats = lock(&self.stats);
        let Some(regression) = stats.record(timing, threshold) else {
            return;
        };
        let table = stats.table(timing, threshold);
        drop(stats);
        if regression.over_threshold {
            warn!(world = %timing.world, "Tick exceeded time threshold\n{table}");
        } else {
            info!(world = %timing.world, "New maximum tick time\n{table}");
        }
    }
}

impl<W: Simulation> TickScheduler<W> {
    /// Start the clock and one task per registered world. Starting a
    /// running scheduler is a no-op.
    pub async fn start(self: &Arc<Self>) {
        let mut driver = self.driver.lock().await;
        if driver.is_some() {
            warn!("Scheduler already running");
            return;
        }
        self.shutdown.send_replace(false);
        {
            let mut worlds = lock(&self.worlds);
            worlds.running = true;
            for entry in worlds.entries.values_mut() {
                entry.task = Some(self.spawn_world(entry.handle.clone()));
            }
        }
        let shutdown = self.shutdown.subscribe();
        *driver = Some(tokio::spawn(Arc::clone(self).drive(shutdown)));
        info!(
            interval_ms = self.config.tick_interval_ms,
            computer_player_frequency = self.config.computer_player_frequency,
            "Scheduler started"
        );
    }

    /// Stop the clock and every world task. Returns after the ticks in
    /// progress have finished; no world is mutated by the scheduler
    /// afterwards.
    pub async fn stop(&self) {
        let mut driver = self.driver.lock().await;
        let Some(clock) = driver.take() else {
            return;
        };
        self.shutdown.send_replace(true);
        if let Err(e) = clock.await {
            error!(error = %e, "Scheduler clock task failed");
        }
        let tasks: Vec<(WorldKey, WorldTask)> = {
            let mut worlds = lock(&self.worlds);
            worlds.running = false;
            worlds
                .entries
                .iter_mut()
                .filter_map(|(key, entry)| entry.task.take().map(|task| (*key, task)))
                .collect()
        };
        for (key, task) in tasks {
            task.finish(key).await;
        }
        drop(driver);
        info!(ticks = self.ticks(), "Scheduler stopped");
    }

    fn spawn_world(self: &Arc<Self>, handle: WorldHandle<W>) -> WorldTask {
        let (stop, stopped) = watch::channel(false);
        let clock = self.clock.subscribe();
        let join = tokio::spawn(Arc::clone(self).run_world(handle, clock, stopped));
        WorldTask { stop, join }
    }

    async fn drive(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let period = Duration::from_millis(self.config.tick_interval_ms.max(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    self.advance_clock();
                }
            }
        }
    }

    /// Follow the clock for one world until stopped or retired.
    async fn run_world(
        self: Arc<Self>,
        handle: WorldHandle<W>,
        mut clock: watch::Receiver<u64>,
        mut stop: watch::Receiver<bool>,
    ) {
        let key = handle.key();
        let mut seen = *clock.borrow_and_update();
        loop {
            tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
                changed = clock.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let tick = *clock.borrow_and_update();
                    let computer_players = self.computer_turn_due(seen, tick);
                    seen = tick;
                    match tick_world(handle.clone(), computer_players, self.observers()).await {
                        Some(timing) => self.record(&timing),
                        None => break,
                    }
                }
            }
        }
        debug!(world = %key, "World task finished");
    }
}

/// Tick one world: step, computer players and capture under the lock on
/// the blocking pool, then the deferred work outside it. `None` when the
/// world was retired.
async fn tick_world<W: Simulation>(
    handle: WorldHandle<W>,
    computer_players: bool,
    observers: Arc<[Arc<dyn TickObserver<W>>]>,
) -> Option<WorldTiming> {
    let key = handle.key();
    let retired = handle.clone();
    let locked = handle
        .with_world_blocking(move |world| {
            if retired.is_retired() {
                return None;
            }
            let started = Instant::now();
            let mut faults: Vec<(&'static str, SimulationFault)> = Vec::new();
            if let Err(e) = guarded(world, Simulation::step) {
                faults.push(("step", e));
            }
            let step = started.elapsed();
            if computer_players {
                if let Err(e) = guarded(world, Simulation::run_computer_players) {
                    faults.push(("computer players", e));
                }
            }
            let total = started.elapsed();
            let deferred: Vec<DeferredWork> = observers
                .iter()
                .filter_map(|observer| observer.capture(key, world))
                .collect();
            Some((faults, step, total, deferred))
        })
        .await;
    let (faults, step, total, deferred) = match locked {
        Ok(outcome) => outcome?,
        Err(e) => {
            error!(world = %key, error = %e, "World tick panicked outside the simulation");
            return Some(WorldTiming {
                world: key,
                step: Duration::ZERO,
                total: Duration::ZERO,
                computer_players,
                faulted: true,
            });
        }
    };

    for (phase, fault) in &faults {
        error!(world = %key, phase, error = %fault, "World tick failed");
    }
    for work in deferred {
        work();
    }
    Some(WorldTiming {
        world: key,
        step,
        total,
        computer_players,
        faulted: !faults.is_empty(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use tokio::sync::mpsc;

    use super::*;

    /// A world whose two counters must always be equal between steps. A
    /// broken one panics halfway through every step.
    #[derive(Debug, Default)]
    struct Counter {
        before: u64,
        after: u64,
        turns: u64,
        pause: Duration,
        broken: bool,
    }

    impl Simulation for Counter {
        #[allow(clippy::panic)]
        fn step(&mut self) -> Result<(), SimulationFault> {
            self.before = self.before.saturating_add(1);
            if self.broken {
                panic!("broken world");
            }
            if !self.pause.is_zero() {
                std::thread::sleep(self.pause);
            }
            self.after = self.after.saturating_add(1);
            Ok(())
        }

        fn run_computer_players(&mut self) -> Result<(), SimulationFault> {
            if self.broken {
                return Err(SimulationFault::Panicked("no players".to_owned()));
            }
            self.turns = self.turns.saturating_add(1);
            Ok(())
        }
    }

    fn config(interval_ms: u64, frequency: u64) -> TickerConfig {
        TickerConfig {
            tick_interval_ms: interval_ms,
            computer_player_frequency: frequency,
            tick_time_upper_threshold_ms: 150,
        }
    }

    fn counter(pause: Duration) -> WorldHandle<Counter> {
        WorldHandle::with_key(
            WorldKey::new(),
            Counter {
                pause,
                ..Counter::default()
            },
        )
    }

    #[tokio::test]
    async fn tick_once_advances_every_world() {
        let scheduler = Arc::new(TickScheduler::new(config(200, 100)));
        let a = counter(Duration::ZERO);
        let b = counter(Duration::ZERO);
        assert!(scheduler.register(a.clone()));
        assert!(scheduler.register(b.clone()));

        let report = scheduler.tick_once().await;
        assert_eq!(report.tick, 1);
        assert_eq!(report.worlds, 2);
        assert_eq!(a.with_world(|w| w.after).await, 1);
        assert_eq!(b.with_world(|w| w.after).await, 1);
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let scheduler = Arc::new(TickScheduler::new(config(200, 100)));
        let world = counter(Duration::ZERO);
        assert!(scheduler.register(world.clone()));
        assert!(!scheduler.register(world.clone()));
        assert_eq!(scheduler.world_count(), 1);

        scheduler.tick_once().await;
        assert_eq!(world.with_world(|w| w.after).await, 1);
    }

    #[tokio::test]
    async fn computer_players_run_every_nth_tick() {
        let scheduler = Arc::new(TickScheduler::new(config(200, 3)));
        let world = counter(Duration::ZERO);
        scheduler.register(world.clone());
        for _ in 0..7 {
            scheduler.tick_once().await;
        }
        assert_eq!(world.with_world(|w| (w.after, w.turns)).await, (7, 2));
    }

    #[tokio::test]
    async fn zero_frequency_disables_computer_players() {
        let scheduler = Arc::new(TickScheduler::new(config(200, 0)));
        let world = counter(Duration::ZERO);
        scheduler.register(world.clone());
        let report = scheduler.tick_once().await;
        assert!(!report.computer_players);
        assert_eq!(world.with_world(|w| w.turns).await, 0);
    }

    #[tokio::test]
    async fn a_faulty_world_does_not_stop_the_others() {
        let scheduler = Arc::new(TickScheduler::new(config(200, 1)));
        let healthy = counter(Duration::ZERO);
        let faulty = WorldHandle::with_key(
            WorldKey::new(),
            Counter {
                broken: true,
                ..Counter::default()
            },
        );
        scheduler.register(healthy.clone());
        scheduler.register(faulty.clone());

        for _ in 0..3 {
            let report = scheduler.tick_once().await;
            assert_eq!(report.worlds, 2);
        }
        assert_eq!(healthy.with_world(|w| (w.after, w.turns)).await, (3, 3));
        assert_eq!(faulty.with_world(|w| (w.before, w.after)).await, (3, 0));
        assert_eq!(scheduler.stats().faults, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn unregister_waits_for_the_tick_in_flight() {
        let scheduler = Arc::new(TickScheduler::new(config(200, 100)));
        let world = counter(Duration::from_millis(100));
        let key = world.key();
        scheduler.register(world.clone());

        let ticking = Arc::clone(&scheduler);
        let tick = tokio::spawn(async move { ticking.tick_once().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(scheduler.unregister(key).await);
        assert_eq!(world.with_world(|w| (w.before, w.after)).await, (1, 1));
        assert!(!scheduler.is_registered(key));

        tick.await.unwrap();
        scheduler.tick_once().await;
        assert_eq!(world.with_world(|w| w.after).await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn stop_leaves_worlds_quiescent() {
        let scheduler = Arc::new(TickScheduler::new(config(1, 100)));
        let world = counter(Duration::ZERO);
        scheduler.register(world.clone());
        scheduler.start().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.stop().await;

        let stopped_at = world.with_world(|w| w.after).await;
        assert!(stopped_at > 0);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(world.with_world(|w| w.after).await, stopped_at);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_see_a_torn_world() {
        let scheduler = Arc::new(TickScheduler::new(config(1, 2)));
        let world = counter(Duration::from_micros(200));
        scheduler.register(world.clone());
        scheduler.start().await;

        let torn = Arc::new(AtomicBool::new(false));
        let mut readers = JoinSet::new();
        for _ in 0..8 {
            let world = world.clone();
            let torn = Arc::clone(&torn);
            readers.spawn(async move {
                for _ in 0..200 {
                    let consistent = world.with_world(|w| w.before == w.after).await;
                    if !consistent {
                        torn.store(true, Ordering::SeqCst);
                    }
                    tokio::task::yield_now().await;
                }
            });
        }
        while let Some(done) = readers.join_next().await {
            done.unwrap();
        }
        scheduler.stop().await;

        assert!(!torn.load(Ordering::SeqCst));
        assert!(world.with_world(|w| w.after).await > 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn a_slow_world_does_not_hold_up_a_fast_one() {
        let scheduler = Arc::new(TickScheduler::new(config(10, 100)));
        let slow = counter(Duration::from_millis(250));
        let fast = counter(Duration::ZERO);
        scheduler.register(slow.clone());
        scheduler.register(fast.clone());
        scheduler.start().await;
        tokio::time::sleep(Duration::from_millis(600)).await;
        scheduler.stop().await;

        let slow_steps = slow.with_world(|w| w.after).await;
        let fast_steps = fast.with_world(|w| w.after).await;
        assert!(slow_steps <= 4, "slow world stepped {slow_steps} times");
        assert!(fast_steps > 20, "fast world stepped only {fast_steps} times");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn worlds_join_and_leave_a_running_scheduler() {
        let scheduler = Arc::new(TickScheduler::new(config(5, 100)));
        let staying = counter(Duration::ZERO);
        let leaving = counter(Duration::ZERO);
        scheduler.register(staying.clone());
        scheduler.start().await;

        scheduler.register(leaving.clone());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(leaving.with_world(|w| w.after).await > 0);

        assert!(scheduler.unregister(leaving.key()).await);
        let left_at = leaving.with_world(|w| w.after).await;
        let staying_at = staying.with_world(|w| w.after).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        scheduler.stop().await;

        assert_eq!(leaving.with_world(|w| w.after).await, left_at);
        assert!(staying.with_world(|w| w.after).await > staying_at);
    }

    #[test]
    fn a_world_behind_the_clock_still_gets_its_computer_turn() {
        let scheduler: TickScheduler<Counter> = TickScheduler::new(config(200, 3));
        assert!(scheduler.computer_turn_due(2, 3));
        assert!(scheduler.computer_turn_due(1, 4));
        assert!(scheduler.computer_turn_due(2, 7));
        assert!(!scheduler.computer_turn_due(3, 5));
        assert!(!scheduler.computer_turn_due(0, 2));

        let disabled: TickScheduler<Counter> = TickScheduler::new(config(200, 0));
        assert!(!disabled.computer_turn_due(0, 9));
    }

    struct Recorder {
        sent: mpsc::UnboundedSender<(WorldKey, u64)>,
    }

    impl TickObserver<Counter> for Recorder {
        fn capture(&self, world: WorldKey, state: &Counter) -> Option<DeferredWork> {
            let sent = self.sent.clone();
            let value = state.after;
            Some(Box::new(move || {
                let _ = sent.send((world, value));
            }))
        }
    }

    #[tokio::test]
    async fn observers_capture_after_each_step() {
        let scheduler = Arc::new(TickScheduler::new(config(200, 100)));
        let world = counter(Duration::ZERO);
        scheduler.register(world.clone());
        let (sent, mut received) = mpsc::unbounded_channel();
        scheduler.add_observer(Arc::new(Recorder { sent }));

        scheduler.tick_once().await;
        scheduler.tick_once().await;
        assert_eq!(received.recv().await, Some((world.key(), 1)));
        assert_eq!(received.recv().await, Some((world.key(), 2)));
    }

    #[test]
    fn stats_flag_new_maximum_and_threshold() {
        let mut stats = TickStats::default();
        let threshold = Duration::from_millis(150);
        let timing = |ms| WorldTiming {
            world: WorldKey::new(),
            step: Duration::from_millis(ms),
            total: Duration::from_millis(ms),
            computer_players: false,
            faulted: false,
        };

        let first = stats.record(&timing(10), threshold).unwrap();
        assert!(first.new_maximum && !first.over_threshold);
        assert!(stats.record(&timing(5), threshold).is_none());

        let slow = stats.record(&timing(200), threshold).unwrap();
        assert!(slow.new_maximum && slow.over_threshold);
        assert_eq!(stats.max_total, Duration::from_millis(200));
        assert_eq!(stats.over_threshold, 1);

        let table = stats.table(&timing(200), threshold);
        assert!(table.contains("| threshold"));
        assert!(table.contains("150ms"));
    }
}
