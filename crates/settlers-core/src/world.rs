//! Exclusive, scoped access to one world.
//!
//! A [`WorldHandle`] owns the only path to a world's state: a fair
//! (first-in first-out) async mutex reached through
//! [`with_world`](WorldHandle::with_world). The simulation driver and every
//! request queue on the same lock, so a tick never interleaves with a read
//! and a steady stream of readers cannot starve the ticker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use settlers_types::WorldKey;
use settlers_world::GameMap;
use tokio::sync::Mutex;
use tokio::task::JoinError;

/// Shared handle to one world. Cloning is cheap; all clones guard the same
/// world.
#[derive(Debug)]
pub struct WorldHandle<W = GameMap> {
    key: WorldKey,
    inner: Arc<Shared<W>>,
}

#[derive(Debug)]
struct Shared<W> {
    world: Arc<Mutex<W>>,
    retired: AtomicBool,
}

impl<W> Clone for WorldHandle<W> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl WorldHandle<GameMap> {
    /// Wrap a freshly started game map.
    pub fn new(world: GameMap) -> Self {
        let key = world.key();
        Self::with_key(key, world)
    }
}

impl<W> WorldHandle<W> {
    /// Wrap any world under an explicit key.
    pub fn with_key(key: WorldKey, world: W) -> Self {
        Self {
            key,
            inner: Arc::new(Shared {
                world: Arc::new(Mutex::new(world)),
                retired: AtomicBool::new(false),
            }),
        }
    }

    /// Key of the guarded world.
    pub const fn key(&self) -> WorldKey {
        self.key
    }

    /// Run a closure with exclusive access to the world and return its
    /// result as-is.
    ///
    /// The closure is synchronous, so the lock is never held across an
    /// await point and is released on every exit path, unwinding included.
    pub async fn with_world<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        let mut guard = self.inner.world.lock().await;
        f(&mut guard)
    }

    /// Like [`with_world`](Self::with_world), but the closure runs on the
    /// blocking thread pool while the lock is held, so a long step does not
    /// occupy an async worker thread.
    ///
    /// # Errors
    ///
    /// Returns the [`JoinError`] of a closure that panicked. The lock is
    /// released either way.
    pub async fn with_world_blocking<R>(
        &self,
        f: impl FnOnce(&mut W) -> R + Send + 'static,
    ) -> Result<R, JoinError>
    where
        W: Send + 'static,
        R: Send + 'static,
    {
        let mut guard = Arc::clone(&self.inner.world).lock_owned().await;
        tokio::task::spawn_blocking(move || f(&mut *guard)).await
    }

    /// Mark the world as removed from the scheduler. Ticks that acquire the
    /// lock afterwards leave the world alone.
    pub(crate) fn retire(&self) {
        self.inner.retired.store(true, Ordering::SeqCst);
    }

    /// Whether the world was taken out of the scheduler. Callers holding
    /// the lock can rely on the answer: retiring happens before the
    /// scheduler waits for the lock.
    pub fn is_retired(&self) -> bool {
        self.inner.retired.load(Ordering::SeqCst)
    }

    /// Whether both handles guard the same world.
    pub fn same_world(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn with_world_returns_closure_result() {
        let handle = WorldHandle::with_key(WorldKey::new(), vec![1_u32, 2, 3]);
        let sum: u32 = handle.with_world(|w| w.iter().sum()).await;
        assert_eq!(sum, 6);

        let popped = handle.with_world(Vec::pop).await;
        assert_eq!(popped, Some(3));
        assert_eq!(handle.with_world(|w| w.len()).await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn access_is_exclusive() {
        let handle = WorldHandle::with_key(WorldKey::new(), (0_u64, 0_u64));
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let handle = handle.clone();
            tasks.spawn(async move {
                for _ in 0..100 {
                    handle
                        .with_world(|pair| {
                            pair.0 = pair.0.saturating_add(1);
                            std::thread::sleep(Duration::from_micros(5));
                            pair.1 = pair.1.saturating_add(1);
                            assert_eq!(pair.0, pair.1);
                        })
                        .await;
                }
            });
        }
        while let Some(result) = tasks.join_next().await {
            assert!(result.is_ok());
        }
        assert_eq!(handle.with_world(|pair| *pair).await, (1600, 1600));
    }

    #[tokio::test]
    async fn blocking_access_returns_the_result_and_releases_the_lock() {
        let handle = WorldHandle::with_key(WorldKey::new(), 1_u32);
        let doubled = handle
            .with_world_blocking(|w| {
                *w = w.saturating_mul(2);
                *w
            })
            .await
            .unwrap();
        assert_eq!(doubled, 2);
        assert_eq!(handle.with_world(|w| *w).await, 2);
    }

    #[tokio::test]
    async fn clones_share_the_world() {
        let a = WorldHandle::with_key(WorldKey::new(), 0_u8);
        let b = a.clone();
        assert!(a.same_world(&b));
        b.with_world(|w| *w = 7).await;
        assert_eq!(a.with_world(|w| *w).await, 7);
    }
}
