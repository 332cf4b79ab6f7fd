//! Live access to running Settlers games.
//!
//! This crate sits between the simulation engine and the request handlers.
//! It owns the locking discipline for worlds, the background driver that
//! advances them, the stable ids external clients address objects by, and
//! the per-player views pushed to monitors.
//!
//! # Modules
//!
//! - [`config`] -- Typed configuration loaded from `settlers-config.yaml`.
//! - [`feed`] -- [`ChangeFeed`]: push subscriptions per (world, player).
//! - [`placeholder`] -- [`GamePlaceholder`]: games before they start.
//! - [`projector`] -- [`ViewProjector`] snapshots, [`delta`] and [`apply`].
//! - [`reaper`] -- [`IdReaper`]: releases ids of entities the engine removed.
//! - [`registry`] -- [`IdentityRegistry`]: stable ids for live objects.
//! - [`render`] -- Engine objects as wire views.
//! - [`simulation`] -- The [`Simulation`] seam the scheduler drives.
//! - [`tick`] -- [`TickScheduler`] and its timing statistics.
//! - [`world`] -- [`WorldHandle`]: the per-world lock.

pub mod config;
pub mod feed;
pub mod placeholder;
pub mod projector;
pub mod reaper;
pub mod registry;
pub mod render;
pub mod simulation;
pub mod tick;
pub mod world;

// Re-export primary types at crate root.
pub use config::{ConfigError, SettlersConfig, TickerConfig};
pub use feed::{ChangeFeed, ChangeSink, SinkError};
pub use placeholder::{GamePlaceholder, StartError};
pub use projector::{ViewProjector, apply, delta};
pub use reaper::IdReaper;
pub use registry::{EntityKind, IdentityRegistry, ObjectRef, RegistryError};
pub use render::Renderer;
pub use simulation::{Simulation, SimulationFault};
pub use tick::{DeferredWork, TickObserver, TickReport, TickScheduler, TickStats};
pub use world::WorldHandle;
