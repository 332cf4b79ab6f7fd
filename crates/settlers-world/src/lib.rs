//! The simulation engine of the Settlers game server.
//!
//! A [`GameMap`] is one running game: terrain, players, buildings, flags,
//! roads, nature and walkers, advanced one unit of time per
//! [`GameMap::step`]. The engine is single-threaded and knows nothing about
//! locking or external ids; callers serialize access to a map themselves.
//!
//! # Modules
//!
//! - [`building`] -- Building kinds, the [`BuildingFactory`] lookup table
//!   and placed [`Building`]s.
//! - [`computer`] -- Build-order driven computer players.
//! - [`entities`] -- Flags, roads, trees, stones, signs, crops and walkers.
//! - [`error`] -- [`WorldError`], returned by every refused action.
//! - [`game_map`] -- The map: queries, placement eligibility, placement and
//!   removal, building commands.
//! - [`military`] -- Owned land, occupation, attacks and captures.
//! - [`player`] -- Players, their land and message inbox.
//! - [`statistics`] -- Land and production statistics.
//! - [`step`] -- The simulation step.
//! - [`template`] -- Built-in map templates.
//! - [`terrain`] -- Vegetation triangles and buildability.

pub mod building;
pub mod computer;
pub mod entities;
pub mod error;
pub mod game_map;
pub mod military;
pub mod player;
pub mod statistics;
pub mod step;
pub mod template;
pub mod terrain;

// Re-export primary types at crate root.
pub use building::{BUILDING_SPECS, Building, BuildingFactory, BuildingSpec, MilitarySpec};
pub use computer::BUILD_ORDER;
pub use entities::{Crop, Flag, Road, Sign, Stone, Task, Tree, Walker};
pub use error::WorldError;
pub use game_map::{GameMap, STARTING_SCOUTS};
pub use player::{Message, Player};
pub use statistics::{Statistics, TRACKED_MATERIALS};
pub use step::LOOKOUT_REVEAL_PERIOD;
pub use template::{MapTemplate, TerrainPatch, builtin_maps};
pub use terrain::{Terrain, Tile};
