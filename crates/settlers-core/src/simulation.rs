//! The seam between the scheduler and a simulated world.

use std::panic::{AssertUnwindSafe, catch_unwind};

use settlers_world::{GameMap, WorldError};

/// A fault raised while advancing a world.
#[derive(Debug, thiserror::Error)]
pub enum SimulationFault {
    /// The engine refused an action taken on behalf of a computer player.
    #[error("engine error: {0}")]
    World(#[from] WorldError),

    /// The engine panicked.
    #[error("panicked: {0}")]
    Panicked(String),
}

/// Something the scheduler can advance.
///
/// Implemented by [`GameMap`]; tests drive the scheduler with synthetic
/// worlds.
pub trait Simulation: Send + 'static {
    /// Advance one unit of simulated time.
    fn step(&mut self) -> Result<(), SimulationFault>;

    /// Let every computer player take a turn.
    fn run_computer_players(&mut self) -> Result<(), SimulationFault>;
}

impl Simulation for GameMap {
    fn step(&mut self) -> Result<(), SimulationFault> {
        Self::step(self);
        Ok(())
    }

    fn run_computer_players(&mut self) -> Result<(), SimulationFault> {
        Self::run_computer_players(self).map_err(SimulationFault::from)
    }
}

/// Run a simulation call, turning a panic into a [`SimulationFault`].
pub(crate) fn guarded<W: Simulation>(
    world: &mut W,
    call: impl FnOnce(&mut W) -> Result<(), SimulationFault>,
) -> Result<(), SimulationFault> {
    catch_unwind(AssertUnwindSafe(|| call(world))).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_owned());
        Err(SimulationFault::Panicked(reason))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Exploding;

    impl Simulation for Exploding {
        #[allow(clippy::panic)]
        fn step(&mut self) -> Result<(), SimulationFault> {
            panic!("boom");
        }

        fn run_computer_players(&mut self) -> Result<(), SimulationFault> {
            Ok(())
        }
    }

    #[test]
    fn panics_become_faults() {
        let mut world = Exploding;
        let result = guarded(&mut world, Simulation::step);
        assert!(matches!(result, Err(SimulationFault::Panicked(ref r)) if r == "boom"));
    }

    #[test]
    fn clean_calls_pass_through() {
        let mut world = Exploding;
        assert!(guarded(&mut world, Simulation::run_computer_players).is_ok());
    }
}
