//! Computer players.
//!
//! A computer player follows a fixed build order. Each turn it waits until
//! its last building is finished, then places the next one on the free spot
//! closest to its headquarter and connects it by road.

use settlers_types::{PlayerKey, Point, Size};
use tracing::debug;

use crate::building::BUILDING_SPECS;
use crate::error::WorldError;
use crate::game_map::GameMap;

/// Buildings a computer player puts up, in order, repeating.
pub const BUILD_ORDER: [&str; 8] = [
    "Woodcutter",
    "Quarry",
    "ForesterHut",
    "Sawmill",
    "Barracks",
    "Well",
    "GuardHouse",
    "Farm",
];

impl GameMap {
    /// Let every computer player take its turn. Errors of one player do not
    /// stop the others; the first one is returned.
    pub fn run_computer_players(&mut self) -> Result<(), WorldError> {
        let computers: Vec<PlayerKey> = self
            .players
            .iter()
            .filter(|p| p.is_computer())
            .map(|p| p.key)
            .collect();
        let mut first_error = None;
        for player in computers {
            if let Err(e) = self.computer_turn(player) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// One turn of a computer player.
    pub fn computer_turn(&mut self, player: PlayerKey) -> Result<(), WorldError> {
        let Some(hq) = self.headquarter_of(player) else {
            return Ok(());
        };
        let home = hq.position;
        let hq_flag = hq.flag_point();
        let owned: Vec<_> = self
            .buildings()
            .filter(|b| b.owner == player && !b.spec.is_headquarter())
            .collect();
        if owned.iter().any(|b| b.state == settlers_types::BuildingState::Unfinished) {
            return Ok(());
        }
        let next = BUILD_ORDER
            .get(owned.len().checked_rem(BUILD_ORDER.len()).unwrap_or(0))
            .copied()
            .unwrap_or("Woodcutter");
        let size = BUILDING_SPECS
            .iter()
            .find(|s| s.name == next)
            .map_or(Size::Small, |s| s.size);

        let spot = self
            .available_house_points(player)
            .into_iter()
            .filter(|(p, s)| *s >= size && p.distance(home) >= 3)
            .min_by_key(|(p, _)| (p.distance(home), *p))
            .map(|(p, _)| p);
        let Some(spot) = spot else {
            debug!(player = %player, kind = next, "No room for the next building");
            return Ok(());
        };

        let key = self.place_building(player, next, spot)?;
        let flag = spot.down_right();
        if self.connect(player, flag, hq_flag).is_err() {
            self.tear_down(player, key)?;
            return Ok(());
        }
        debug!(player = %player, kind = next, point = %spot, "Computer player placed building");
        Ok(())
    }

    /// Connect a flag to the headquarter flag, or to the closest connected
    /// flag when no direct road fits.
    fn connect(&mut self, player: PlayerKey, flag: Point, hq_flag: Point) -> Result<(), WorldError> {
        if self.place_auto_selected_road(player, flag, hq_flag).is_ok() {
            return Ok(());
        }
        let network = self.road_network(player);
        let mut targets: Vec<Point> = network.keys().copied().filter(|p| *p != flag).collect();
        targets.sort_by_key(|p| (p.distance(flag), *p));
        for target in targets {
            if self.place_auto_selected_road(player, flag, target).is_ok() {
                return Ok(());
            }
        }
        Err(WorldError::NoRoadPossible {
            from: flag,
            to: hq_flag,
        })
    }
}
