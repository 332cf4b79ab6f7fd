//! Land and production statistics.
//!
//! Land is sampled every [`LAND_SAMPLE_PERIOD`] steps. Production is
//! cumulative: every time a tracked material is produced a new sample with
//! the running totals of all players is appended.

use std::collections::BTreeMap;

use settlers_types::{Material, Measurement, PlayerKey};

/// Steps between two land samples.
pub const LAND_SAMPLE_PERIOD: u64 = 50;

/// Materials whose production is tracked.
pub const TRACKED_MATERIALS: [Material; 6] = [
    Material::Wood,
    Material::Stone,
    Material::Plank,
    Material::Gold,
    Material::Sword,
    Material::Shield,
];

/// Statistics of one world, one series value per player.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    players: Vec<PlayerKey>,
    land: Vec<Measurement>,
    production: BTreeMap<Material, Vec<Measurement>>,
    totals: BTreeMap<Material, Vec<u32>>,
}

impl Statistics {
    /// Empty statistics for the given players, in series order.
    pub fn new(players: Vec<PlayerKey>) -> Self {
        let totals = TRACKED_MATERIALS
            .iter()
            .map(|m| (*m, vec![0; players.len()]))
            .collect();
        Self {
            players,
            land: Vec::new(),
            production: BTreeMap::new(),
            totals,
        }
    }

    /// Players in series order.
    pub fn players(&self) -> &[PlayerKey] {
        &self.players
    }

    /// Append a land sample; `land_of` gives the owned points per player.
    pub fn sample_land(&mut self, time: u64, land_of: impl Fn(PlayerKey) -> usize) {
        let values = self
            .players
            .iter()
            .map(|p| u32::try_from(land_of(*p)).unwrap_or(u32::MAX))
            .collect();
        self.land.push(Measurement { time, values });
    }

    /// Count one unit of a material produced by a player.
    pub fn record_production(&mut self, time: u64, player: PlayerKey, material: Material) {
        let Some(index) = self.players.iter().position(|p| *p == player) else {
            return;
        };
        let Some(totals) = self.totals.get_mut(&material) else {
            return;
        };
        if let Some(total) = totals.get_mut(index) {
            *total = total.saturating_add(1);
        }
        let values = totals.clone();
        self.production
            .entry(material)
            .or_default()
            .push(Measurement { time, values });
    }

    /// Land samples, oldest first.
    pub fn land(&self) -> &[Measurement] {
        &self.land
    }

    /// Production samples of a tracked material, oldest first.
    pub fn production(&self, material: Material) -> &[Measurement] {
        self.production.get(&material).map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_samples_are_cumulative() {
        let a = PlayerKey::new();
        let b = PlayerKey::new();
        let mut stats = Statistics::new(vec![a, b]);
        stats.record_production(5, a, Material::Wood);
        stats.record_production(9, b, Material::Wood);
        stats.record_production(12, a, Material::Wood);
        let samples = stats.production(Material::Wood);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples.last().map(|s| s.values.clone()), Some(vec![2, 1]));
        assert!(stats.production(Material::Gold).is_empty());
    }

    #[test]
    fn untracked_material_is_ignored() {
        let a = PlayerKey::new();
        let mut stats = Statistics::new(vec![a]);
        stats.record_production(1, a, Material::Beer);
        assert!(stats.production(Material::Beer).is_empty());
    }

    #[test]
    fn land_samples_follow_player_order() {
        let a = PlayerKey::new();
        let b = PlayerKey::new();
        let mut stats = Statistics::new(vec![a, b]);
        stats.sample_land(50, |p| if p == a { 10 } else { 20 });
        assert_eq!(stats.land().first().map(|s| s.values.clone()), Some(vec![10, 20]));
    }
}
