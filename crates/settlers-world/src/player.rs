//! Players: land, fog of war and the message inbox.

use std::collections::BTreeSet;

use settlers_types::{EntityKey, Material, PlayerKey, PlayerType, Point};

/// A game event posted to a player.
///
/// Messages refer to buildings by engine key; the boundary turns them into
/// wire messages with external ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// A military building was finished.
    MilitaryBuildingReady(EntityKey),
    /// A military building got its first soldier.
    MilitaryBuildingOccupied(EntityKey),
    /// A producer found nothing left to work on.
    NoMoreResources(EntityKey),
    /// One of the player's buildings is attacked.
    UnderAttack(EntityKey),
    /// A geologist found a deposit.
    GeologistFind {
        /// Sign position.
        point: Point,
        /// Deposit material.
        material: Material,
    },
    /// A building was captured by an enemy.
    BuildingLost(EntityKey),
    /// An enemy building was captured.
    BuildingCaptured(EntityKey),
    /// A storehouse was finished.
    StoreHouseIsReady(EntityKey),
    /// An enemy military building took some of the player's land.
    MilitaryBuildingCausedLostLand(EntityKey),
}

impl Message {
    /// The building the message is about, if any.
    pub const fn building(&self) -> Option<EntityKey> {
        match *self {
            Self::MilitaryBuildingReady(key)
            | Self::MilitaryBuildingOccupied(key)
            | Self::NoMoreResources(key)
            | Self::UnderAttack(key)
            | Self::BuildingLost(key)
            | Self::BuildingCaptured(key)
            | Self::StoreHouseIsReady(key)
            | Self::MilitaryBuildingCausedLostLand(key) => Some(key),
            Self::GeologistFind { .. } => None,
        }
    }
}

/// A player of one world.
#[derive(Debug, Clone)]
pub struct Player {
    /// Engine key, kept from the placeholder.
    pub key: PlayerKey,
    /// Display name.
    pub name: String,
    /// `#rrggbb` color.
    pub color: String,
    /// Human or computer.
    pub kind: PlayerType,
    /// Points the player has seen. Never shrinks.
    pub discovered: BTreeSet<Point>,
    /// Points the player owns.
    pub land: BTreeSet<Point>,
    /// Inbox, oldest first.
    pub messages: Vec<Message>,
}

impl Player {
    /// A player without land.
    pub fn new(key: PlayerKey, name: impl Into<String>, color: impl Into<String>, kind: PlayerType) -> Self {
        Self {
            key,
            name: name.into(),
            color: color.into(),
            kind,
            discovered: BTreeSet::new(),
            land: BTreeSet::new(),
            messages: Vec::new(),
        }
    }

    /// Whether the player is driven by the computer.
    pub const fn is_computer(&self) -> bool {
        matches!(self.kind, PlayerType::ComputerPlayer)
    }

    /// Owned points with at least one neighbour outside the owned land.
    pub fn border(&self) -> BTreeSet<Point> {
        self.land
            .iter()
            .filter(|p| p.neighbors().iter().any(|n| !self.land.contains(n)))
            .copied()
            .collect()
    }

    /// Add points to the discovered land; returns how many were new.
    pub fn discover(&mut self, points: impl IntoIterator<Item = Point>) -> usize {
        let before = self.discovered.len();
        self.discovered.extend(points);
        self.discovered.len().saturating_sub(before)
    }

    /// Whether the player has seen the point.
    pub fn has_discovered(&self, point: Point) -> bool {
        self.discovered.contains(&point)
    }

    /// Whether the player owns the point.
    pub fn owns(&self, point: Point) -> bool {
        self.land.contains(&point)
    }

    /// Append a message.
    pub fn post(&mut self, message: Message) {
        self.messages.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn border_is_the_rim_of_owned_land() {
        let mut player = Player::new(PlayerKey::new(), "Anna", "#00FF00", PlayerType::HumanPlayer);
        player.land = Point::new(10, 10).within(2).into_iter().collect();
        let border = player.border();
        assert!(!border.contains(&Point::new(10, 10)));
        assert!(border.contains(&Point::new(14, 10)));
        assert!(border.iter().all(|p| Point::new(10, 10).distance(*p) == 2));
    }

    #[test]
    fn discovered_land_only_grows() {
        let mut player = Player::new(PlayerKey::new(), "Bo", "#0000FF", PlayerType::ComputerPlayer);
        assert_eq!(player.discover([Point::new(2, 2), Point::new(4, 2)]), 2);
        assert_eq!(player.discover([Point::new(2, 2)]), 0);
        assert!(player.has_discovered(Point::new(4, 2)));
        assert!(player.is_computer());
    }
}
