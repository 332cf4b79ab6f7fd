//! Map entities other than buildings: flags, roads, nature and walkers.

use std::collections::VecDeque;

use settlers_types::{
    CropState, EntityKey, Material, PlayerKey, Point, Rank, SignAmount, SignType, WorkerType,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Percentage of a segment a walker covers per step.
pub const WALK_SPEED: u32 = 25;

/// Steps a geologist sign stays up.
pub const SIGN_LIFETIME: u64 = 300;

/// Steps between two growth stages of a crop.
pub const CROP_STAGE_STEPS: u32 = 60;

/// Most cargo a flag can hold.
pub const FLAG_CAPACITY: usize = 8;

// ---------------------------------------------------------------------------
// Flags and roads
// ---------------------------------------------------------------------------

/// A flag: road junction and cargo drop point.
#[derive(Debug, Clone)]
pub struct Flag {
    /// Engine key.
    pub key: EntityKey,
    /// Owning player.
    pub owner: PlayerKey,
    /// Position.
    pub position: Point,
    /// Cargo waiting for a courier, oldest first.
    pub cargo: Vec<Material>,
}

impl Flag {
    /// A flag without cargo.
    pub fn new(owner: PlayerKey, position: Point) -> Self {
        Self {
            key: EntityKey::new(),
            owner,
            position,
            cargo: Vec::new(),
        }
    }
}

/// A road between two flags.
#[derive(Debug, Clone)]
pub struct Road {
    /// Engine key.
    pub key: EntityKey,
    /// Owning player.
    pub owner: PlayerKey,
    /// Waypoints, flag to flag, each adjacent to the next.
    pub points: Vec<Point>,
    /// Courier assigned to the road.
    pub courier: Option<EntityKey>,
}

impl Road {
    /// A road without courier.
    pub fn new(owner: PlayerKey, points: Vec<Point>) -> Self {
        Self {
            key: EntityKey::new(),
            owner,
            points,
            courier: None,
        }
    }

    /// First waypoint.
    pub fn start(&self) -> Option<Point> {
        self.points.first().copied()
    }

    /// Last waypoint.
    pub fn end(&self) -> Option<Point> {
        self.points.last().copied()
    }

    /// Whether the road ends at the point.
    pub fn has_endpoint(&self, point: Point) -> bool {
        self.start() == Some(point) || self.end() == Some(point)
    }

    /// Waypoints strictly between the flags.
    pub fn inner_points(&self) -> &[Point] {
        match self.points.len() {
            0..=2 => &[],
            n => self.points.get(1..n.saturating_sub(1)).unwrap_or(&[]),
        }
    }

    /// The endpoint opposite to `point`.
    pub fn other_end(&self, point: Point) -> Option<Point> {
        if self.start() == Some(point) {
            self.end()
        } else if self.end() == Some(point) {
            self.start()
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Nature
// ---------------------------------------------------------------------------

/// A tree.
#[derive(Debug, Clone, Copy)]
pub struct Tree {
    /// Engine key.
    pub key: EntityKey,
    /// Position.
    pub position: Point,
}

/// A pile of stone.
#[derive(Debug, Clone, Copy)]
pub struct Stone {
    /// Engine key.
    pub key: EntityKey,
    /// Position.
    pub position: Point,
    /// Units left.
    pub amount: u32,
}

/// A geologist's sign.
#[derive(Debug, Clone, Copy)]
pub struct Sign {
    /// Engine key.
    pub key: EntityKey,
    /// Position.
    pub position: Point,
    /// What was found; `None` for nothing.
    pub kind: Option<SignType>,
    /// How much was found.
    pub amount: Option<SignAmount>,
    /// Step at which the sign disappears.
    pub expires_at: u64,
}

/// A farm field.
#[derive(Debug, Clone, Copy)]
pub struct Crop {
    /// Engine key.
    pub key: EntityKey,
    /// Position.
    pub position: Point,
    /// Growth state.
    pub state: CropState,
    /// Steps spent in the current state.
    pub age: u32,
}

impl Crop {
    /// Advance growth by one step. Returns true when the state changed.
    pub fn grow(&mut self) -> bool {
        self.age = self.age.saturating_add(1);
        if self.age < CROP_STAGE_STEPS {
            return false;
        }
        let next = match self.state {
            CropState::JustPlanted => CropState::SmallCrop,
            CropState::SmallCrop => CropState::AlmostGrown,
            CropState::AlmostGrown => CropState::FullGrown,
            CropState::FullGrown | CropState::Harvested => return false,
        };
        self.state = next;
        self.age = 0;
        true
    }
}

// ---------------------------------------------------------------------------
// Walkers
// ---------------------------------------------------------------------------

/// What a walker is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Nothing; waits where it stands.
    Idle,
    /// Carries cargo along a road.
    Courier {
        /// The road.
        road: EntityKey,
    },
    /// Walks out from a flag, discovering land, then returns home.
    Explore {
        /// Points left to visit before heading home.
        remaining: u32,
    },
    /// Investigates points around a flag, putting up signs.
    Prospect {
        /// Points left to investigate.
        remaining: u32,
    },
    /// Walks to an enemy building to fight for it.
    Attack {
        /// The target.
        building: EntityKey,
    },
    /// Walks back to the headquarter and disappears into it.
    ReturnHome,
    /// A wild animal roaming.
    Wander,
}

/// A worker, soldier or wild animal.
#[derive(Debug, Clone)]
pub struct Walker {
    /// Engine key.
    pub key: EntityKey,
    /// Kind.
    pub kind: WorkerType,
    /// Owning player; wild animals have none.
    pub owner: Option<PlayerKey>,
    /// Point last stood on.
    pub position: Point,
    /// Points still to walk, next first.
    pub path: VecDeque<Point>,
    /// Point left before the current one.
    pub previous: Option<Point>,
    /// Percentage of the segment to the next point covered.
    pub progress: u32,
    /// Carried material.
    pub cargo: Option<Material>,
    /// Inside a building, hidden from views.
    pub inside: bool,
    /// Current task.
    pub task: Task,
    /// Rank, for soldiers.
    pub rank: Rank,
}

impl Walker {
    /// A walker standing at a point.
    pub fn new(kind: WorkerType, owner: Option<PlayerKey>, position: Point, task: Task) -> Self {
        Self {
            key: EntityKey::new(),
            kind,
            owner,
            position,
            path: VecDeque::new(),
            previous: None,
            progress: 0,
            cargo: None,
            inside: false,
            task,
            rank: Rank::Private,
        }
    }

    /// The point being walked to.
    pub fn next(&self) -> Option<Point> {
        self.path.front().copied()
    }

    /// Whether the walker is on its way somewhere.
    pub fn is_walking(&self) -> bool {
        !self.path.is_empty()
    }

    /// Set a new path, replacing the current one.
    pub fn walk(&mut self, path: impl IntoIterator<Item = Point>) {
        self.path = path.into_iter().filter(|p| *p != self.position).collect();
        self.progress = 0;
    }

    /// Advance along the path. Returns true when a point was reached.
    pub fn advance(&mut self) -> bool {
        let Some(next) = self.next() else {
            return false;
        };
        self.progress = self.progress.saturating_add(WALK_SPEED);
        if self.progress < 100 {
            return false;
        }
        self.previous = Some(self.position);
        self.position = next;
        self.path.pop_front();
        self.progress = 0;
        true
    }

    /// Whether the walker stopped at the end of its path.
    pub fn has_arrived(&self) -> bool {
        self.path.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walker_reaches_next_point_after_four_steps() {
        let mut walker = Walker::new(WorkerType::Scout, None, Point::new(4, 4), Task::Idle);
        walker.walk([Point::new(4, 4), Point::new(6, 4), Point::new(8, 4)]);
        assert_eq!(walker.next(), Some(Point::new(6, 4)));
        assert!(!walker.advance());
        assert!(!walker.advance());
        assert!(!walker.advance());
        assert!(walker.advance());
        assert_eq!(walker.position, Point::new(6, 4));
        assert_eq!(walker.previous, Some(Point::new(4, 4)));
        assert!(walker.is_walking());
    }

    #[test]
    fn road_ends_and_inner_points() {
        let road = Road::new(
            PlayerKey::new(),
            vec![Point::new(4, 4), Point::new(6, 4), Point::new(8, 4)],
        );
        assert_eq!(road.inner_points(), &[Point::new(6, 4)]);
        assert_eq!(road.other_end(Point::new(4, 4)), Some(Point::new(8, 4)));
        assert_eq!(road.other_end(Point::new(6, 4)), None);
        assert!(road.has_endpoint(Point::new(8, 4)));
    }

    #[test]
    fn crops_grow_up_to_full_grown() {
        let mut crop = Crop {
            key: EntityKey::new(),
            position: Point::new(4, 4),
            state: CropState::JustPlanted,
            age: 0,
        };
        let changes = (0..CROP_STAGE_STEPS * 5).filter(|_| crop.grow()).count();
        assert_eq!(changes, 3);
        assert_eq!(crop.state, CropState::FullGrown);
    }
}
