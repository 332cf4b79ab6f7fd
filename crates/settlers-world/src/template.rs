//! Map templates: the built-in catalog a game is started from.
//!
//! A template is immutable. Starting a game builds a fresh [`Terrain`] and
//! places the template's trees and stones on a new [`GameMap`].
//!
//! [`GameMap`]: crate::GameMap

use settlers_types::{MapKey, Point, Vegetation};

use crate::terrain::Terrain;

/// A patch of vegetation painted onto the base grassland.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrainPatch {
    /// Patch center.
    pub center: Point,
    /// Patch radius in steps.
    pub radius: u32,
    /// Vegetation of both triangles of every point in the patch.
    pub vegetation: Vegetation,
}

/// A playable map.
#[derive(Debug, Clone)]
pub struct MapTemplate {
    /// Process-unique key.
    pub key: MapKey,
    /// Display title.
    pub title: String,
    /// Map author.
    pub author: String,
    /// Width in points.
    pub width: u32,
    /// Height in points.
    pub height: u32,
    /// Headquarter positions, one per player slot.
    pub starting_points: Vec<Point>,
    /// Vegetation patches, painted in order.
    pub patches: Vec<TerrainPatch>,
    /// Tree positions.
    pub trees: Vec<Point>,
    /// Stone piles and their size.
    pub stones: Vec<(Point, u32)>,
    /// Wild animal spawn points.
    pub animals: Vec<Point>,
}

impl MapTemplate {
    /// An empty grassland template, the starting point of every catalog
    /// entry.
    pub fn blank(title: &str, width: u32, height: u32, starting_points: Vec<Point>) -> Self {
        Self {
            key: MapKey::new(),
            title: title.to_owned(),
            author: String::from("Settlers Team"),
            width,
            height,
            starting_points,
            patches: Vec::new(),
            trees: Vec::new(),
            stones: Vec::new(),
            animals: Vec::new(),
        }
    }

    /// Number of player slots.
    pub fn max_players(&self) -> usize {
        self.starting_points.len()
    }

    /// Build the terrain described by the patches.
    pub fn terrain(&self) -> Terrain {
        let mut terrain = Terrain::new(self.width, self.height);
        for patch in &self.patches {
            terrain.paint(patch.center, patch.radius, patch.vegetation);
        }
        terrain
    }
}

/// Scatter a small grove of trees around a center.
fn grove(center: Point) -> Vec<Point> {
    center
        .within(2)
        .into_iter()
        .filter(|p| p.y != center.y || p.x == center.x)
        .collect()
}

/// "Green Islands": two players on a grass plain split by a lake.
fn green_islands() -> MapTemplate {
    let mut map = MapTemplate::blank(
        "Green Islands",
        60,
        50,
        vec![Point::new(12, 12), Point::new(46, 36)],
    );
    map.patches = vec![
        TerrainPatch {
            center: Point::new(30, 24),
            radius: 5,
            vegetation: Vegetation::Water,
        },
        TerrainPatch {
            center: Point::new(14, 34),
            radius: 4,
            vegetation: Vegetation::Mountain,
        },
        TerrainPatch {
            center: Point::new(44, 14),
            radius: 4,
            vegetation: Vegetation::Mountain,
        },
        TerrainPatch {
            center: Point::new(50, 46),
            radius: 2,
            vegetation: Vegetation::Savannah,
        },
    ];
    map.trees = [grove(Point::new(20, 16)), grove(Point::new(38, 32))].concat();
    map.stones = vec![
        (Point::new(8, 18), 7),
        (Point::new(18, 8), 7),
        (Point::new(52, 30), 7),
        (Point::new(40, 40), 7),
    ];
    map.animals = vec![Point::new(24, 40), Point::new(36, 10)];
    map
}

/// "Four Corners": four players around a central mountain range.
fn four_corners() -> MapTemplate {
    let mut map = MapTemplate::blank(
        "Four Corners",
        80,
        80,
        vec![
            Point::new(14, 14),
            Point::new(64, 14),
            Point::new(14, 64),
            Point::new(64, 64),
        ],
    );
    map.patches = vec![
        TerrainPatch {
            center: Point::new(40, 40),
            radius: 7,
            vegetation: Vegetation::Mountain,
        },
        TerrainPatch {
            center: Point::new(40, 40),
            radius: 2,
            vegetation: Vegetation::Snow,
        },
        TerrainPatch {
            center: Point::new(40, 14),
            radius: 3,
            vegetation: Vegetation::Water,
        },
        TerrainPatch {
            center: Point::new(40, 66),
            radius: 3,
            vegetation: Vegetation::Swamp,
        },
    ];
    map.trees = [
        grove(Point::new(22, 20)),
        grove(Point::new(56, 20)),
        grove(Point::new(22, 58)),
        grove(Point::new(56, 58)),
    ]
    .concat();
    map.stones = vec![
        (Point::new(8, 22), 7),
        (Point::new(70, 22), 7),
        (Point::new(8, 56), 7),
        (Point::new(70, 56), 7),
    ];
    map.animals = vec![Point::new(40, 26), Point::new(26, 40), Point::new(54, 40)];
    map
}

/// The maps shipped with the server.
pub fn builtin_maps() -> Vec<MapTemplate> {
    vec![green_islands(), four_corners()]
}
