//! Terrain: vegetation triangles and heights.
//!
//! Each grid point owns two triangles: the one straight below it, with
//! corners `p`, `(x - 1, y - 1)` and `(x + 1, y - 1)`, and the one below to
//! the right, with corners `p`, `(x + 1, y - 1)` and `(x + 2, y)`. Six
//! triangles meet at every point; what may be built there depends on all
//! six.

use std::collections::HashMap;

use settlers_types::{Point, TerrainView, Vegetation};

/// Vegetation and height at one grid point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tile {
    /// Triangle straight below the point.
    pub below: Vegetation,
    /// Triangle below and to the right of the point.
    pub down_right: Vegetation,
    /// Height of the point.
    pub height: u8,
}

/// The terrain of one map.
#[derive(Debug, Clone)]
pub struct Terrain {
    width: u32,
    height: u32,
    tiles: HashMap<Point, Tile>,
}

impl Terrain {
    /// Flat grassland of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tiles: HashMap::new(),
        }
    }

    /// Map width in points.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Map height in points.
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Whether the point is a grid point strictly inside the map edge.
    pub fn contains(&self, point: Point) -> bool {
        let w = i64::from(self.width);
        let h = i64::from(self.height);
        let x = i64::from(point.x);
        let y = i64::from(point.y);
        point.is_grid_point() && x >= 1 && y >= 1 && x < w.saturating_sub(1) && y < h.saturating_sub(1)
    }

    /// Tile at a point; off-map points read as flat grass.
    pub fn tile(&self, point: Point) -> Tile {
        self.tiles.get(&point).copied().unwrap_or(Tile {
            height: 2,
            ..Tile::default()
        })
    }

    /// Overwrite the tile at a point.
    pub fn set_tile(&mut self, point: Point, tile: Tile) {
        self.tiles.insert(point, tile);
    }

    /// Paint both triangles of every point within `radius` of `center`.
    pub fn paint(&mut self, center: Point, radius: u32, vegetation: Vegetation) {
        let height = match vegetation {
            Vegetation::Mountain | Vegetation::Snow => 8,
            Vegetation::MountainMeadow => 4,
            Vegetation::Water | Vegetation::DeepWater => 0,
            _ => 2,
        };
        for point in center.within(radius) {
            self.tiles.insert(
                point,
                Tile {
                    below: vegetation,
                    down_right: vegetation,
                    height,
                },
            );
        }
    }

    /// The six triangles meeting at a point.
    pub fn triangles_around(&self, point: Point) -> [Vegetation; 6] {
        let Point { x, y } = point;
        let left = Point::new(x.saturating_sub(2), y);
        let up_left = Point::new(x.saturating_sub(1), y.saturating_add(1));
        let up_right = Point::new(x.saturating_add(1), y.saturating_add(1));
        [
            self.tile(point).below,
            self.tile(point).down_right,
            self.tile(left).down_right,
            self.tile(up_left).below,
            self.tile(up_left).down_right,
            self.tile(up_right).below,
        ]
    }

    /// Houses and flags may stand here.
    pub fn is_buildable(&self, point: Point) -> bool {
        self.triangles_around(point)
            .iter()
            .all(|v| v.is_buildable())
    }

    /// A mine may be dug here.
    pub fn is_mineable(&self, point: Point) -> bool {
        self.triangles_around(point)
            .iter()
            .all(|v| v.is_mineable())
    }

    /// Some triangle touching the point is mountain.
    pub fn touches_mountain(&self, point: Point) -> bool {
        self.triangles_around(point)
            .iter()
            .any(|v| v.is_mineable())
    }

    /// Walkers may step on the point.
    pub fn is_walkable(&self, point: Point) -> bool {
        self.contains(point)
            && self
                .triangles_around(point)
                .iter()
                .any(|v| v.is_walkable())
    }

    /// A flag may stand here: walkable and not surrounded by mountain only.
    pub fn allows_flag(&self, point: Point) -> bool {
        self.contains(point)
            && self
                .triangles_around(point)
                .iter()
                .all(|v| v.is_walkable())
    }

    /// Wire form, row by row.
    pub fn to_view(&self) -> TerrainView {
        let mut straight_below = Vec::new();
        let mut below_to_the_right = Vec::new();
        let mut heights = Vec::new();
        let width = i64::from(self.width);
        let mut start = 1_i32;
        let mut y = 1_i32;
        while i64::from(y) < i64::from(self.height) {
            let mut x = start;
            while i64::from(x).saturating_add(1) < width {
                let tile = self.tile(Point::new(x, y));
                straight_below.push(tile.below);
                below_to_the_right.push(tile.down_right);
                heights.push(tile.height);
                x = x.saturating_add(2);
            }
            start = if start == 1 { 2 } else { 1 };
            y = y.saturating_add(1);
        }
        TerrainView {
            width: self.width,
            height: self.height,
            straight_below,
            below_to_the_right,
            heights,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grass_is_buildable_and_walkable() {
        let terrain = Terrain::new(20, 20);
        let p = Point::new(6, 6);
        assert!(terrain.is_buildable(p));
        assert!(terrain.is_walkable(p));
        assert!(!terrain.is_mineable(p));
    }

    #[test]
    fn painted_mountain_allows_mines_only() {
        let mut terrain = Terrain::new(30, 30);
        terrain.paint(Point::new(10, 10), 3, Vegetation::Mountain);
        assert!(terrain.is_mineable(Point::new(10, 10)));
        assert!(!terrain.is_buildable(Point::new(10, 10)));
        assert!(terrain.touches_mountain(Point::new(10, 10)));
    }

    #[test]
    fn edge_points_are_off_the_map() {
        let terrain = Terrain::new(10, 10);
        assert!(!terrain.contains(Point::new(0, 0)));
        assert!(!terrain.contains(Point::new(3, 4)));
        assert!(terrain.contains(Point::new(4, 4)));
        assert!(!terrain.contains(Point::new(9, 9)));
    }

    #[test]
    fn view_rows_alternate_start_column() {
        let terrain = Terrain::new(6, 4);
        let view = terrain.to_view();
        // y = 1: x = 1, 3; y = 2: x = 2, 4; y = 3: x = 1, 3
        assert_eq!(view.heights.len(), 6);
        assert_eq!(view.straight_below.len(), view.below_to_the_right.len());
    }
}
