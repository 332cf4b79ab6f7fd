//! Map coordinates.
//!
//! The map is a triangle grid stored in doubled-width coordinates: a point
//! `(x, y)` is valid only when `x + y` is even. Every point has six
//! neighbours: `(x ± 2, y)` and `(x ± 1, y ± 1)`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

/// A point on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Point {
    /// Horizontal coordinate.
    #[serde(deserialize_with = "lenient_coordinate")]
    pub x: i32,
    /// Vertical coordinate.
    #[serde(deserialize_with = "lenient_coordinate")]
    pub y: i32,
}

impl Point {
    /// Create a point.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Whether the coordinates address a grid point (`x + y` even).
    pub const fn is_grid_point(self) -> bool {
        (self.x.wrapping_add(self.y)) & 1 == 0
    }

    /// The six neighbouring points.
    pub const fn neighbors(self) -> [Self; 6] {
        let Self { x, y } = self;
        [
            Self::new(x.saturating_sub(2), y),
            Self::new(x.saturating_add(2), y),
            Self::new(x.saturating_sub(1), y.saturating_sub(1)),
            Self::new(x.saturating_add(1), y.saturating_sub(1)),
            Self::new(x.saturating_sub(1), y.saturating_add(1)),
            Self::new(x.saturating_add(1), y.saturating_add(1)),
        ]
    }

    /// Whether `other` is one of the six neighbours.
    pub fn is_adjacent(self, other: Self) -> bool {
        self.neighbors().contains(&other)
    }

    /// The point directly down-right, where a building's flag sits.
    pub const fn down_right(self) -> Self {
        Self::new(self.x.saturating_add(1), self.y.saturating_sub(1))
    }

    /// The point directly up-left, the building spot of a flag.
    pub const fn up_left(self) -> Self {
        Self::new(self.x.saturating_sub(1), self.y.saturating_add(1))
    }

    /// Number of steps between two grid points.
    pub fn distance(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        if dx <= dy {
            dy
        } else {
            dy.saturating_add(dx.saturating_sub(dy) / 2)
        }
    }

    /// All grid points within `radius` steps, including this one.
    pub fn within(self, radius: u32) -> Vec<Self> {
        let r = i32::try_from(radius).unwrap_or(i32::MAX / 4);
        let mut points = Vec::new();
        for dy in -r..=r {
            for dx in (-2 * r)..=(2 * r) {
                let candidate = Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy));
                if candidate.is_grid_point() && self.distance(candidate) <= radius {
                    points.push(candidate);
                }
            }
        }
        points
    }

    /// The `"x,y"` key used by the available-construction map.
    pub fn key(self) -> String {
        format!("{},{}", self.x, self.y)
    }
}

impl core::fmt::Display for Point {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Accept coordinates sent as numbers or as numeric strings.
fn lenient_coordinate<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    struct CoordinateVisitor;

    impl Visitor<'_> for CoordinateVisitor {
        type Value = i32;

        fn expecting(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            f.write_str("an integer coordinate")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i32, E> {
            i32::try_from(v).map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i32, E> {
            i32::try_from(v).map_err(E::custom)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<i32, E> {
            v.trim().parse().map_err(E::custom)
        }
    }

    deserializer.deserialize_any(CoordinateVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbors_are_at_distance_one() {
        let p = Point::new(10, 10);
        for n in p.neighbors() {
            assert!(n.is_grid_point());
            assert_eq!(p.distance(n), 1);
        }
    }

    #[test]
    fn distance_along_a_row_counts_double_steps() {
        assert_eq!(Point::new(2, 2).distance(Point::new(8, 2)), 3);
        assert_eq!(Point::new(2, 2).distance(Point::new(5, 5)), 3);
        assert_eq!(Point::new(2, 2).distance(Point::new(2, 6)), 4);
    }

    #[test]
    fn within_radius_one_is_seven_points() {
        let area = Point::new(10, 10).within(1);
        assert_eq!(area.len(), 7);
        assert!(area.contains(&Point::new(10, 10)));
    }

    #[test]
    fn flag_sits_down_right_of_house() {
        let house = Point::new(6, 6);
        assert_eq!(house.down_right(), Point::new(7, 5));
        assert_eq!(house.down_right().up_left(), house);
    }

    #[test]
    fn coordinates_parse_from_strings() {
        let p: Result<Point, _> = serde_json::from_str(r#"{"x": "4", "y": 6}"#);
        assert_eq!(p.ok(), Some(Point::new(4, 6)));
    }
}
