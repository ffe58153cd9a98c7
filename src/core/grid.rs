//! Grid Coordinates
//!
//! Integer cell positions and the four movement directions.
//! The board is 0-indexed with row 0 at the top, so `Up` decreases `y`.

use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};

/// Board width in cells.
pub const BOARD_WIDTH: i32 = 16;

/// Board height in cells.
pub const BOARD_HEIGHT: i32 = 12;

/// Total number of cells on the board.
pub const CELL_COUNT: usize = (BOARD_WIDTH * BOARD_HEIGHT) as usize;

/// A cell position on the board.
///
/// Encoded on the wire as a two-element `[x, y]` array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct GridPos {
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
}

impl GridPos {
    /// Provisional position of a player that has joined but not been placed.
    pub const UNPLACED: Self = Self { x: -1, y: -1 };

    /// Create a new position.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Check whether the position lies on the board.
    #[inline]
    pub fn in_bounds(self) -> bool {
        (0..BOARD_WIDTH).contains(&self.x) && (0..BOARD_HEIGHT).contains(&self.y)
    }

    /// Truncate each coordinate to the nearest in-bounds value.
    #[inline]
    pub fn clamped(self) -> Self {
        Self {
            x: self.x.clamp(0, BOARD_WIDTH - 1),
            y: self.y.clamp(0, BOARD_HEIGHT - 1),
        }
    }

    /// Position one step in `direction`, without bounds handling.
    #[inline]
    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Row-major index into a board-sized buffer.
    #[inline]
    pub fn index(self) -> Option<usize> {
        if self.in_bounds() {
            Some((self.y * BOARD_WIDTH + self.x) as usize)
        } else {
            None
        }
    }

    /// Inverse of [`GridPos::index`].
    #[inline]
    pub fn from_index(index: usize) -> Self {
        let index = index as i32;
        Self {
            x: index % BOARD_WIDTH,
            y: index / BOARD_WIDTH,
        }
    }

    /// In-bounds 4-directional neighbours.
    pub fn neighbors(self) -> impl Iterator<Item = GridPos> {
        Direction::ALL
            .into_iter()
            .map(move |dir| self.step(dir))
            .filter(|pos| pos.in_bounds())
    }

    /// Manhattan distance to another position.
    #[inline]
    pub fn manhattan(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl From<[i32; 2]> for GridPos {
    fn from([x, y]: [i32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<GridPos> for [i32; 2] {
    fn from(pos: GridPos) -> Self {
        [pos.x, pos.y]
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// =============================================================================
// DIRECTION
// =============================================================================

/// A single-cell movement direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Towards row 0
    Up,
    /// Away from row 0
    Down,
    /// Towards column 0
    Left,
    /// Away from column 0
    Right,
}

impl Direction {
    /// All four directions.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Unit delta `(dx, dy)` for this direction.
    #[inline]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// Wire name of this direction.
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
            Direction::Left => "LEFT",
            Direction::Right => "RIGHT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A direction name that is not one of `UP`, `DOWN`, `LEFT`, `RIGHT`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a direction (expected UP, DOWN, LEFT or RIGHT)")]
pub struct ParseDirectionError(pub String);

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UP" => Ok(Direction::Up),
            "DOWN" => Ok(Direction::Down),
            "LEFT" => Ok(Direction::Left),
            "RIGHT" => Ok(Direction::Right),
            other => Err(ParseDirectionError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_deltas_are_unit() {
        for dir in Direction::ALL {
            let (dx, dy) = dir.delta();
            assert_eq!(dx.abs() + dy.abs(), 1, "{dir} must move exactly one cell");
        }
        assert_eq!(GridPos::new(5, 5).step(Direction::Up), GridPos::new(5, 4));
        assert_eq!(GridPos::new(5, 5).step(Direction::Right), GridPos::new(6, 5));
    }

    #[test]
    fn test_direction_parse() {
        for dir in Direction::ALL {
            assert_eq!(dir.as_str().parse::<Direction>(), Ok(dir));
        }
        assert!("SIDEWAYS".parse::<Direction>().is_err());
        assert!("up".parse::<Direction>().is_err());
    }

    #[test]
    fn test_clamp_truncates_to_edges() {
        assert_eq!(GridPos::new(16, 3).clamped(), GridPos::new(15, 3));
        assert_eq!(GridPos::new(-1, -4).clamped(), GridPos::new(0, 0));
        assert_eq!(GridPos::new(7, 12).clamped(), GridPos::new(7, 11));
        assert_eq!(GridPos::new(7, 6).clamped(), GridPos::new(7, 6));
    }

    #[test]
    fn test_index_roundtrip() {
        for i in 0..CELL_COUNT {
            let pos = GridPos::from_index(i);
            assert!(pos.in_bounds());
            assert_eq!(pos.index(), Some(i));
        }
        assert_eq!(GridPos::UNPLACED.index(), None);
    }

    #[test]
    fn test_corner_has_two_neighbors() {
        assert_eq!(GridPos::new(0, 0).neighbors().count(), 2);
        assert_eq!(GridPos::new(15, 0).neighbors().count(), 2);
        assert_eq!(GridPos::new(4, 0).neighbors().count(), 3);
        assert_eq!(GridPos::new(4, 4).neighbors().count(), 4);
    }

    #[test]
    fn test_grid_pos_wire_format() {
        let json = serde_json::to_string(&GridPos::new(3, 11)).unwrap();
        assert_eq!(json, "[3,11]");
        let parsed: GridPos = serde_json::from_str("[15,0]").unwrap();
        assert_eq!(parsed, GridPos::new(15, 0));
    }
}
