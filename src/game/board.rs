//! Board Geometry
//!
//! The static 16x12 cell grid and the breadth-first distance field
//! used to check how far a player can travel.

use std::collections::VecDeque;
use serde::{Serialize, Deserialize};

use crate::core::grid::{GridPos, CELL_COUNT};
use crate::game::object::GameObject;

/// Distance value for cells the search never reached.
pub const UNREACHABLE: u32 = u32::MAX;

/// What occupies a board cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    /// Open ground
    #[default]
    Empty,
    /// Impassable for the distance field
    Blocking,
    /// Scenery that can be walked over
    Decorative,
}

/// Immutable grid of cell kinds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    cells: Vec<CellKind>,
}

impl Default for Board {
    fn default() -> Self {
        Self::empty()
    }
}

impl Board {
    /// A board with every cell empty.
    pub fn empty() -> Self {
        Self {
            cells: vec![CellKind::Empty; CELL_COUNT],
        }
    }

    /// Build a board by asking `f` for the kind of every cell.
    pub fn from_fn(mut f: impl FnMut(GridPos) -> CellKind) -> Self {
        Self {
            cells: (0..CELL_COUNT).map(|i| f(GridPos::from_index(i))).collect(),
        }
    }

    /// Build a board from the static objects placed on it.
    ///
    /// Objects outside the board are ignored.
    pub fn from_objects<'a>(objects: impl IntoIterator<Item = &'a GameObject>) -> Self {
        let mut cells = vec![CellKind::Empty; CELL_COUNT];
        for object in objects {
            if let Some(idx) = object.pos.index() {
                cells[idx] = object.kind.cell_kind();
            }
        }
        Self { cells }
    }

    /// Kind of the cell at `pos`, `None` when off the board.
    #[inline]
    pub fn cell(&self, pos: GridPos) -> Option<CellKind> {
        pos.index().map(|idx| self.cells[idx])
    }

    /// Whether `pos` is on the board and blocks movement.
    #[inline]
    pub fn is_blocking(&self, pos: GridPos) -> bool {
        self.cell(pos) == Some(CellKind::Blocking)
    }

    /// Number of cells of the given kind.
    pub fn count(&self, kind: CellKind) -> usize {
        self.cells.iter().filter(|c| **c == kind).count()
    }

    /// Shortest 4-directional path length from `source` to every cell.
    ///
    /// Blocking cells are never entered. Each cell is finalized when it
    /// is first enqueued and never enqueued again, so the search visits
    /// every cell at most once and stops when the queue runs dry.
    pub fn calc_distances(&self, source: GridPos) -> DistanceField {
        let mut distances = vec![UNREACHABLE; CELL_COUNT];

        let Some(start) = source.index() else {
            return DistanceField { origin: source, distances };
        };

        let mut finalized = vec![false; CELL_COUNT];
        let mut queue = VecDeque::with_capacity(CELL_COUNT);

        distances[start] = 0;
        finalized[start] = true;
        queue.push_back(source);

        while let Some(current) = queue.pop_front() {
            let Some(current_idx) = current.index() else {
                continue;
            };
            let next_distance = distances[current_idx] + 1;

            for neighbor in current.neighbors() {
                let Some(idx) = neighbor.index() else {
                    continue;
                };
                if finalized[idx] || self.cells[idx] == CellKind::Blocking {
                    continue;
                }
                finalized[idx] = true;
                distances[idx] = next_distance;
                queue.push_back(neighbor);
            }
        }

        DistanceField { origin: source, distances }
    }

    /// Whether `to` can be reached from `from` within `movement_points` steps.
    ///
    /// Always computes a fresh field; callers that want caching keep a
    /// [`DistanceField`] and use [`DistanceField::is_within`].
    pub fn is_valid(&self, from: GridPos, to: GridPos, movement_points: u32) -> bool {
        self.calc_distances(from).is_within(to, movement_points)
    }
}

// =============================================================================
// DISTANCE FIELD
// =============================================================================

/// Per-cell shortest path lengths from one origin cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DistanceField {
    origin: GridPos,
    distances: Vec<u32>,
}

impl DistanceField {
    /// Cell the field was computed from.
    #[inline]
    pub fn origin(&self) -> GridPos {
        self.origin
    }

    /// Raw distance at `pos`, [`UNREACHABLE`] when unreached or off the board.
    #[inline]
    pub fn raw(&self, pos: GridPos) -> u32 {
        pos.index().map_or(UNREACHABLE, |idx| self.distances[idx])
    }

    /// Distance at `pos`, if reachable.
    #[inline]
    pub fn get(&self, pos: GridPos) -> Option<u32> {
        match self.raw(pos) {
            UNREACHABLE => None,
            d => Some(d),
        }
    }

    /// Whether `to` is reachable in at most `movement_points` steps.
    #[inline]
    pub fn is_within(&self, to: GridPos, movement_points: u32) -> bool {
        self.get(to).is_some_and(|d| d <= movement_points)
    }

    /// Number of reachable cells, origin included.
    pub fn reachable_count(&self) -> usize {
        self.distances.iter().filter(|d| **d != UNREACHABLE).count()
    }
}
