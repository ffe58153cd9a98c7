//! Game Objects
//!
//! Every entity on the board is a [`GameObject`] tagged with an
//! [`ObjectKind`]. Whether an object can move, and how far a single
//! step takes it, is decided by its kind.

use std::fmt;
use std::ops::Range;
use serde::{Serialize, Deserialize};

use crate::core::grid::{Direction, GridPos, BOARD_WIDTH};
use crate::game::board::CellKind;

/// Kind of a game object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// The pursuing player
    Hunter,
    /// The pursued player
    Prey,
    /// Rock: blocks the distance field
    ObstacleA,
    /// Tree: decorative, does not block
    ObstacleB,
}

impl ObjectKind {
    /// Whether objects of this kind can change position.
    #[inline]
    pub const fn is_movable(self) -> bool {
        matches!(self, ObjectKind::Hunter | ObjectKind::Prey)
    }

    /// Cells moved per step, `None` for static kinds.
    #[inline]
    pub const fn stride(self) -> Option<i32> {
        match self {
            ObjectKind::Hunter | ObjectKind::Prey => Some(1),
            ObjectKind::ObstacleA | ObjectKind::ObstacleB => None,
        }
    }

    /// Board cell an object of this kind occupies.
    #[inline]
    pub const fn cell_kind(self) -> CellKind {
        match self {
            ObjectKind::ObstacleA => CellKind::Blocking,
            ObjectKind::ObstacleB => CellKind::Decorative,
            ObjectKind::Hunter | ObjectKind::Prey => CellKind::Empty,
        }
    }

    /// Player role for movable kinds.
    #[inline]
    pub const fn role(self) -> Option<Role> {
        match self {
            ObjectKind::Hunter => Some(Role::Hunter),
            ObjectKind::Prey => Some(Role::Prey),
            _ => None,
        }
    }
}

// =============================================================================
// ROLE
// =============================================================================

/// Player role, fixed by join order.
///
/// Serialized as `"hunter"` / `"prey"`, which are also the keys of
/// position payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// First player to join
    Hunter,
    /// Second player to join
    Prey,
}

impl Role {
    /// Role for the given roster slot (0 = first joiner).
    pub const fn for_slot(slot: usize) -> Option<Role> {
        match slot {
            0 => Some(Role::Hunter),
            1 => Some(Role::Prey),
            _ => None,
        }
    }

    /// Object kind representing this role on the board.
    pub const fn kind(self) -> ObjectKind {
        match self {
            Role::Hunter => ObjectKind::Hunter,
            Role::Prey => ObjectKind::Prey,
        }
    }

    /// Columns this role may start in.
    ///
    /// Hunter starts in the left quarter, prey in the right quarter.
    pub const fn start_columns(self) -> Range<i32> {
        match self {
            Role::Hunter => 0..BOARD_WIDTH / 4,
            Role::Prey => 3 * BOARD_WIDTH / 4..BOARD_WIDTH,
        }
    }

    /// Wire name of this role.
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Hunter => "hunter",
            Role::Prey => "prey",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// GAME OBJECT
// =============================================================================

/// An entity on the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameObject {
    /// Identifier, unique within a session
    pub id: u32,
    /// What this object is
    pub kind: ObjectKind,
    /// Current cell
    pub pos: GridPos,
}

impl GameObject {
    /// Create a new object.
    pub const fn new(id: u32, kind: ObjectKind, pos: GridPos) -> Self {
        Self { id, kind, pos }
    }

    /// Cell this object would occupy after one step in `direction`.
    ///
    /// Off-board results are truncated to the nearest edge cell.
    /// Returns `None` for static objects.
    pub fn destination(&self, direction: Direction) -> Option<GridPos> {
        let stride = self.kind.stride()?;
        let (dx, dy) = direction.delta();
        let target = GridPos::new(self.pos.x + dx * stride, self.pos.y + dy * stride);
        Some(target.clamped())
    }
}
