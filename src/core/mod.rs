//! Core primitives.
//!
//! Board coordinates, directions and the seeded layout RNG. Nothing in
//! here knows about players or connections.

pub mod grid;
pub mod rng;

// Re-export core types
pub use grid::{GridPos, Direction, ParseDirectionError, BOARD_WIDTH, BOARD_HEIGHT, CELL_COUNT};
pub use rng::{DeterministicRng, derive_layout_seed};
