//! Game Logic Module
//!
//! Everything that decides what happens on the board. No I/O.
//!
//! ## Module Structure
//!
//! - `object`: Tagged game objects, object kinds and player roles
//! - `board`: Cell grid and breadth-first distance fields
//! - `state`: The turn-based game session

pub mod object;
pub mod board;
pub mod state;

// Re-export key types
pub use object::{GameObject, ObjectKind, Role};
pub use board::{Board, CellKind, DistanceField, UNREACHABLE};
pub use state::{
    GameSession, SessionConfig, SessionError, SessionPhase, SessionSnapshot,
    LeaveOutcome, PlayerId, PlayerState, Positions, QUORUM,
};
