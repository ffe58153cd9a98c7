//! # Grid Hunt Game Server
//!
//! Authoritative server for a two-player, turn-based pursuit game on a
//! 16x12 grid. The first player to connect hunts, the second is hunted,
//! and they move one cell at a time, alternately.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    GRID HUNT SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Primitives                                │
//! │  ├── grid.rs     - Cell positions, directions, clamping      │
//! │  └── rng.rs      - Seeded Xorshift128+ for layouts           │
//! │                                                              │
//! │  game/           - Game logic (no I/O)                       │
//! │  ├── object.rs   - Tagged game objects and roles             │
//! │  ├── board.rs    - Cell grid and BFS distance fields         │
//! │  └── state.rs    - Turn-based session state machine          │
//! │                                                              │
//! │  network/        - Networking                                │
//! │  ├── protocol.rs - {type, content} JSON envelopes            │
//! │  ├── session.rs  - Shared session + connection registry      │
//! │  └── server.rs   - WebSocket accept loop and connections     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency
//!
//! There is exactly one game at a time. The game and the set of live
//! connections sit behind a single lock, and every state change is
//! broadcast before that lock is released, so both clients always see
//! the same sequence of READY / MOVE / ERROR messages.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::grid::{GridPos, Direction, BOARD_WIDTH, BOARD_HEIGHT};
pub use core::rng::DeterministicRng;
pub use game::object::{GameObject, ObjectKind, Role};
pub use game::board::{Board, DistanceField};
pub use game::state::{GameSession, SessionConfig, SessionError, PlayerId};
pub use network::protocol::{Envelope, MessageType, Content, ClientRequest, ProtocolError};
pub use network::server::{GameServer, ServerConfig, GameServerError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default listening port
pub const DEFAULT_PORT: u16 = 8001;
