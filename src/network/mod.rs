//! Network Layer
//!
//! WebSocket server for the two players. All game rules live in `game/`;
//! this layer only decodes frames, serializes access and fans out results.

pub mod protocol;
pub mod session;
pub mod server;

pub use protocol::{ClientRequest, Content, Envelope, MessageType, ProtocolError};
pub use session::{Flow, Outbound, SessionManager, OPPONENT_LEFT};
pub use server::{GameServer, ServerConfig, GameServerError, GAME_FULL};
