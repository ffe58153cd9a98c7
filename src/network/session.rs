//! Session Management
//!
//! Owns the single shared game and the registry of live connections.
//! Every state change and the broadcast that follows it happen inside
//! one critical section, so turn checks and quorum detection cannot
//! interleave between connections.

use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, Mutex};
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{info, warn, debug};

use crate::core::rng::derive_layout_seed;
use crate::game::object::Role;
use crate::game::state::{
    GameSession, LeaveOutcome, PlayerId, SessionConfig, SessionError, SessionSnapshot, QUORUM,
};
use crate::network::protocol::{ClientRequest, Envelope, ProtocolError};

/// Notice sent to a player whose opponent disconnected.
pub const OPPONENT_LEFT: &str = "opponent left the game; waiting for a new opponent";

/// Frame queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// JSON envelope, sent as a text frame.
    Envelope(Envelope),
    /// Liveness probe, sent as a ping frame.
    Probe,
    /// Close the socket.
    Close {
        /// Close code
        code: CloseCode,
        /// Close reason
        reason: String,
    },
}

/// What the connection task should do after a frame was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading.
    Continue,
    /// Client asked to leave.
    Quit,
}

/// Registered connection.
struct ConnectedClient {
    player_id: PlayerId,
    sender: mpsc::Sender<Outbound>,
}

/// State guarded by the session lock.
struct Shared {
    game: GameSession,
    clients: Vec<ConnectedClient>,
}

impl Shared {
    /// Queue an envelope for every registered connection.
    ///
    /// Never waits: a full or closed queue only loses its own copy.
    fn broadcast(&self, envelope: &Envelope) -> usize {
        let mut delivered = 0;
        for client in &self.clients {
            match client.sender.try_send(Outbound::Envelope(envelope.clone())) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("Outbound queue full for {}, dropping {}", client.player_id.short(), envelope.kind);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Connection {} already closed, skipping {}", client.player_id.short(), envelope.kind);
                }
            }
        }
        delivered
    }

    /// Start the game if the roster just filled up.
    fn start_if_ready(&mut self) {
        if self.game.initialize() {
            let positions = self.game.positions();
            info!("Quorum reached, game started: {:?}", positions);
            self.broadcast(&Envelope::ready(positions));
        }
    }
}

// =============================================================================
// SESSION MANAGER
// =============================================================================

/// Owner of the shared game and its connections.
pub struct SessionManager {
    shared: Mutex<Shared>,
}

impl SessionManager {
    /// Create a manager around a fresh session.
    pub fn new(config: SessionConfig, seed: u64) -> Self {
        Self {
            shared: Mutex::new(Shared {
                game: GameSession::new(config, seed),
                clients: Vec::with_capacity(QUORUM),
            }),
        }
    }

    /// Create a manager with a seed unique to this instance.
    pub fn with_fresh_seed(config: SessionConfig) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let seed = derive_layout_seed(uuid::Uuid::new_v4().as_bytes(), nanos);
        Self::new(config, seed)
    }

    /// Join the game and register the connection's outbound queue.
    ///
    /// Connections left over from a reset game are re-joined first, in
    /// registration order, so they keep priority over the newcomer. The
    /// second join starts the game and broadcasts READY before the lock
    /// is released. A refused connection is not registered.
    pub async fn connect(
        &self,
        player_id: PlayerId,
        sender: mpsc::Sender<Outbound>,
    ) -> Result<Role, SessionError> {
        let mut guard = self.shared.lock().await;
        let shared = &mut *guard;

        if shared.clients.len() >= QUORUM {
            return Err(SessionError::Capacity);
        }
        if shared.clients.iter().any(|c| c.player_id == player_id) {
            return Err(SessionError::AlreadyJoined);
        }

        for client in &shared.clients {
            if shared.game.role_of(client.player_id).is_some() {
                continue;
            }
            match shared.game.join(client.player_id) {
                Ok(role) => info!("Player {} re-queued as {}", client.player_id.short(), role),
                Err(e) => warn!("Could not re-queue {}: {}", client.player_id.short(), e),
            }
        }

        let role = shared.game.join(player_id)?;
        shared.clients.push(ConnectedClient { player_id, sender });
        info!("Player {} joined as {}", player_id.short(), role);

        shared.start_if_ready();
        Ok(role)
    }

    /// Handle one inbound text frame from `player_id`.
    ///
    /// Successful moves broadcast MOVE; any failure broadcasts ERROR
    /// and leaves the game untouched.
    pub async fn handle_text(&self, player_id: PlayerId, text: &str) -> Flow {
        let request = ClientRequest::parse(text);
        let mut guard = self.shared.lock().await;
        let shared = &mut *guard;

        let result = match request {
            Ok(ClientRequest::Quit) => {
                debug!("Player {} quit", player_id.short());
                return Flow::Quit;
            }
            Ok(ClientRequest::Move(direction)) => shared
                .game
                .move_player(player_id, direction)
                .map(|positions| {
                    debug!("Player {} moved {}: {:?}", player_id.short(), direction, positions);
                    Envelope::moved(positions)
                })
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(envelope) => {
                shared.broadcast(&envelope);
            }
            Err(text) => {
                debug!("Rejected frame from {}: {}", player_id.short(), text);
                shared.broadcast(&Envelope::error(text));
            }
        }
        Flow::Continue
    }

    /// Report a frame that never reached the decoder (e.g. binary).
    pub async fn report_protocol_error(&self, player_id: PlayerId, error: ProtocolError) {
        debug!("Protocol error from {}: {}", player_id.short(), error);
        let shared = self.shared.lock().await;
        shared.broadcast(&Envelope::error(error.to_string()));
    }

    /// Unregister a connection and reset the game it was part of.
    ///
    /// The roster is left empty. Remaining connections stay registered,
    /// are told that they are waiting for a new opponent, and rejoin when
    /// the next connection arrives.
    pub async fn disconnect(&self, player_id: PlayerId) -> LeaveOutcome {
        let mut guard = self.shared.lock().await;
        let shared = &mut *guard;

        shared.clients.retain(|c| c.player_id != player_id);
        let outcome = shared.game.leave(player_id);

        if let LeaveOutcome::Reset { was_active } = outcome {
            info!(
                "Player {} left, session reset (game was {})",
                player_id.short(),
                if was_active { "active" } else { "waiting" }
            );
            if !shared.clients.is_empty() {
                shared.broadcast(&Envelope::error(OPPONENT_LEFT));
            }
        }

        outcome
    }

    /// Whether the game is still short of players.
    pub async fn awaiting_opponent(&self) -> bool {
        self.shared.lock().await.game.player_count() < QUORUM
    }

    /// Copy of the game's observable state.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.shared.lock().await.game.snapshot()
    }

    /// Number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.shared.lock().await.clients.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::with_fresh_seed(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::SessionPhase;
    use crate::network::protocol::{Content, MessageType};

    const HUNTER: PlayerId = PlayerId::new([1; 16]);
    const PREY: PlayerId = PlayerId::new([2; 16]);

    fn next_envelope(rx: &mut mpsc::Receiver<Outbound>) -> Envelope {
        match rx.try_recv() {
            Ok(Outbound::Envelope(envelope)) => envelope,
            other => panic!("expected an envelope, got {other:?}"),
        }
    }

    fn error_text(envelope: &Envelope) -> &str {
        assert_eq!(envelope.kind, MessageType::Error);
        match &envelope.content {
            Content::Text(text) => text,
            other => panic!("expected text content, got {other:?}"),
        }
    }

    async fn started() -> (SessionManager, mpsc::Receiver<Outbound>, mpsc::Receiver<Outbound>) {
        let manager = SessionManager::new(SessionConfig::default(), 42);
        let (tx1, mut rx1) = mpsc::channel(10);
        let (tx2, mut rx2) = mpsc::channel(10);

        assert_eq!(manager.connect(HUNTER, tx1).await, Ok(Role::Hunter));
        assert!(rx1.try_recv().is_err(), "nothing is sent before quorum");
        assert_eq!(manager.connect(PREY, tx2).await, Ok(Role::Prey));

        let ready1 = next_envelope(&mut rx1);
        let ready2 = next_envelope(&mut rx2);
        assert_eq!(ready1.kind, MessageType::Ready);
        assert_eq!(ready1, ready2);

        (manager, rx1, rx2)
    }

    #[tokio::test]
    async fn test_second_connect_broadcasts_ready() {
        let (manager, _rx1, _rx2) = started().await;
        let snapshot = manager.snapshot().await;

        assert_eq!(snapshot.phase, SessionPhase::Active);
        assert_eq!(snapshot.turn, 0);
        assert_eq!(manager.connection_count().await, 2);
        assert!(!manager.awaiting_opponent().await);
    }

    #[tokio::test]
    async fn test_third_connect_is_refused() {
        let (manager, _rx1, _rx2) = started().await;
        let before = manager.snapshot().await;

        let (tx3, mut rx3) = mpsc::channel(10);
        let third = PlayerId::new([3; 16]);
        assert_eq!(manager.connect(third, tx3).await, Err(SessionError::Capacity));

        assert_eq!(manager.connection_count().await, 2);
        assert_eq!(manager.snapshot().await, before);
        assert!(rx3.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_move_broadcasts_positions() {
        let (manager, mut rx1, mut rx2) = started().await;

        let flow = manager.handle_text(HUNTER, r#"{"type": 3, "content": "RIGHT"}"#).await;
        assert_eq!(flow, Flow::Continue);

        let moved = next_envelope(&mut rx1);
        assert_eq!(moved.kind, MessageType::Move);
        assert_eq!(moved, next_envelope(&mut rx2));
        assert_eq!(manager.snapshot().await.turn, 1);
    }

    #[tokio::test]
    async fn test_out_of_turn_move_broadcasts_error() {
        let (manager, mut rx1, mut rx2) = started().await;

        manager.handle_text(HUNTER, r#"{"type": 3, "content": "RIGHT"}"#).await;
        next_envelope(&mut rx1);
        next_envelope(&mut rx2);

        manager.handle_text(HUNTER, r#"{"type": 3, "content": "RIGHT"}"#).await;
        assert!(error_text(&next_envelope(&mut rx1)).contains("not your turn"));
        assert!(error_text(&next_envelope(&mut rx2)).contains("not your turn"));
        assert_eq!(manager.snapshot().await.turn, 1);
    }

    #[tokio::test]
    async fn test_malformed_frame_changes_nothing() {
        let (manager, mut rx1, mut rx2) = started().await;
        let before = manager.snapshot().await;

        for frame in ["{not json", r#"{"type": 3}"#, r#"{"type": 3, "content": "SIDEWAYS"}"#] {
            assert_eq!(manager.handle_text(HUNTER, frame).await, Flow::Continue);
            error_text(&next_envelope(&mut rx1));
            error_text(&next_envelope(&mut rx2));
        }
        assert_eq!(manager.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_binary_frame_reported() {
        let (manager, mut rx1, _rx2) = started().await;
        manager.report_protocol_error(PREY, ProtocolError::BinaryFrame).await;
        assert!(error_text(&next_envelope(&mut rx1)).contains("binary"));
    }

    #[tokio::test]
    async fn test_quit_ends_connection() {
        let (manager, mut rx1, _rx2) = started().await;
        let flow = manager.handle_text(PREY, r#"{"type": 4, "content": ""}"#).await;
        assert_eq!(flow, Flow::Quit);
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnect_requeues_survivor() {
        let (manager, _rx1, mut rx2) = started().await;

        let outcome = manager.disconnect(HUNTER).await;
        assert_eq!(outcome, LeaveOutcome::Reset { was_active: true });
        assert_eq!(error_text(&next_envelope(&mut rx2)), OPPONENT_LEFT);

        let snapshot = manager.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::Empty);
        assert!(snapshot.players.is_empty());
        assert_eq!(snapshot.turn, 0);
        assert_eq!(manager.connection_count().await, 1);
        assert!(manager.awaiting_opponent().await);

        // Survivor is out of the game until someone new arrives
        manager.handle_text(PREY, r#"{"type": 3, "content": "UP"}"#).await;
        assert_eq!(
            error_text(&next_envelope(&mut rx2)),
            SessionError::NotInGame.to_string()
        );

        let (tx3, mut rx3) = mpsc::channel(10);
        let newcomer = PlayerId::new([3; 16]);
        assert_eq!(manager.connect(newcomer, tx3).await, Ok(Role::Prey));
        assert_eq!(next_envelope(&mut rx2).kind, MessageType::Ready);
        assert_eq!(next_envelope(&mut rx3).kind, MessageType::Ready);

        let snapshot = manager.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::Active);
        assert_eq!(snapshot.players[0].0, PREY);
        assert_eq!(snapshot.players[0].1, Role::Hunter);
        assert_eq!(snapshot.players[1].0, newcomer);
    }

    #[tokio::test]
    async fn test_disconnect_unknown_player() {
        let (manager, mut rx1, _rx2) = started().await;
        let before = manager.snapshot().await;

        let stranger = PlayerId::new([9; 16]);
        assert_eq!(manager.disconnect(stranger).await, LeaveOutcome::NotPresent);
        assert_eq!(manager.snapshot().await, before);
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_queue_does_not_block_others() {
        let manager = SessionManager::new(SessionConfig::default(), 7);
        let (tx1, mut rx1) = mpsc::channel(1);
        let (tx2, mut rx2) = mpsc::channel(10);

        // Fill the hunter's queue before the game starts
        tx1.try_send(Outbound::Probe).unwrap();
        manager.connect(HUNTER, tx1).await.unwrap();
        manager.connect(PREY, tx2).await.unwrap();

        assert_eq!(next_envelope(&mut rx2).kind, MessageType::Ready);
        assert_eq!(rx1.try_recv(), Ok(Outbound::Probe));
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_receiver_is_skipped() {
        let manager = SessionManager::new(SessionConfig::default(), 7);
        let (tx1, rx1) = mpsc::channel(10);
        let (tx2, mut rx2) = mpsc::channel(10);
        drop(rx1);

        manager.connect(HUNTER, tx1).await.unwrap();
        manager.connect(PREY, tx2).await.unwrap();
        assert_eq!(next_envelope(&mut rx2).kind, MessageType::Ready);
    }
}
