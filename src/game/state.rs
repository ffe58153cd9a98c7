//! Game Session State
//!
//! The authoritative turn-based state machine for one hunter/prey game.
//!
//! ```text
//!   EMPTY --join--> WAITING --join--> WAITING(2) --initialize--> ACTIVE
//!     ^                                                            |
//!     +------------------------ leave / reset ---------------------+
//! ```
//!
//! Every operation either succeeds completely or returns an error
//! without touching the observable state.

use std::collections::BTreeMap;
use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::grid::{Direction, GridPos, BOARD_HEIGHT, CELL_COUNT};
use crate::core::rng::DeterministicRng;
use crate::game::board::{Board, DistanceField};
use crate::game::object::{GameObject, ObjectKind, Role};

/// Number of players a game needs before it can start.
pub const QUORUM: usize = 2;

/// Post-move positions keyed by role.
pub type Positions = BTreeMap<Role, GridPos>;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Unique player identifier (UUID as bytes), one per connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub [u8; 16]);

impl PlayerId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Fresh random identifier.
    pub fn random() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Short hex prefix for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_bytes(self.0))
    }
}

// =============================================================================
// CONFIG & ERRORS
// =============================================================================

/// Layout and rules for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Blocking obstacles placed per game.
    pub rocks: usize,
    /// Decorative obstacles placed per game.
    pub trees: usize,
    /// When set, a move must stay within this many steps of the mover's
    /// distance field. Unset means only board clamping applies.
    pub movement_points: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rocks: 4,
            trees: 4,
            movement_points: None,
        }
    }
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Two players already joined.
    #[error("game is full: two players have already joined")]
    Capacity,

    /// Player is already in the roster.
    #[error("already joined this game")]
    AlreadyJoined,

    /// Session has not been initialized.
    #[error("game has not started: waiting for an opponent")]
    NotStarted,

    /// Player is not part of the current roster.
    #[error("not a player in the current game")]
    NotInGame,

    /// Another player is the current mover.
    #[error("not your turn: waiting for the {waiting_for} to move")]
    NotYourTurn {
        /// Role whose turn it is.
        waiting_for: Role,
    },

    /// The mover's object kind has no stride.
    #[error("{kind:?} objects cannot move")]
    Immovable {
        /// Kind of the object asked to move.
        kind: ObjectKind,
    },

    /// Destination rejected by the movement-point check.
    #[error("illegal move from {from} to {to}: more than {movement_points} steps away")]
    IllegalMove {
        /// Mover's current cell.
        from: GridPos,
        /// Requested cell.
        to: GridPos,
        /// Configured budget.
        movement_points: u32,
    },
}

/// Result of a [`GameSession::leave`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Player removed; the session was reset to empty.
    Reset {
        /// Whether a game was in progress.
        was_active: bool,
    },
    /// Player was not in the roster; nothing changed.
    NotPresent,
}

/// Coarse session state derived from roster and initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No players
    Empty,
    /// Players present but the game has not started
    Waiting,
    /// Two players, game in progress
    Active,
}

// =============================================================================
// PLAYER STATE
// =============================================================================

/// A player in the roster.
#[derive(Debug, Clone)]
pub struct PlayerState {
    /// Connection identity
    pub id: PlayerId,
    /// Fixed at join time
    pub role: Role,
    /// Board presence
    pub object: GameObject,
    /// Distance field from the position it was computed at
    reach: Option<DistanceField>,
}

impl PlayerState {
    fn new(id: PlayerId, role: Role, slot: usize) -> Self {
        Self {
            id,
            role,
            object: GameObject::new(slot as u32, role.kind(), GridPos::UNPLACED),
            reach: None,
        }
    }

    /// Current cell.
    #[inline]
    pub fn pos(&self) -> GridPos {
        self.object.pos
    }

    /// Distance field from the current position, recomputed if stale.
    pub fn reach(&mut self, board: &Board) -> &DistanceField {
        let pos = self.object.pos;
        if self.reach.as_ref().is_some_and(|field| field.origin() != pos) {
            self.reach = None;
        }
        self.reach.get_or_insert_with(|| board.calc_distances(pos))
    }

    fn place(&mut self, pos: GridPos) {
        self.object.pos = pos;
        self.reach = None;
    }
}

/// Observable session state, without caches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Derived phase
    pub phase: SessionPhase,
    /// Turn counter
    pub turn: u32,
    /// Roster in join order: (id, role, position)
    pub players: Vec<(PlayerId, Role, GridPos)>,
    /// Static obstacles
    pub obstacles: Vec<GameObject>,
}

// =============================================================================
// GAME SESSION
// =============================================================================

/// The single shared game.
#[derive(Debug, Clone)]
pub struct GameSession {
    config: SessionConfig,
    rng: DeterministicRng,
    board: Board,
    roster: Vec<PlayerState>,
    obstacles: Vec<GameObject>,
    turn: u32,
    initialized: bool,
}

impl GameSession {
    /// Create an empty session with a layout seed.
    pub fn new(config: SessionConfig, seed: u64) -> Self {
        Self {
            config,
            rng: DeterministicRng::new(seed),
            board: Board::empty(),
            roster: Vec::with_capacity(QUORUM),
            obstacles: Vec::new(),
            turn: 0,
            initialized: false,
        }
    }

    /// Add a player. The first joiner hunts, the second is hunted.
    pub fn join(&mut self, player_id: PlayerId) -> Result<Role, SessionError> {
        let slot = self.roster.len();
        let role = Role::for_slot(slot).ok_or(SessionError::Capacity)?;
        if self.roster.iter().any(|p| p.id == player_id) {
            return Err(SessionError::AlreadyJoined);
        }

        self.roster.push(PlayerState::new(player_id, role, slot));

        Ok(role)
    }

    /// Place players and obstacles and start the game.
    ///
    /// Only acts on a full, uninitialized roster; returns whether it did.
    pub fn initialize(&mut self) -> bool {
        if self.initialized || self.roster.len() != QUORUM {
            return false;
        }

        for player in &mut self.roster {
            let x = self.rng.next_in(player.role.start_columns());
            let y = self.rng.next_in(0..BOARD_HEIGHT);
            player.place(GridPos::new(x, y));
        }

        let starts: Vec<GridPos> = self.roster.iter().map(PlayerState::pos).collect();
        let free: Vec<GridPos> = (0..CELL_COUNT)
            .map(GridPos::from_index)
            .filter(|pos| !starts.contains(pos))
            .collect();

        let first_id = QUORUM as u32;
        let picks = self.rng.sample(&free, self.config.rocks + self.config.trees);
        self.obstacles = picks
            .into_iter()
            .enumerate()
            .map(|(i, pos)| {
                let kind = if i < self.config.rocks {
                    ObjectKind::ObstacleA
                } else {
                    ObjectKind::ObstacleB
                };
                GameObject::new(first_id + i as u32, kind, pos)
            })
            .collect();
        self.board = Board::from_objects(&self.obstacles);

        self.turn = 0;
        self.initialized = true;
        true
    }

    /// Move the current mover one cell.
    ///
    /// Off-board destinations are clamped to the edge rather than
    /// rejected. Returns every player's position after the move.
    pub fn move_player(
        &mut self,
        player_id: PlayerId,
        direction: Direction,
    ) -> Result<Positions, SessionError> {
        let slot = self
            .roster
            .iter()
            .position(|p| p.id == player_id)
            .ok_or(SessionError::NotInGame)?;

        if !self.initialized {
            return Err(SessionError::NotStarted);
        }

        let mover = self.current_slot();
        if slot != mover {
            return Err(SessionError::NotYourTurn {
                waiting_for: self.roster[mover].role,
            });
        }

        let movement_points = self.config.movement_points;
        let player = &mut self.roster[slot];
        let from = player.pos();
        let to = player
            .object
            .destination(direction)
            .ok_or(SessionError::Immovable { kind: player.object.kind })?;

        if let Some(points) = movement_points {
            if !player.reach(&self.board).is_within(to, points) {
                return Err(SessionError::IllegalMove {
                    from,
                    to,
                    movement_points: points,
                });
            }
        }

        player.place(to);
        self.turn = self.turn.wrapping_add(1);

        Ok(self.positions())
    }

    /// Remove a player.
    ///
    /// A game cannot continue with one player, so removing any roster
    /// member resets the whole session.
    pub fn leave(&mut self, player_id: PlayerId) -> LeaveOutcome {
        if !self.roster.iter().any(|p| p.id == player_id) {
            return LeaveOutcome::NotPresent;
        }

        let was_active = self.initialized;
        self.reset();
        LeaveOutcome::Reset { was_active }
    }

    /// Return to the empty state. The next game gets a fresh layout.
    pub fn reset(&mut self) {
        self.roster.clear();
        self.obstacles.clear();
        self.board = Board::empty();
        self.turn = 0;
        self.initialized = false;
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Derived phase.
    pub fn phase(&self) -> SessionPhase {
        if self.initialized {
            SessionPhase::Active
        } else if self.roster.is_empty() {
            SessionPhase::Empty
        } else {
            SessionPhase::Waiting
        }
    }

    /// Turn counter.
    pub fn turn(&self) -> u32 {
        self.turn
    }

    /// Whether the game has started.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Roster size.
    pub fn player_count(&self) -> usize {
        self.roster.len()
    }

    /// Roster in join order.
    pub fn players(&self) -> &[PlayerState] {
        &self.roster
    }

    /// Player whose turn it is, once the game has started.
    pub fn current_mover(&self) -> Option<&PlayerState> {
        if self.initialized {
            self.roster.get(self.current_slot())
        } else {
            None
        }
    }

    /// Role of a rostered player.
    pub fn role_of(&self, player_id: PlayerId) -> Option<Role> {
        self.roster.iter().find(|p| p.id == player_id).map(|p| p.role)
    }

    /// Every player's position keyed by role.
    pub fn positions(&self) -> Positions {
        self.roster.iter().map(|p| (p.role, p.pos())).collect()
    }

    /// Current board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Static obstacles of the current game.
    pub fn obstacles(&self) -> &[GameObject] {
        &self.obstacles
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Copy of the observable state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase(),
            turn: self.turn,
            players: self.roster.iter().map(|p| (p.id, p.role, p.pos())).collect(),
            obstacles: self.obstacles.clone(),
        }
    }

    #[inline]
    fn current_slot(&self) -> usize {
        self.turn as usize % QUORUM
    }
}

// =============================================================================
// TESTS
// =============================================================================
