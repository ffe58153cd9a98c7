//! WebSocket Game Server
//!
//! Accepts player connections, runs one task per socket and feeds
//! every inbound frame through the [`SessionManager`].

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, broadcast};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::core::grid::CELL_COUNT;
use crate::game::state::{PlayerId, SessionConfig, SessionError, QUORUM};
use crate::network::protocol::ProtocolError;
use crate::network::session::{Flow, Outbound, SessionManager};

/// Close reason sent to a connection refused for capacity.
pub const GAME_FULL: &str = "game is full";

/// Accepted range for the quorum poll interval, in milliseconds.
const POLL_MS_RANGE: std::ops::RangeInclusive<u64> = 10..=60_000;

/// How long a closing connection may spend flushing its queue.
const WRITER_GRACE: Duration = Duration::from_secs(2);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// How often a waiting connection is probed.
    pub quorum_poll_interval: Duration,
    /// Per-connection outbound queue length.
    pub outbound_buffer: usize,
    /// Server version string.
    pub version: String,
    /// Game rules and layout.
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], crate::DEFAULT_PORT)),
            quorum_poll_interval: Duration::from_millis(500),
            outbound_buffer: 64,
            version: env!("CARGO_PKG_VERSION").to_string(),
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from `GRID_HUNT_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, GameServerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source over the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GameServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = parse_var(&lookup, "GRID_HUNT_BIND_ADDR")? {
            config.bind_addr = addr;
        }

        if let Some(ms) = parse_var::<u64, _>(&lookup, "GRID_HUNT_POLL_MS")? {
            if !POLL_MS_RANGE.contains(&ms) {
                return Err(GameServerError::Config(format!(
                    "GRID_HUNT_POLL_MS={ms}: must be between {} and {}",
                    POLL_MS_RANGE.start(),
                    POLL_MS_RANGE.end()
                )));
            }
            config.quorum_poll_interval = Duration::from_millis(ms);
        }

        if let Some(buffer) = parse_var::<usize, _>(&lookup, "GRID_HUNT_OUTBOUND_BUFFER")? {
            if buffer == 0 {
                return Err(GameServerError::Config(
                    "GRID_HUNT_OUTBOUND_BUFFER must be at least 1".to_string(),
                ));
            }
            config.outbound_buffer = buffer;
        }

        if let Some(rocks) = parse_var(&lookup, "GRID_HUNT_ROCKS")? {
            config.session.rocks = rocks;
        }
        if let Some(trees) = parse_var(&lookup, "GRID_HUNT_TREES")? {
            config.session.trees = trees;
        }
        let obstacles = config
            .session
            .rocks
            .checked_add(config.session.trees)
            .ok_or_else(|| GameServerError::Config("obstacle count overflows".to_string()))?;
        if obstacles > CELL_COUNT - QUORUM {
            return Err(GameServerError::Config(format!(
                "{obstacles} obstacles do not fit on a {CELL_COUNT}-cell board"
            )));
        }

        if let Some(points) = parse_var(&lookup, "GRID_HUNT_MOVEMENT_POINTS")? {
            config.session.movement_points = Some(points);
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, GameServerError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| GameServerError::Config(format!("{name}={raw:?}: {e}"))),
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

// =============================================================================
// GAME SERVER
// =============================================================================

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Shared game and connection registry.
    sessions: Arc<SessionManager>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server with a fresh layout seed.
    pub fn new(config: ServerConfig) -> Self {
        let sessions = SessionManager::with_fresh_seed(config.session.clone());
        Self::with_sessions(config, sessions)
    }

    /// Create a server whose layouts follow `seed`.
    pub fn with_seed(config: ServerConfig, seed: u64) -> Self {
        let sessions = SessionManager::new(config.session.clone(), seed);
        Self::with_sessions(config, sessions)
    }

    fn with_sessions(config: ServerConfig, sessions: SessionManager) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            sessions: Arc::new(sessions),
            shutdown_tx,
        }
    }

    /// Bind the configured address and run until shutdown.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Accept connections on `listener` until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        info!("Game server v{} listening on {}", self.config.version, listener.local_addr()?);

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let sessions = self.sessions.clone();
        let poll_every = self.config.quorum_poll_interval;
        let buffer = self.config.outbound_buffer.max(1);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let player_id = PlayerId::random();
            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(buffer);

            // Drain the outbound queue into the socket
            let mut writer = tokio::spawn(async move {
                while let Some(frame) = out_rx.recv().await {
                    let (message, last) = match frame {
                        Outbound::Envelope(envelope) => match envelope.to_json() {
                            Ok(text) => (Message::Text(text), false),
                            Err(e) => {
                                error!("Failed to serialize message: {}", e);
                                continue;
                            }
                        },
                        Outbound::Probe => (Message::Ping(Vec::new()), false),
                        Outbound::Close { code, reason } => {
                            (Message::Close(Some(CloseFrame { code, reason: reason.into() })), true)
                        }
                    };
                    if ws_sender.send(message).await.is_err() || last {
                        break;
                    }
                }
            });

            match sessions.connect(player_id, out_tx.clone()).await {
                Ok(role) => {
                    info!("Client {} is player {} ({})", addr, player_id.short(), role);
                }
                Err(e) => {
                    warn!("Refusing {}: {}", addr, e);
                    let reason = match e {
                        SessionError::Capacity => GAME_FULL.to_string(),
                        other => other.to_string(),
                    };
                    if out_tx.send(Outbound::Close { code: CloseCode::Again, reason }).await.is_err() {
                        debug!("Writer for {} gone before the refusal was queued", addr);
                    }
                    drop(out_tx);
                    if timeout(WRITER_GRACE, &mut writer).await.is_err() {
                        writer.abort();
                    }
                    return;
                }
            }

            let mut poll = interval(poll_every);
            poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
            poll.tick().await;
            let mut writer_done = false;

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                if sessions.handle_text(player_id, &text).await == Flow::Quit {
                                    let _ = out_tx.try_send(Outbound::Close {
                                        code: CloseCode::Normal,
                                        reason: "goodbye".to_string(),
                                    });
                                    break;
                                }
                            }
                            Some(Ok(Message::Binary(_))) => {
                                sessions.report_protocol_error(player_id, ProtocolError::BinaryFrame).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                warn!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            Some(Ok(_)) => {}
                        }
                    }
                    _ = poll.tick() => {
                        if sessions.awaiting_opponent().await {
                            debug!("Player {} waiting for an opponent", player_id.short());
                            let _ = out_tx.try_send(Outbound::Probe);
                        }
                    }
                    _ = &mut writer => {
                        debug!("Writer for {} stopped", addr);
                        writer_done = true;
                        break;
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = out_tx.try_send(Outbound::Close {
                            code: CloseCode::Away,
                            reason: "server shutting down".to_string(),
                        });
                        break;
                    }
                }
            }

            // Cleanup
            sessions.disconnect(player_id).await;
            drop(out_tx);
            if !writer_done && timeout(WRITER_GRACE, &mut writer).await.is_err() {
                writer.abort();
            }

            info!("Client {} cleaned up", addr);
        });
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Shared session manager.
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
