//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every text frame carries one JSON object with exactly two fields:
//!
//! ```text
//! {"type": 3, "content": "UP"}
//! {"type": 1, "content": {"hunter": [0, 5], "prey": [13, 2]}}
//! ```
//!
//! `type` is the integer ordinal of a [`MessageType`]; `content` is either
//! a string or a role-to-position map.

use std::fmt;
use serde::{Serialize, Deserialize};
use serde_json::Value;

use crate::core::grid::{Direction, ParseDirectionError};
use crate::game::state::Positions;

// =============================================================================
// MESSAGE TYPE
// =============================================================================

/// Message type, encoded as its ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u8")]
pub enum MessageType {
    /// Game started; content holds the starting positions.
    Ready = 1,
    /// Something went wrong; content holds the error text.
    Error = 2,
    /// Client: direction request. Server: positions after the move.
    Move = 3,
    /// Client is leaving.
    Quit = 4,
}

impl MessageType {
    /// Wire ordinal.
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Upper-case name used in logs and error messages.
    pub const fn as_str(self) -> &'static str {
        match self {
            MessageType::Ready => "READY",
            MessageType::Error => "ERROR",
            MessageType::Move => "MOVE",
            MessageType::Quit => "QUIT",
        }
    }
}

impl From<MessageType> for u8 {
    fn from(kind: MessageType) -> Self {
        kind.ordinal()
    }
}

impl TryFrom<i64> for MessageType {
    type Error = ProtocolError;

    fn try_from(ordinal: i64) -> Result<Self, ProtocolError> {
        match ordinal {
            1 => Ok(MessageType::Ready),
            2 => Ok(MessageType::Error),
            3 => Ok(MessageType::Move),
            4 => Ok(MessageType::Quit),
            other => Err(ProtocolError::UnknownType(other)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ENVELOPE
// =============================================================================

/// Message payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// Direction name or error text.
    Text(String),
    /// Role to `[x, y]` map.
    Positions(Positions),
}

/// One protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    /// Message type
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Payload
    pub content: Content,
}

impl Envelope {
    /// Create an envelope.
    pub fn new(kind: MessageType, content: Content) -> Self {
        Self { kind, content }
    }

    /// READY broadcast with the starting positions.
    pub fn ready(positions: Positions) -> Self {
        Self::new(MessageType::Ready, Content::Positions(positions))
    }

    /// MOVE broadcast with the positions after a move.
    pub fn moved(positions: Positions) -> Self {
        Self::new(MessageType::Move, Content::Positions(positions))
    }

    /// ERROR broadcast.
    pub fn error(text: impl Into<String>) -> Self {
        Self::new(MessageType::Error, Content::Text(text.into()))
    }

    /// QUIT request.
    pub fn quit() -> Self {
        Self::new(MessageType::Quit, Content::Text(String::new()))
    }

    /// MOVE request for one direction.
    pub fn move_request(direction: Direction) -> Self {
        Self::new(MessageType::Move, Content::Text(direction.as_str().to_string()))
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(s).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        let Value::Object(mut fields) = value else {
            return Err(ProtocolError::Malformed("expected a JSON object".to_string()));
        };

        let kind = match fields.remove("type") {
            None => return Err(ProtocolError::MissingField("type")),
            Some(Value::Number(n)) => match n.as_i64() {
                Some(ordinal) => MessageType::try_from(ordinal)?,
                None => return Err(ProtocolError::Malformed(format!("`type` must be an integer, got {n}"))),
            },
            Some(other) => {
                return Err(ProtocolError::Malformed(format!("`type` must be an integer, got {other}")))
            }
        };

        let content = fields.remove("content").ok_or(ProtocolError::MissingField("content"))?;
        let content = serde_json::from_value(content).map_err(|_| {
            ProtocolError::InvalidContent("expected a string or a role-to-position map".to_string())
        })?;

        Ok(Self { kind, content })
    }
}

// =============================================================================
// CLIENT REQUESTS
// =============================================================================

/// What a client can ask the server to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRequest {
    /// Move one cell.
    Move(Direction),
    /// Leave the game.
    Quit,
}

impl ClientRequest {
    /// Decode a text frame straight into a request.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Envelope::from_json(text)?.try_into()
    }
}

impl TryFrom<Envelope> for ClientRequest {
    type Error = ProtocolError;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        match (envelope.kind, envelope.content) {
            (MessageType::Move, Content::Text(name)) => Ok(ClientRequest::Move(name.parse()?)),
            (MessageType::Move, Content::Positions(_)) => Err(ProtocolError::InvalidContent(
                "MOVE content must be UP, DOWN, LEFT or RIGHT".to_string(),
            )),
            (MessageType::Quit, _) => Ok(ClientRequest::Quit),
            (kind, _) => Err(ProtocolError::UnexpectedType(kind)),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Errors decoding a client message. None of these close the connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Not JSON, or not an object, or a non-integer `type`.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Required field absent.
    #[error("malformed message: missing field `{0}`")]
    MissingField(&'static str),

    /// Ordinal outside 1..=4.
    #[error("unknown message type {0}")]
    UnknownType(i64),

    /// MOVE with an unknown direction name.
    #[error("invalid direction: {0}")]
    InvalidDirection(#[from] ParseDirectionError),

    /// Content of the wrong shape.
    #[error("invalid content: {0}")]
    InvalidContent(String),

    /// A server-only message type sent by a client.
    #[error("unexpected {0} message from client")]
    UnexpectedType(MessageType),

    /// Binary WebSocket frame.
    #[error("binary frames are not supported; send JSON text")]
    BinaryFrame,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::GridPos;
    use crate::game::object::Role;
    use proptest::prelude::*;

    fn positions(hunter: (i32, i32), prey: (i32, i32)) -> Positions {
        Positions::from([
            (Role::Hunter, GridPos::new(hunter.0, hunter.1)),
            (Role::Prey, GridPos::new(prey.0, prey.1)),
        ])
    }

    #[test]
    fn test_move_request_wire_format() {
        let json = Envelope::move_request(Direction::Up).to_json().unwrap();
        assert_eq!(json, r#"{"type":3,"content":"UP"}"#);
    }

    #[test]
    fn test_ready_wire_format() {
        let json = Envelope::ready(positions((0, 5), (13, 2))).to_json().unwrap();
        assert_eq!(json, r#"{"type":1,"content":{"hunter":[0,5],"prey":[13,2]}}"#);
    }

    #[test]
    fn test_error_wire_format() {
        let json = Envelope::error("not your turn").to_json().unwrap();
        assert_eq!(json, r#"{"type":2,"content":"not your turn"}"#);
    }

    #[test]
    fn test_parse_positions() {
        let msg = Envelope::from_json(r#"{"type": 3, "content": {"prey": [15, 0], "hunter": [1, 1]}}"#).unwrap();
        assert_eq!(msg, Envelope::moved(positions((1, 1), (15, 0))));
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(Envelope::from_json("not json"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(Envelope::from_json("[3, \"UP\"]"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(
            Envelope::from_json(r#"{"type": "MOVE", "content": "UP"}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            Envelope::from_json(r#"{"content": "UP"}"#),
            Err(ProtocolError::MissingField("type"))
        );
        assert_eq!(
            Envelope::from_json(r#"{"type": 3}"#),
            Err(ProtocolError::MissingField("content"))
        );
    }

    #[test]
    fn test_unknown_ordinal() {
        assert_eq!(
            Envelope::from_json(r#"{"type": 0, "content": ""}"#),
            Err(ProtocolError::UnknownType(0))
        );
        assert_eq!(
            Envelope::from_json(r#"{"type": 9, "content": ""}"#),
            Err(ProtocolError::UnknownType(9))
        );
    }

    #[test]
    fn test_invalid_content_shape() {
        assert!(matches!(
            Envelope::from_json(r#"{"type": 3, "content": 42}"#),
            Err(ProtocolError::InvalidContent(_))
        ));
        assert!(matches!(
            Envelope::from_json(r#"{"type": 3, "content": {"wizard": [1, 1]}}"#),
            Err(ProtocolError::InvalidContent(_))
        ));
    }

    #[test]
    fn test_client_request_move() {
        assert_eq!(
            ClientRequest::parse(r#"{"type": 3, "content": "RIGHT"}"#),
            Ok(ClientRequest::Move(Direction::Right))
        );
        assert_eq!(
            ClientRequest::parse(r#"{"type": 4, "content": ""}"#),
            Ok(ClientRequest::Quit)
        );
    }

    #[test]
    fn test_client_request_sideways() {
        let err = ClientRequest::parse(r#"{"type": 3, "content": "SIDEWAYS"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidDirection(_)));
        assert!(err.to_string().contains("SIDEWAYS"));
    }

    #[test]
    fn test_client_request_server_only_types() {
        let ready = Envelope::ready(positions((0, 0), (15, 0)));
        assert_eq!(
            ClientRequest::try_from(ready),
            Err(ProtocolError::UnexpectedType(MessageType::Ready))
        );
        assert_eq!(
            ClientRequest::try_from(Envelope::error("x")),
            Err(ProtocolError::UnexpectedType(MessageType::Error))
        );
        assert!(matches!(
            ClientRequest::try_from(Envelope::moved(Positions::new())),
            Err(ProtocolError::InvalidContent(_))
        ));
    }

    fn envelope_strategy() -> impl Strategy<Value = Envelope> {
        let kind = prop_oneof![
            Just(MessageType::Ready),
            Just(MessageType::Error),
            Just(MessageType::Move),
            Just(MessageType::Quit),
        ];
        let pos = (-1i32..16, -1i32..12).prop_map(|(x, y)| GridPos::new(x, y));
        let content = prop_oneof![
            any::<String>().prop_map(Content::Text),
            (proptest::option::of(pos.clone()), proptest::option::of(pos)).prop_map(|(h, p)| {
                let mut map = Positions::new();
                if let Some(h) = h {
                    map.insert(Role::Hunter, h);
                }
                if let Some(p) = p {
                    map.insert(Role::Prey, p);
                }
                Content::Positions(map)
            }),
        ];
        (kind, content).prop_map(|(kind, content)| Envelope::new(kind, content))
    }

    proptest! {
        #[test]
        fn prop_envelope_roundtrip(envelope in envelope_strategy()) {
            let json = envelope.to_json().unwrap();
            prop_assert_eq!(Envelope::from_json(&json), Ok(envelope));
        }
    }
}
