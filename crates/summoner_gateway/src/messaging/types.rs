//! Message type definitions for client-server communication.
//!
//! Every frame exchanged with a client carries one [`Envelope`]: a numeric
//! event code plus an open JSON payload whose meaning depends on the event.

use crate::error::EnvelopeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of event kinds understood by the gateway.
///
/// The numeric codes are part of the wire protocol and must never change.
/// Codes `252..=255` are reserved for error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum GameEvent {
    Authentication = 0,
    JoinGame = 1,
    LeaveGame = 2,
    GameStateUpdate = 3,
    PlayerJoin = 4,
    PlayerLeave = 5,
    PlayerMove = 6,
    PlayerDash = 7,
    Error = 252,
    Forbidden = 253,
    Unauthorized = 254,
    ServerError = 255,
}

impl GameEvent {
    /// Returns the wire code for this event.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Returns `true` for the error classes (`Error`, `Forbidden`,
    /// `Unauthorized`, `ServerError`).
    pub fn is_error(self) -> bool {
        self.code() >= GameEvent::Error.code()
    }

    /// Looks up the event for a wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        let event = match code {
            0 => GameEvent::Authentication,
            1 => GameEvent::JoinGame,
            2 => GameEvent::LeaveGame,
            3 => GameEvent::GameStateUpdate,
            4 => GameEvent::PlayerJoin,
            5 => GameEvent::PlayerLeave,
            6 => GameEvent::PlayerMove,
            7 => GameEvent::PlayerDash,
            252 => GameEvent::Error,
            253 => GameEvent::Forbidden,
            254 => GameEvent::Unauthorized,
            255 => GameEvent::ServerError,
            _ => return None,
        };
        Some(event)
    }
}

impl TryFrom<u8> for GameEvent {
    type Error = EnvelopeError;

    fn try_from(code: u8) -> Result<Self, EnvelopeError> {
        Self::from_code(code).ok_or(EnvelopeError::UnknownEvent(code))
    }
}

impl From<GameEvent> for u8 {
    fn from(event: GameEvent) -> Self {
        event.code()
    }
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameEvent::Authentication => "Authentication",
            GameEvent::JoinGame => "JoinGame",
            GameEvent::LeaveGame => "LeaveGame",
            GameEvent::GameStateUpdate => "GameStateUpdate",
            GameEvent::PlayerJoin => "PlayerJoin",
            GameEvent::PlayerLeave => "PlayerLeave",
            GameEvent::PlayerMove => "PlayerMove",
            GameEvent::PlayerDash => "PlayerDash",
            GameEvent::Error => "Error",
            GameEvent::Forbidden => "Forbidden",
            GameEvent::Unauthorized => "Unauthorized",
            GameEvent::ServerError => "ServerError",
        };
        f.write_str(name)
    }
}

/// A single structured message exchanged with a client.
///
/// # Example
///
/// ```json
/// { "event": 6, "payload": { "x": 1, "y": 2 } }
/// ```
///
/// A missing `payload` decodes as JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The event kind, encoded as its numeric code
    pub event: GameEvent,

    /// Event-specific data, interpreted by the message handler
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Creates an envelope from an event and any serializable payload.
    pub fn new(event: GameEvent, payload: serde_json::Value) -> Self {
        Self { event, payload }
    }

    /// Decodes one envelope from the text of a single frame.
    ///
    /// Malformed JSON, unknown event codes and mistyped fields are all
    /// reported as an [`EnvelopeError`]; decoding never panics.
    pub fn decode(text: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encodes the envelope to its JSON text form.
    pub fn encode(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_codes_match_wire_table() {
        let table = [
            (GameEvent::Authentication, 0u8),
            (GameEvent::JoinGame, 1),
            (GameEvent::LeaveGame, 2),
            (GameEvent::GameStateUpdate, 3),
            (GameEvent::PlayerJoin, 4),
            (GameEvent::PlayerLeave, 5),
            (GameEvent::PlayerMove, 6),
            (GameEvent::PlayerDash, 7),
            (GameEvent::Error, 252),
            (GameEvent::Forbidden, 253),
            (GameEvent::Unauthorized, 254),
            (GameEvent::ServerError, 255),
        ];

        for (event, code) in table {
            assert_eq!(event.code(), code);
            assert_eq!(GameEvent::try_from(code).unwrap(), event);
        }
    }

    #[test]
    fn test_player_move_survives_encode_decode() {
        let envelope = Envelope::new(GameEvent::PlayerMove, json!({"x": 1, "y": 2}));
        let text = envelope.encode().unwrap();

        let decoded = Envelope::decode(&text).unwrap();
        assert_eq!(decoded.event, GameEvent::PlayerMove);
        assert_eq!(decoded.payload, json!({"x": 1, "y": 2}));
    }

    #[test]
    fn test_event_is_encoded_as_integer() {
        let envelope = Envelope::new(GameEvent::ServerError, json!("boom"));
        let value: serde_json::Value = serde_json::from_str(&envelope.encode().unwrap()).unwrap();
        assert_eq!(value["event"], json!(255));
    }

    #[test]
    fn test_unknown_event_code_is_rejected() {
        let err = Envelope::decode(r#"{"event":42,"payload":{}}"#).unwrap_err();
        assert!(err.to_string().contains("42"), "unexpected error: {err}");
    }

    #[test]
    fn test_malformed_frames_are_rejected() {
        for text in ["", "not json", "{\"event\":\"six\"}", "{\"payload\":{}}", "{\"event\":-1}", "{\"event\":6"] {
            assert!(Envelope::decode(text).is_err(), "{text:?} should not decode");
        }
    }

    #[test]
    fn test_missing_payload_defaults_to_null() {
        let envelope = Envelope::decode(r#"{"event":1}"#).unwrap();
        assert_eq!(envelope.event, GameEvent::JoinGame);
        assert!(envelope.payload.is_null());
    }

    #[test]
    fn test_error_classes() {
        assert!(GameEvent::Forbidden.is_error());
        assert!(GameEvent::Error.is_error());
        assert!(!GameEvent::PlayerDash.is_error());
        assert_eq!(GameEvent::Unauthorized.to_string(), "Unauthorized");
    }
}
