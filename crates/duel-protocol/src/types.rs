//! Envelope-level protocol types for Duel's wire format.
//!
//! Every frame on a Duel WebSocket is one [`Envelope`]. The envelope
//! carries ordering metadata and a [`Payload`], which routes the frame to
//! the right layer: the connection itself ([`SystemMessage`]), the lobby
//! ([`LobbyMessage`]), or the match the player sits in ([`MatchMessage`]).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{LobbyMessage, MatchMessage};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Server-assigned session identifier for one connected player.
///
/// Stable for the lifetime of the connection and opaque to clients: the
/// server hands it out in [`SystemMessage::HandshakeAck`] and never
/// accepts one chosen by the client.
///
/// `#[serde(transparent)]` keeps it a plain number on the wire, so
/// `PlayerId(42)` is `42` rather than `{"0":42}`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Identifier of one match (one two-player game instance).
///
/// Also the key under which the match publishes its metadata to the
/// presence store (`match:{id}`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MatchId(pub u64);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SystemMessage: connection plumbing
// ---------------------------------------------------------------------------

/// Connection-level messages: handshake, keep-alive, disconnect, errors.
///
/// Internally tagged, so a heartbeat is
/// `{ "type": "Heartbeat", "client_time": 5000 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    /// Client → Server: first frame on a new connection.
    Handshake { version: u32 },

    /// Server → Client: the connection is accepted and owns `session_id`.
    HandshakeAck {
        session_id: PlayerId,
        server_time: u64,
    },

    /// Either direction: the sender is going away.
    Disconnect { reason: String },

    /// Client → Server keep-alive. `client_time` is echoed back for RTT.
    Heartbeat { client_time: u64 },

    /// Server → Client keep-alive reply.
    HeartbeatAck {
        client_time: u64,
        server_time: u64,
    },

    /// Server → Client: something went wrong at the connection level.
    /// `code` follows HTTP conventions (400 bad request, 409 conflict, ...).
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Payload: what's inside an envelope
// ---------------------------------------------------------------------------

/// The content of a frame.
///
/// Adjacently tagged:
/// `{ "type": "Match", "data": { "type": "make-choice", "choice": "rock" } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    /// Connection plumbing.
    System(SystemMessage),

    /// Discovery: room listings, access-code lookups.
    Lobby(LobbyMessage),

    /// Intents and state for the match the player is in.
    Match(MatchMessage),
}

// ---------------------------------------------------------------------------
// Envelope: the top-level wire format
// ---------------------------------------------------------------------------

/// The top-level frame. Every WebSocket message is one `Envelope`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-direction sequence number.
    pub seq: u64,

    /// Milliseconds since the sender's connection started.
    pub timestamp: u64,

    pub payload: Payload,
}

impl Envelope {
    pub fn new(seq: u64, timestamp: u64, payload: Payload) -> Self {
        Self {
            seq,
            timestamp,
            payload,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The JSON shapes here are what browser clients parse, so the tests
    //! pin the serde attributes rather than just round-tripping.

    use super::*;
    use crate::Choice;

    #[test]
    fn test_player_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&PlayerId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_player_id_display() {
        assert_eq!(PlayerId(7).to_string(), "P-7");
    }

    #[test]
    fn test_match_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&MatchId(99)).unwrap();
        assert_eq!(json, "99");
        let id: MatchId = serde_json::from_str("99").unwrap();
        assert_eq!(id, MatchId(99));
    }

    #[test]
    fn test_match_id_display() {
        assert_eq!(MatchId(3).to_string(), "M-3");
    }

    #[test]
    fn test_system_message_handshake_json_format() {
        let msg = SystemMessage::Handshake { version: 1 };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "Handshake");
        assert_eq!(json["version"], 1);
    }

    #[test]
    fn test_system_message_handshake_ack_json_format() {
        let msg = SystemMessage::HandshakeAck {
            session_id: PlayerId(42),
            server_time: 15000,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "HandshakeAck");
        assert_eq!(json["session_id"], 42);
        assert_eq!(json["server_time"], 15000);
    }

    #[test]
    fn test_system_message_error_json_format() {
        let msg = SystemMessage::Error {
            code: 409,
            message: "already in a match".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "Error");
        assert_eq!(json["code"], 409);
    }

    #[test]
    fn test_payload_match_json_format() {
        let payload = Payload::Match(MatchMessage::MakeChoice {
            choice: Choice::Rock,
        });
        let json: serde_json::Value = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["type"], "Match");
        assert_eq!(json["data"]["type"], "make-choice");
        assert_eq!(json["data"]["choice"], "rock");
    }

    #[test]
    fn test_payload_lobby_json_format() {
        let payload = Payload::Lobby(LobbyMessage::FindRoom {
            access_code: "abc234".into(),
        });
        let json: serde_json::Value = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["type"], "Lobby");
        assert_eq!(json["data"]["type"], "find_room");
        assert_eq!(json["data"]["accessCode"], "abc234");
    }

    #[test]
    fn test_envelope_ignores_unknown_top_level_fields() {
        let json = r#"{
            "seq": 1,
            "timestamp": 100,
            "channel": "Unreliable",
            "payload": { "type": "Match", "data": { "type": "player-ready" } }
        }"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.seq, 1);
        assert_eq!(envelope.payload, Payload::Match(MatchMessage::PlayerReady));

        let out = serde_json::to_value(&envelope).unwrap();
        assert_eq!(out.as_object().map(|o| o.len()), Some(3));
    }

    #[test]
    fn test_decode_unknown_match_message_returns_error() {
        let unknown = r#"{"type": "Match", "data": {"type": "flip-table"}}"#;
        let result: Result<Payload, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_garbage_returns_error() {
        let result: Result<Envelope, _> = serde_json::from_slice(b"not json");
        assert!(result.is_err());
    }
}
