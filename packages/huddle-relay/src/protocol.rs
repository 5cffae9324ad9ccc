//! Relay protocol message definitions.
//!
//! The relay speaks a simple JSON-over-WebSocket protocol, internally tagged
//! by `type`. Signaling payloads are opaque to the relay: it checks who sends
//! them and to whom, never what they contain.

use serde::{Deserialize, Serialize};

/// Opaque per-connection identity assigned by the relay on accept.
pub type ConnectionId = String;

// ── Client → Relay ────────────────────────────────────────────────────────────

/// Messages sent from a client to the relay server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a meeting room. The id is normalized by the relay.
    Join {
        room_id: String,
    },

    /// Forward a negotiation envelope (SDP or ICE) to another member
    /// of the same room.
    Signal {
        to: ConnectionId,
        payload: String,
    },

    /// Post a chat message to the current room.
    Chat {
        body: String,
        #[serde(default)]
        sender: String,
    },

    /// Leave the current room without closing the connection.
    Leave,

    /// Ping to keep the connection alive.
    Ping,
}

// ── Relay → Client ────────────────────────────────────────────────────────────

/// Messages sent from the relay server to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First frame on every connection: the id the relay assigned to it.
    Welcome {
        connection_id: ConnectionId,
    },

    /// Someone joined. Carries the full, ordered member list so every
    /// client can recompute which negotiations it must start.
    Membership {
        joiner: ConnectionId,
        members: Vec<ConnectionId>,
    },

    /// A member left the room.
    MemberLeft {
        id: ConnectionId,
    },

    /// A negotiation envelope forwarded from another member.
    Signal {
        from: ConnectionId,
        payload: String,
    },

    /// A chat message, live or replayed from history.
    Chat(ChatMessage),

    /// Pong response to keep the connection alive.
    Pong,

    /// Rejection, sent to the originating connection only.
    Error {
        message: String,
    },
}

// ── Supporting Types ──────────────────────────────────────────────────────────

/// A sanitized chat message as stored in room history and broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sanitized display name of the author
    pub sender: String,
    /// Sanitized message body (never empty)
    pub body: String,
    /// Connection that posted the message
    pub from: ConnectionId,
    /// Unix timestamp in milliseconds, assigned by the relay
    pub sent_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_join_deserialization() {
        let parsed: ClientMessage =
            serde_json::from_str(r#"{"type":"join","room_id":"ab_12"}"#).unwrap();
        match parsed {
            ClientMessage::Join { room_id } => assert_eq!(room_id, "ab_12"),
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_client_message_signal_serialization() {
        let msg = ClientMessage::Signal {
            to: "conn-b".to_string(),
            payload: "{\"sdp\":{\"type\":\"offer\",\"sdp\":\"v=0\"}}".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"signal\""));
        assert!(json.contains("\"to\":\"conn-b\""));
    }

    #[test]
    fn test_client_message_chat_sender_defaults_to_empty() {
        let parsed: ClientMessage = serde_json::from_str(r#"{"type":"chat","body":"hi"}"#).unwrap();
        match parsed {
            ClientMessage::Chat { body, sender } => {
                assert_eq!(body, "hi");
                assert!(sender.is_empty());
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_unit_variants() {
        let leave: ClientMessage = serde_json::from_str(r#"{"type":"leave"}"#).unwrap();
        assert!(matches!(leave, ClientMessage::Leave));
        let ping: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(ping, ClientMessage::Ping));
        assert_eq!(serde_json::to_string(&ServerMessage::Pong).unwrap(), r#"{"type":"pong"}"#);
    }

    #[test]
    fn test_server_message_membership_serialization() {
        let msg = ServerMessage::Membership {
            joiner: "conn-b".to_string(),
            members: vec!["conn-a".to_string(), "conn-b".to_string()],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"membership\""));
        assert!(json.contains("\"members\":[\"conn-a\",\"conn-b\"]"));
    }

    #[test]
    fn test_server_message_chat_is_flattened() {
        let msg = ServerMessage::Chat(ChatMessage {
            sender: "Alice".to_string(),
            body: "hi".to_string(),
            from: "conn-a".to_string(),
            sent_at: 1_700_000_000_000,
        });
        let value: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "chat");
        assert_eq!(value["sender"], "Alice");
        assert_eq!(value["body"], "hi");
        assert_eq!(value["from"], "conn-a");
    }

    #[test]
    fn test_server_message_error_serialization() {
        let msg = ServerMessage::Error {
            message: "Meeting is full.".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"error","message":"Meeting is full."}"#);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"nope"}"#).is_err());
    }
}
