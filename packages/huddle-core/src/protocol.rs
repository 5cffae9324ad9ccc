//! # Relay Protocol (client side)
//!
//! Mirror of the relay's JSON-over-WebSocket vocabulary, plus the shape of
//! the negotiation envelopes clients tunnel through it. The relay never looks
//! inside an envelope; only peers do.

use serde::{Deserialize, Serialize};

/// Opaque per-connection identity assigned by the relay.
pub type ConnectionId = String;

/// Messages sent from client to relay server.
/// Must match the relay server's `ClientMessage` enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayClientMessage {
    Join {
        room_id: String,
    },
    Signal {
        to: ConnectionId,
        payload: String,
    },
    Chat {
        body: String,
        sender: String,
    },
    Leave,
    Ping,
}

/// Messages received from the relay server.
/// Must match the relay server's `ServerMessage` enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayServerMessage {
    Welcome {
        connection_id: ConnectionId,
    },
    Membership {
        joiner: ConnectionId,
        members: Vec<ConnectionId>,
    },
    MemberLeft {
        id: ConnectionId,
    },
    Signal {
        from: ConnectionId,
        payload: String,
    },
    Chat(ChatMessageData),
    Pong,
    Error {
        message: String,
    },
}

/// A chat message received from the relay (live or replayed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessageData {
    pub sender: String,
    pub body: String,
    pub from: ConnectionId,
    pub sent_at: i64,
}

// ── Negotiation Envelopes ─────────────────────────────────────────────────────

/// SDP description type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// A session description, in the browser's `RTCSessionDescriptionInit` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// A single ICE candidate, in the browser's `RTCIceCandidateInit` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    /// The candidate string
    pub candidate: String,
    /// SDP mid
    #[serde(default)]
    pub sdp_mid: Option<String>,
    /// SDP m-line index
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
}

/// The payload of a relayed `signal`: `{"sdp": {...}}` or `{"ice": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationPayload {
    Sdp(SessionDescription),
    Ice(IceCandidate),
}

impl NegotiationPayload {
    pub fn parse(raw: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn encode(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
