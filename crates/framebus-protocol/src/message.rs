//! Protocol message types for frame-hub communication.

use crate::version::ProtocolVersion;
use framebus_core::{FrameId, Packet, Route, SessionId, SessionInfo};
use serde::{Deserialize, Serialize};

/// Correlates a hub response with the frame request that caused it.
///
/// Allocated by the frame, unique per connection.
pub type RequestId = u64;

/// Message types that can be sent by a frame to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageType {
    /// Handshake; must be the first message on a connection
    Connect {
        /// Label for hub logs (optional)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
    },

    /// Claim ownership of a session
    ClaimSession {
        request_id: RequestId,
        session_id: SessionId,
    },

    /// Join a session that already has an owner
    JoinSession {
        request_id: RequestId,
        session_id: SessionId,
        display_name: String,
    },

    /// Request a snapshot of a session
    DescribeSession {
        request_id: RequestId,
        session_id: SessionId,
    },

    /// Hand a packet to the hub for delivery (no response)
    Send {
        route: Route,
        packet: Packet,
    },

    /// Ping to check connection
    Ping {
        /// Sequence number for matching pong response
        seq: u64,
    },

    /// Frame detaching gracefully
    Disconnect,
}

/// Messages sent from a frame to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMessage {
    /// Protocol version
    pub protocol_version: ProtocolVersion,

    /// Message payload
    #[serde(flatten)]
    pub message: MessageType,
}

impl FrameMessage {
    /// Creates a new frame message with current protocol version.
    pub fn new(message: MessageType) -> Self {
        Self {
            protocol_version: ProtocolVersion::CURRENT,
            message,
        }
    }

    /// Creates a connect message.
    pub fn connect(display_name: Option<String>) -> Self {
        Self::new(MessageType::Connect { display_name })
    }

    /// Creates a session claim request.
    pub fn claim_session(request_id: RequestId, session_id: SessionId) -> Self {
        Self::new(MessageType::ClaimSession {
            request_id,
            session_id,
        })
    }

    /// Creates a session join request.
    pub fn join_session(request_id: RequestId, session_id: SessionId, display_name: String) -> Self {
        Self::new(MessageType::JoinSession {
            request_id,
            session_id,
            display_name,
        })
    }

    /// Creates a session describe request.
    pub fn describe_session(request_id: RequestId, session_id: SessionId) -> Self {
        Self::new(MessageType::DescribeSession {
            request_id,
            session_id,
        })
    }

    /// Creates a send message.
    pub fn send(route: Route, packet: Packet) -> Self {
        Self::new(MessageType::Send { route, packet })
    }

    /// Creates a ping message.
    pub fn ping(seq: u64) -> Self {
        Self::new(MessageType::Ping { seq })
    }

    /// Creates a disconnect message.
    pub fn disconnect() -> Self {
        Self::new(MessageType::Disconnect)
    }
}

/// Messages sent from the hub to a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubMessage {
    /// Connection accepted
    Connected {
        /// Hub's protocol version
        protocol_version: ProtocolVersion,
        /// Identity assigned to this frame
        frame_id: FrameId,
    },

    /// Connection rejected (version mismatch, capacity, etc.)
    Rejected {
        /// Reason for rejection
        reason: String,
        /// Hub's protocol version (for the frame to upgrade)
        protocol_version: ProtocolVersion,
    },

    /// Answer to `claim_session`
    SessionClaimed { request_id: RequestId, claimed: bool },

    /// Answer to `join_session`
    SessionJoined { request_id: RequestId, joined: bool },

    /// Answer to `describe_session`
    SessionDescribed {
        request_id: RequestId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session: Option<SessionInfo>,
    },

    /// Inbound packet for this frame
    Deliver { packet: Packet },

    /// Pong response to ping
    Pong {
        /// Sequence number from ping
        seq: u64,
    },

    /// Error response
    Error {
        /// Error message
        message: String,
        /// Request that failed, if the error answers one
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
        /// Error code (optional)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl HubMessage {
    /// Creates a connected response.
    pub fn connected(frame_id: FrameId) -> Self {
        Self::Connected {
            protocol_version: ProtocolVersion::CURRENT,
            frame_id,
        }
    }

    /// Creates a rejected response.
    pub fn rejected(reason: &str) -> Self {
        Self::Rejected {
            reason: reason.to_string(),
            protocol_version: ProtocolVersion::CURRENT,
        }
    }

    /// Creates a deliver message.
    pub fn deliver(packet: Packet) -> Self {
        Self::Deliver { packet }
    }

    /// Creates a pong response.
    pub fn pong(seq: u64) -> Self {
        Self::Pong { seq }
    }

    /// Creates an error response.
    pub fn error(message: &str) -> Self {
        Self::Error {
            message: message.to_string(),
            request_id: None,
            code: None,
        }
    }

    /// Creates an error response for a specific request, with code.
    pub fn request_error(request_id: RequestId, message: &str, code: &str) -> Self {
        Self::Error {
            message: message.to_string(),
            request_id: Some(request_id),
            code: Some(code.to_string()),
        }
    }

    /// The request this message answers, if any.
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::SessionClaimed { request_id, .. }
            | Self::SessionJoined { request_id, .. }
            | Self::SessionDescribed { request_id, .. } => Some(*request_id),
            Self::Error { request_id, .. } => *request_id,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_message_serialization() {
        let msg = FrameMessage::claim_session(3, SessionId::from(1u32));
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"claim_session\""));
        assert!(json.contains("\"request_id\":3"));
        assert!(json.contains("\"session_id\":\"1\""));
        assert!(json.contains("\"protocol_version\""));
    }

    #[test]
    fn test_hub_message_serialization() {
        let msg = HubMessage::connected(FrameId::new(9));
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"connected\""));
        assert!(json.contains("\"frame_id\":9"));
    }

    #[test]
    fn test_send_message_roundtrip() {
        let packet = Packet::unicast("test", json!("bar"), FrameId::new(1), FrameId::new(2));
        let original = FrameMessage::send(packet.route(), packet.clone());
        let json = serde_json::to_string(&original).unwrap();
        let parsed: FrameMessage = serde_json::from_str(&json).unwrap();

        match parsed.message {
            MessageType::Send { route, packet: got } => {
                assert_eq!(route, Route::to_frame(FrameId::new(2)));
                assert_eq!(got, packet);
            }
            other => panic!("Expected Send message, got {other:?}"),
        }
    }

    #[test]
    fn test_hub_message_request_id() {
        let claimed = HubMessage::SessionClaimed {
            request_id: 4,
            claimed: false,
        };
        assert_eq!(claimed.request_id(), Some(4));
        assert_eq!(HubMessage::request_error(5, "full", "too_many_sessions").request_id(), Some(5));
        assert_eq!(HubMessage::pong(1).request_id(), None);
        assert_eq!(HubMessage::error("bad").request_id(), None);
    }
}
