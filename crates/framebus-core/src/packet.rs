//! Packets and delivery routes.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{DomainError, DomainResult, FrameId, SessionId};

/// A single message exchanged between frames.
///
/// Broadcast packets carry a `session_id` and no destination; unicast
/// packets carry a `destination_frame_id` and no session scoping.
/// `data` is opaque to the routing layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub topic: String,
    pub data: serde_json::Value,
    pub sender_frame_id: FrameId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_frame_id: Option<FrameId>,
}

impl Packet {
    /// Creates a session-scoped broadcast packet.
    pub fn broadcast(
        topic: impl Into<String>,
        data: serde_json::Value,
        sender: FrameId,
        session_id: SessionId,
    ) -> Self {
        Self {
            topic: topic.into(),
            data,
            sender_frame_id: sender,
            session_id: Some(session_id),
            destination_frame_id: None,
        }
    }

    /// Creates a frame-addressed unicast packet.
    pub fn unicast(
        topic: impl Into<String>,
        data: serde_json::Value,
        sender: FrameId,
        destination: FrameId,
    ) -> Self {
        Self {
            topic: topic.into(),
            data,
            sender_frame_id: sender,
            session_id: None,
            destination_frame_id: Some(destination),
        }
    }

    /// Serializes an application payload into packet data.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Payload` if the value cannot be represented as JSON.
    pub fn encode_data<T: Serialize + ?Sized>(topic: &str, data: &T) -> DomainResult<serde_json::Value> {
        serde_json::to_value(data).map_err(|e| DomainError::payload(topic, e))
    }

    /// Deserializes the packet data into an application type.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Payload` if the data does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> DomainResult<T> {
        T::deserialize(&self.data).map_err(|e| DomainError::payload(&self.topic, e))
    }

    /// Returns true for session-scoped packets.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self.destination_frame_id.is_none()
    }

    /// The route a provider should use to deliver this packet.
    pub fn route(&self) -> Route {
        match self.destination_frame_id {
            Some(destination) => Route::to_frame(destination),
            None => Route::Broadcast,
        }
    }
}

/// Destination set for a send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Route {
    /// Every registered frame except the sender. Session membership is
    /// enforced by the receiving frame, not by the provider.
    Broadcast,

    /// Exactly these frames, if registered.
    Frames {
        frames: BTreeSet<FrameId>,
    },
}

impl Route {
    /// Route to a single frame.
    pub fn to_frame(frame_id: FrameId) -> Self {
        Self::Frames {
            frames: BTreeSet::from([frame_id]),
        }
    }

    /// Returns true if `frame_id` should receive a packet sent by `sender`.
    pub fn includes(&self, frame_id: FrameId, sender: FrameId) -> bool {
        match self {
            Self::Broadcast => frame_id != sender,
            Self::Frames { frames } => frames.contains(&frame_id),
        }
    }
}
