//! Switchboard actor commands, errors, and events.
//!
//! This module defines the message types for communicating with the `SwitchboardActor`:
//! - `SwitchboardCommand`: Commands sent to the actor
//! - `SwitchboardError`: Errors that can occur during switchboard operations
//! - `SwitchboardEvent`: Events published by the switchboard for observers

use framebus_core::{FrameId, Packet, Route, SessionId, SessionInfo};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

// ============================================================================
// Switchboard Commands
// ============================================================================

/// Commands sent to the switchboard actor.
///
/// Request/response commands carry a oneshot channel for the reply.
/// `Deliver` and `UnregisterFrame` are fire-and-forget.
#[derive(Debug)]
pub enum SwitchboardCommand {
    /// Allocate a new frame id and its inbound channel.
    ///
    /// # Errors
    /// - `SwitchboardError::TooManyFrames` if at maximum capacity
    RegisterFrame {
        respond_to: oneshot::Sender<Result<(FrameId, mpsc::UnboundedReceiver<Packet>), SwitchboardError>>,
    },

    /// Stop delivering to a frame. Session membership is left untouched.
    UnregisterFrame { frame_id: FrameId },

    /// Try to become the owner of a session.
    ///
    /// Responds `true` if the session had no owner or the frame already owns it.
    ///
    /// # Errors
    /// - `SwitchboardError::TooManySessions` if a new session would exceed capacity
    ClaimSession {
        frame_id: FrameId,
        session_id: SessionId,
        respond_to: oneshot::Sender<Result<bool, SwitchboardError>>,
    },

    /// Join a session that already has an owner.
    ///
    /// Responds `false` if nobody owns the session yet.
    JoinSession {
        frame_id: FrameId,
        session_id: SessionId,
        display_name: String,
        respond_to: oneshot::Sender<bool>,
    },

    /// Snapshot of one session.
    DescribeSession {
        session_id: SessionId,
        respond_to: oneshot::Sender<Option<SessionInfo>>,
    },

    /// Snapshot of all sessions, ordered by id.
    ListSessions {
        respond_to: oneshot::Sender<Vec<SessionInfo>>,
    },

    /// Number of currently registered frames.
    FrameCount { respond_to: oneshot::Sender<usize> },

    /// Push a packet into the inbound channel of every frame on the route.
    Deliver { route: Route, packet: Box<Packet> },
}

// ============================================================================
// Switchboard Errors
// ============================================================================

/// Errors that can occur during switchboard operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwitchboardError {
    /// The switchboard already holds its maximum number of frames.
    #[error("too many frames (max: {max})")]
    TooManyFrames { max: usize },

    /// The switchboard already holds its maximum number of sessions.
    #[error("too many sessions (max: {max})")]
    TooManySessions { max: usize },

    /// The actor was shut down before it could answer.
    #[error("switchboard channel closed")]
    ChannelClosed,
}

impl SwitchboardError {
    /// Short machine-readable code used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TooManyFrames { .. } => "too_many_frames",
            Self::TooManySessions { .. } => "too_many_sessions",
            Self::ChannelClosed => "channel_closed",
        }
    }
}

// ============================================================================
// Switchboard Events
// ============================================================================

/// State changes published by the switchboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchboardEvent {
    FrameRegistered { frame_id: FrameId },

    FrameUnregistered { frame_id: FrameId },

    /// A frame became the owner of a new session.
    SessionClaimed { session_id: SessionId, owner: FrameId },

    /// A frame joined (or re-joined) an owned session.
    SessionJoined {
        session_id: SessionId,
        frame_id: FrameId,
        display_name: String,
    },
}
