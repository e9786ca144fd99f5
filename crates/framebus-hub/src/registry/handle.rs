//! Client interface for interacting with the SwitchboardActor.
//!
//! The `SwitchboardHandle` provides a cheap-to-clone interface for sending
//! commands to the switchboard actor and subscribing to its events.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `SwitchboardError::ChannelClosed`

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::debug;

use framebus_core::{FrameId, Packet, Route, SessionId, SessionInfo};

use super::commands::{SwitchboardCommand, SwitchboardError, SwitchboardEvent};

// ============================================================================
// Switchboard Handle
// ============================================================================

/// Handle for interacting with the switchboard actor.
///
/// Cloning the handle shares the same switchboard: every clone sees the
/// same frames and sessions.
///
/// # Usage
///
/// ```ignore
/// let (frame_id, mut inbound) = handle.register_frame().await?;
/// let owner = handle.claim_session(frame_id, SessionId::from(1u32)).await?;
///
/// handle.deliver(Route::Broadcast, packet);
/// while let Some(packet) = inbound.recv().await {
///     // Handle packet
/// }
/// ```
#[derive(Clone)]
pub struct SwitchboardHandle {
    /// Command sender to the actor
    sender: mpsc::UnboundedSender<SwitchboardCommand>,

    /// Event broadcaster for subscribing to state changes
    event_sender: broadcast::Sender<SwitchboardEvent>,
}

impl SwitchboardHandle {
    pub fn new(
        sender: mpsc::UnboundedSender<SwitchboardCommand>,
        event_sender: broadcast::Sender<SwitchboardEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Register a new frame and obtain its inbound packet channel.
    ///
    /// # Errors
    ///
    /// - `SwitchboardError::TooManyFrames` if the switchboard is full
    /// - `SwitchboardError::ChannelClosed` if the actor has shut down
    pub async fn register_frame(
        &self,
    ) -> Result<(FrameId, mpsc::UnboundedReceiver<Packet>), SwitchboardError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(SwitchboardCommand::RegisterFrame { respond_to: tx })
            .map_err(|_| SwitchboardError::ChannelClosed)?;

        rx.await.map_err(|_| SwitchboardError::ChannelClosed)?
    }

    /// Stop delivering packets to a frame.
    ///
    /// Fire-and-forget; unknown frames are ignored.
    pub fn unregister_frame(&self, frame_id: FrameId) {
        // Ignore send errors - actor may be shutting down
        let _ = self
            .sender
            .send(SwitchboardCommand::UnregisterFrame { frame_id });
    }

    /// Attempt to become the owner of a session.
    ///
    /// Returns `Ok(false)` when another frame already owns it; the caller
    /// does not become a member in that case.
    ///
    /// # Errors
    ///
    /// - `SwitchboardError::TooManySessions` if a new session would exceed capacity
    /// - `SwitchboardError::ChannelClosed` if the actor has shut down
    pub async fn claim_session(
        &self,
        frame_id: FrameId,
        session_id: SessionId,
    ) -> Result<bool, SwitchboardError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(SwitchboardCommand::ClaimSession {
                frame_id,
                session_id,
                respond_to: tx,
            })
            .map_err(|_| SwitchboardError::ChannelClosed)?;

        rx.await.map_err(|_| SwitchboardError::ChannelClosed)?
    }

    /// Join a session that already has an owner.
    ///
    /// Returns `Ok(false)` when nobody owns the session yet.
    ///
    /// # Errors
    ///
    /// - `SwitchboardError::ChannelClosed` if the actor has shut down
    pub async fn join_session(
        &self,
        frame_id: FrameId,
        session_id: SessionId,
        display_name: impl Into<String>,
    ) -> Result<bool, SwitchboardError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(SwitchboardCommand::JoinSession {
                frame_id,
                session_id,
                display_name: display_name.into(),
                respond_to: tx,
            })
            .map_err(|_| SwitchboardError::ChannelClosed)?;

        rx.await.map_err(|_| SwitchboardError::ChannelClosed)
    }

    /// Snapshot of a session.
    ///
    /// Returns `None` if the session doesn't exist or if communication
    /// with the actor fails.
    pub async fn describe_session(&self, session_id: SessionId) -> Option<SessionInfo> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(SwitchboardCommand::DescribeSession {
                session_id,
                respond_to: tx,
            })
            .ok()?;

        rx.await.ok()?
    }

    /// Snapshot of every session.
    ///
    /// Returns an empty vector if communication with the actor fails.
    pub async fn list_sessions(&self) -> Vec<SessionInfo> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(SwitchboardCommand::ListSessions { respond_to: tx })
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Number of currently registered frames (0 if the actor is gone).
    pub async fn frame_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(SwitchboardCommand::FrameCount { respond_to: tx })
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or_default()
    }

    /// Hand a packet to the switchboard for delivery.
    ///
    /// Returns immediately; there is no delivery acknowledgment.
    pub fn deliver(&self, route: Route, packet: Packet) {
        if self
            .sender
            .send(SwitchboardCommand::Deliver {
                route,
                packet: Box::new(packet),
            })
            .is_err()
        {
            debug!("Switchboard closed, packet dropped");
        }
    }

    /// Subscribe to switchboard state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<SwitchboardEvent> {
        self.event_sender.subscribe()
    }

    /// Returns true while the actor is running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_handle() -> (SwitchboardHandle, mpsc::UnboundedReceiver<SwitchboardCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, _event_rx) = broadcast::channel(16);
        (SwitchboardHandle::new(cmd_tx, event_tx), cmd_rx)
    }

    #[tokio::test]
    async fn test_claim_sends_command() {
        let (handle, mut rx) = create_test_handle();

        let cmd_handler = tokio::spawn(async move {
            if let Some(SwitchboardCommand::ClaimSession {
                frame_id,
                session_id,
                respond_to,
            }) = rx.recv().await
            {
                assert_eq!(frame_id, FrameId::new(4));
                assert_eq!(session_id.as_str(), "1");
                let _ = respond_to.send(Ok(true));
                return true;
            }
            false
        });

        let result = handle.claim_session(FrameId::new(4), SessionId::from(1u32)).await;
        assert_eq!(result, Ok(true));
        assert!(cmd_handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_register_channel_closed_error() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        let result = handle.register_frame().await;
        assert!(matches!(result, Err(SwitchboardError::ChannelClosed)));
        assert!(!handle.is_connected());
    }

    #[tokio::test]
    async fn test_queries_degrade_when_closed() {
        let (handle, rx) = create_test_handle();
        drop(rx);

        assert!(handle.describe_session(SessionId::from("x")).await.is_none());
        assert!(handle.list_sessions().await.is_empty());
        assert_eq!(handle.frame_count().await, 0);

        // Fire-and-forget operations must not panic on a closed switchboard
        handle.unregister_frame(FrameId::new(1));
        handle.deliver(
            Route::Broadcast,
            Packet::broadcast("t", serde_json::Value::Null, FrameId::new(1), SessionId::from("x")),
        );
    }

    #[tokio::test]
    async fn test_deliver_preserves_send_order() {
        let (handle, mut rx) = create_test_handle();

        for n in 0..3 {
            handle.deliver(
                Route::to_frame(FrameId::new(2)),
                Packet::unicast("seq", serde_json::json!(n), FrameId::new(1), FrameId::new(2)),
            );
        }

        for n in 0..3 {
            match rx.recv().await {
                Some(SwitchboardCommand::Deliver { packet, .. }) => {
                    assert_eq!(packet.data, serde_json::json!(n));
                }
                other => panic!("expected Deliver, got {other:?}"),
            }
        }
    }
}
