//! In-process provider backed by a switchboard actor.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::debug;

use framebus_core::{FrameId, Packet, Route, SessionId, SessionInfo};
use framebus_hub::registry::{spawn_switchboard, SwitchboardHandle};
use framebus_hub::SwitchboardConfig;

use super::{ConnectionProvider, FrameAttachment, FrameLink};
use crate::error::TransportError;

/// Provider whose frames all live in this process.
///
/// Clones share one switchboard, so every connector built from a clone
/// sees the same frames and sessions. Packets are queued on the
/// switchboard and delivered on a later task poll, never synchronously
/// inside `send_to`.
#[derive(Clone)]
pub struct InMemoryProvider {
    switchboard: SwitchboardHandle,
}

impl InMemoryProvider {
    /// Spawns a switchboard with default limits on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn() -> Self {
        Self::with_config(SwitchboardConfig::default())
    }

    /// Spawns a switchboard with the given limits on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn with_config(config: SwitchboardConfig) -> Self {
        Self {
            switchboard: spawn_switchboard(config),
        }
    }

    /// Wraps an existing switchboard, e.g. one also served by a hub.
    pub fn from_switchboard(switchboard: SwitchboardHandle) -> Self {
        Self { switchboard }
    }

    /// The switchboard behind this provider.
    pub fn switchboard(&self) -> &SwitchboardHandle {
        &self.switchboard
    }
}

#[async_trait]
impl ConnectionProvider for InMemoryProvider {
    async fn register_frame(&self) -> Result<FrameAttachment, TransportError> {
        let (frame_id, inbound) = self.switchboard.register_frame().await?;
        debug!(frame_id = %frame_id, "In-memory frame registered");

        Ok(FrameAttachment {
            link: Box::new(MemoryLink {
                frame_id,
                switchboard: self.switchboard.clone(),
                detached: AtomicBool::new(false),
            }),
            inbound,
        })
    }
}

struct MemoryLink {
    frame_id: FrameId,
    switchboard: SwitchboardHandle,
    detached: AtomicBool,
}

#[async_trait]
impl FrameLink for MemoryLink {
    fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    async fn claim_session(&self, session_id: SessionId) -> Result<bool, TransportError> {
        Ok(self.switchboard.claim_session(self.frame_id, session_id).await?)
    }

    async fn join_session(&self, session_id: SessionId, display_name: String) -> Result<bool, TransportError> {
        Ok(self
            .switchboard
            .join_session(self.frame_id, session_id, display_name)
            .await?)
    }

    async fn describe_session(&self, session_id: SessionId) -> Result<Option<SessionInfo>, TransportError> {
        if !self.switchboard.is_connected() {
            return Err(TransportError::Disconnected);
        }
        Ok(self.switchboard.describe_session(session_id).await)
    }

    fn send_to(&self, route: Route, packet: Packet) {
        self.switchboard.deliver(route, packet);
    }

    fn detach(&self) {
        if !self.detached.swap(true, Ordering::AcqRel) {
            self.switchboard.unregister_frame(self.frame_id);
        }
    }
}
