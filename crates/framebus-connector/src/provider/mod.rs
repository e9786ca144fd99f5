//! Connection providers.
//!
//! A provider is the only component that knows how packets physically
//! travel between frames. Connectors talk to it through two capability
//! traits:
//! - [`ConnectionProvider`] registers frames
//! - [`FrameLink`] is one frame's endpoint: session requests and sends
//!
//! Inbound packets arrive on the `inbound` channel handed out with the
//! link. Delivery is best-effort, asynchronous, and ordered per sender.
//!
//! Two implementations share these semantics:
//! - [`InMemoryProvider`] - in-process switchboard, used by tests and by
//!   applications whose frames live in one process
//! - [`SocketProvider`] - one Unix-socket connection per frame to a running hub

use async_trait::async_trait;
use tokio::sync::mpsc;

use framebus_core::{FrameId, Packet, Route, SessionId, SessionInfo};

use crate::error::TransportError;

mod memory;
mod socket;

pub use memory::InMemoryProvider;
pub use socket::{SocketProvider, SocketProviderConfig, SOCKET_ENV_VAR};

/// A freshly registered frame.
pub struct FrameAttachment {
    /// Endpoint for requests and sends
    pub link: Box<dyn FrameLink>,

    /// Every packet the provider delivers to this frame, in arrival order
    pub inbound: mpsc::UnboundedReceiver<Packet>,
}

/// Registers frames with a shared transport.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Allocates a new frame id and opens its inbound channel.
    async fn register_frame(&self) -> Result<FrameAttachment, TransportError>;
}

/// One frame's endpoint on a provider.
#[async_trait]
pub trait FrameLink: Send + Sync {
    /// Identity assigned at registration.
    fn frame_id(&self) -> FrameId;

    /// Claims ownership of a session. `Ok(false)` if another frame owns it.
    async fn claim_session(&self, session_id: SessionId) -> Result<bool, TransportError>;

    /// Joins an owned session. `Ok(false)` if nobody owns it yet.
    async fn join_session(&self, session_id: SessionId, display_name: String) -> Result<bool, TransportError>;

    /// Snapshot of a session, if it exists.
    async fn describe_session(&self, session_id: SessionId) -> Result<Option<SessionInfo>, TransportError>;

    /// Fire-and-forget send; never blocks and never reports delivery.
    fn send_to(&self, route: Route, packet: Packet);

    /// Stops delivery to this frame. Idempotent.
    fn detach(&self);
}
