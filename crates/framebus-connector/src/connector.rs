//! The per-frame messaging facade.
//!
//! A [`WindowConnector`] owns one frame on a provider. It tracks which
//! sessions the frame belongs to, scopes outgoing broadcasts to the current
//! session, and runs a dispatch task that filters inbound packets and fans
//! them out to topic receivers.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()`.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use framebus_core::{FrameId, Packet, Route, SessionId, SessionInfo, SessionState};

use crate::error::Result;
use crate::provider::{ConnectionProvider, FrameLink};
use crate::router::{TopicReceiver, TopicRouter};

/// State shared between the facade and its dispatch task.
#[derive(Debug, Default)]
struct ConnectorState {
    session: SessionState,

    /// Every session this frame owns or has joined
    memberships: HashSet<SessionId>,

    topics: TopicRouter,

    closed: bool,
}

type SharedState = Arc<Mutex<ConnectorState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, ConnectorState> {
    // Critical sections never panic, so a poisoned lock still holds valid state
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One frame's view of the bus.
///
/// # Usage
///
/// ```ignore
/// let main = WindowConnector::connect(&provider).await?;
/// main.create_session(1u32).await?;
///
/// let mut replies = main.receiver("reply");
/// main.broadcast("select", &node_id)?;
/// while let Some(packet) = replies.recv().await {
///     // Handle packet
/// }
/// ```
pub struct WindowConnector {
    frame_id: FrameId,
    link: Box<dyn FrameLink>,
    state: SharedState,
    dispatch: JoinHandle<()>,
}

impl WindowConnector {
    /// Registers a new frame with `provider` and starts inbound dispatch.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::Transport` if the provider cannot register
    /// the frame (hub unreachable, frame limit reached).
    pub async fn connect<P>(provider: &P) -> Result<Self>
    where
        P: ConnectionProvider + ?Sized,
    {
        let attachment = provider.register_frame().await?;
        let frame_id = attachment.link.frame_id();
        let state: SharedState = Arc::default();

        let dispatch = tokio::spawn(dispatch_inbound(frame_id, attachment.inbound, Arc::clone(&state)));
        info!(frame_id = %frame_id, "Window connector ready");

        Ok(Self {
            frame_id,
            link: attachment.link,
            state,
            dispatch,
        })
    }

    /// Identity of this frame; the address other frames unicast to.
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Claims ownership of `session_id`.
    ///
    /// Returns `Ok(false)` if another frame already owns the session. A failed
    /// claim does not make this frame a member.
    pub async fn create_session(&self, session_id: impl Into<SessionId>) -> Result<bool> {
        let session_id = session_id.into();
        let claimed = self.link.claim_session(session_id.clone()).await?;

        if claimed {
            let mut state = lock(&self.state);
            state.memberships.insert(session_id.clone());
            state.session = SessionState::Owner(session_id.clone());
            info!(frame_id = %self.frame_id, session_id = %session_id, "Session created");
        } else {
            debug!(frame_id = %self.frame_id, session_id = %session_id, "Session already owned");
        }
        Ok(claimed)
    }

    /// Joins a session that already has an owner.
    ///
    /// Returns `Ok(false)` if nobody owns `session_id` yet. `display_name` is
    /// descriptive metadata visible through [`describe_session`](Self::describe_session).
    pub async fn join_session(
        &self,
        session_id: impl Into<SessionId>,
        display_name: impl Into<String>,
    ) -> Result<bool> {
        let session_id = session_id.into();
        let joined = self
            .link
            .join_session(session_id.clone(), display_name.into())
            .await?;

        if joined {
            let mut state = lock(&self.state);
            state.memberships.insert(session_id.clone());
            state.session = match &state.session {
                SessionState::Owner(owned) if *owned == session_id => SessionState::Owner(session_id.clone()),
                _ => SessionState::Member(session_id.clone()),
            };
            info!(frame_id = %self.frame_id, session_id = %session_id, "Session joined");
        } else {
            debug!(frame_id = %self.frame_id, session_id = %session_id, "Session has no owner yet");
        }
        Ok(joined)
    }

    /// Sends `data` on `topic` to every other member of the current session.
    ///
    /// Fire-and-forget. Nothing is sent while the connector is unbound.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::Payload` if `data` cannot be serialized.
    pub fn broadcast<T>(&self, topic: &str, data: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let data = Packet::encode_data(topic, data)?;

        let Some(session_id) = lock(&self.state).session.current().cloned() else {
            debug!(frame_id = %self.frame_id, topic, "Broadcast skipped, no session");
            return Ok(());
        };

        debug!(frame_id = %self.frame_id, session_id = %session_id, topic, "Broadcast");
        self.link
            .send_to(Route::Broadcast, Packet::broadcast(topic, data, self.frame_id, session_id));
        Ok(())
    }

    /// Sends `data` on `topic` to exactly one frame, regardless of sessions.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::Payload` if `data` cannot be serialized.
    pub fn unicast<T>(&self, topic: &str, data: &T, destination: FrameId) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let data = Packet::encode_data(topic, data)?;

        debug!(frame_id = %self.frame_id, destination = %destination, topic, "Unicast");
        self.link.send_to(
            Route::to_frame(destination),
            Packet::unicast(topic, data, self.frame_id, destination),
        );
        Ok(())
    }

    /// Subscribes to inbound packets on `topic`.
    ///
    /// Only packets arriving after this call are seen.
    pub fn receiver(&self, topic: impl Into<String>) -> TopicReceiver {
        lock(&self.state).topics.subscribe(topic)
    }

    pub fn session_state(&self) -> SessionState {
        lock(&self.state).session.clone()
    }

    /// Returns true if this frame owns or has joined `session_id`.
    pub fn is_member(&self, session_id: &SessionId) -> bool {
        lock(&self.state).memberships.contains(session_id)
    }

    /// Ownership and member list of a session, `None` if nobody created it.
    pub async fn describe_session(&self, session_id: impl Into<SessionId>) -> Result<Option<SessionInfo>> {
        Ok(self.link.describe_session(session_id.into()).await?)
    }

    /// Disposes the connector: stops dispatch, detaches the frame and ends
    /// every topic receiver.
    pub fn close(self) {
        self.shutdown();
    }

    fn shutdown(&self) {
        {
            let mut state = lock(&self.state);
            if state.closed {
                return;
            }
            state.closed = true;
            state.topics.close();
        }

        self.dispatch.abort();
        self.link.detach();
        info!(frame_id = %self.frame_id, "Window connector closed");
    }
}

impl Drop for WindowConnector {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WindowConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowConnector")
            .field("frame_id", &self.frame_id)
            .field("session", &self.session_state())
            .finish_non_exhaustive()
    }
}

/// Filters inbound packets and hands them to topic receivers.
async fn dispatch_inbound(frame_id: FrameId, mut inbound: mpsc::UnboundedReceiver<Packet>, state: SharedState) {
    while let Some(packet) = inbound.recv().await {
        let mut guard = lock(&state);
        if guard.closed {
            break;
        }
        if !accepts(frame_id, &guard.memberships, &packet) {
            continue;
        }
        let delivered = guard.topics.publish(&packet);
        debug!(
            frame_id = %frame_id,
            sender = %packet.sender_frame_id,
            topic = %packet.topic,
            receivers = delivered,
            "Packet dispatched"
        );
    }
}

/// Membership and self-delivery filter applied before topic fan-out.
fn accepts(frame_id: FrameId, memberships: &HashSet<SessionId>, packet: &Packet) -> bool {
    if packet.sender_frame_id == frame_id {
        return false;
    }
    match (&packet.destination_frame_id, &packet.session_id) {
        (Some(destination), _) => *destination == frame_id,
        (None, Some(session_id)) => memberships.contains(session_id),
        (None, None) => false,
    }
}
