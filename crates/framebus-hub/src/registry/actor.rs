//! Switchboard actor - owns all frame and session state and processes commands.
//!
//! The SwitchboardActor is the single owner of provider state. It receives
//! commands via an mpsc channel and publishes events via broadcast.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel send failures are logged but don't panic

use std::collections::BTreeMap;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use framebus_core::{FrameId, Packet, Route, SessionId, SessionInfo};

use super::commands::{SwitchboardCommand, SwitchboardError, SwitchboardEvent};
use super::sessions::{ClaimOutcome, JoinOutcome, SessionTable};
use crate::config::SwitchboardConfig;

/// The switchboard actor - owns all provider state.
///
/// Processes commands sequentially on a single task. Because delivery is
/// just another command, packets from one sender reach each receiver in
/// the order they were sent.
///
/// # Ownership
///
/// The actor owns:
/// - `frames`: inbound channel of every registered frame, keyed by id
/// - `sessions`: ownership and membership of every session
/// - `next_frame_id`: counter frame ids are allocated from (never reused)
pub struct SwitchboardActor {
    /// Command receiver
    receiver: mpsc::UnboundedReceiver<SwitchboardCommand>,

    /// Registered frames and their inbound channels
    frames: BTreeMap<FrameId, mpsc::UnboundedSender<Packet>>,

    sessions: SessionTable,

    next_frame_id: u64,

    config: SwitchboardConfig,

    /// Event publisher for observers
    event_publisher: broadcast::Sender<SwitchboardEvent>,
}

impl SwitchboardActor {
    /// Creates a new switchboard actor.
    pub fn new(
        receiver: mpsc::UnboundedReceiver<SwitchboardCommand>,
        event_publisher: broadcast::Sender<SwitchboardEvent>,
        config: SwitchboardConfig,
    ) -> Self {
        Self {
            receiver,
            frames: BTreeMap::new(),
            sessions: SessionTable::new(config.max_sessions),
            next_frame_id: 1,
            config,
            event_publisher,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until every handle has been dropped.
    pub async fn run(mut self) {
        info!(
            max_frames = self.config.max_frames,
            max_sessions = self.config.max_sessions,
            "Switchboard starting"
        );

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(
            frames = self.frames.len(),
            sessions = self.sessions.len(),
            "Switchboard stopped"
        );
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: SwitchboardCommand) {
        match cmd {
            SwitchboardCommand::RegisterFrame { respond_to } => {
                let result = self.handle_register_frame();
                // Ignore send error - caller may have dropped the receiver
                let _ = respond_to.send(result);
            }
            SwitchboardCommand::UnregisterFrame { frame_id } => {
                self.handle_unregister_frame(frame_id);
            }
            SwitchboardCommand::ClaimSession {
                frame_id,
                session_id,
                respond_to,
            } => {
                let result = self.handle_claim_session(frame_id, session_id);
                let _ = respond_to.send(result);
            }
            SwitchboardCommand::JoinSession {
                frame_id,
                session_id,
                display_name,
                respond_to,
            } => {
                let result = self.handle_join_session(frame_id, session_id, display_name);
                let _ = respond_to.send(result);
            }
            SwitchboardCommand::DescribeSession {
                session_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.sessions.describe(&session_id));
            }
            SwitchboardCommand::ListSessions { respond_to } => {
                let _ = respond_to.send(self.handle_list_sessions());
            }
            SwitchboardCommand::FrameCount { respond_to } => {
                let _ = respond_to.send(self.frames.len());
            }
            SwitchboardCommand::Deliver { route, packet } => {
                self.handle_deliver(&route, *packet);
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_register_frame(
        &mut self,
    ) -> Result<(FrameId, mpsc::UnboundedReceiver<Packet>), SwitchboardError> {
        if self.frames.len() >= self.config.max_frames {
            warn!(
                current = self.frames.len(),
                max = self.config.max_frames,
                "Switchboard is full, rejecting frame"
            );
            return Err(SwitchboardError::TooManyFrames {
                max: self.config.max_frames,
            });
        }

        let frame_id = FrameId::new(self.next_frame_id);
        self.next_frame_id = self.next_frame_id.saturating_add(1);

        let (tx, rx) = mpsc::unbounded_channel();
        self.frames.insert(frame_id, tx);

        info!(
            frame_id = %frame_id,
            total_frames = self.frames.len(),
            "Frame registered"
        );

        // Publish event (ignore if no subscribers)
        let _ = self
            .event_publisher
            .send(SwitchboardEvent::FrameRegistered { frame_id });

        Ok((frame_id, rx))
    }

    fn handle_unregister_frame(&mut self, frame_id: FrameId) {
        if self.frames.remove(&frame_id).is_none() {
            debug!(frame_id = %frame_id, "Unregister for unknown frame ignored");
            return;
        }

        info!(
            frame_id = %frame_id,
            total_frames = self.frames.len(),
            "Frame unregistered"
        );

        let _ = self
            .event_publisher
            .send(SwitchboardEvent::FrameUnregistered { frame_id });
    }

    fn handle_claim_session(
        &mut self,
        frame_id: FrameId,
        session_id: SessionId,
    ) -> Result<bool, SwitchboardError> {
        let outcome = self.sessions.claim(frame_id, &session_id)?;

        match outcome {
            ClaimOutcome::Claimed => {
                info!(session_id = %session_id, owner = %frame_id, "Session claimed");
                let _ = self.event_publisher.send(SwitchboardEvent::SessionClaimed {
                    session_id,
                    owner: frame_id,
                });
            }
            ClaimOutcome::AlreadyOwner => {
                debug!(session_id = %session_id, owner = %frame_id, "Session re-claimed by its owner");
            }
            ClaimOutcome::OwnedBy(owner) => {
                debug!(
                    session_id = %session_id,
                    frame_id = %frame_id,
                    owner = %owner,
                    "Session already owned, claim refused"
                );
            }
        }

        Ok(outcome.succeeded())
    }

    fn handle_join_session(
        &mut self,
        frame_id: FrameId,
        session_id: SessionId,
        display_name: String,
    ) -> bool {
        let outcome = self.sessions.join(frame_id, &session_id, &display_name);

        if outcome == JoinOutcome::NoOwner {
            debug!(
                session_id = %session_id,
                frame_id = %frame_id,
                "Join refused, session has no owner"
            );
            return false;
        }

        info!(
            session_id = %session_id,
            frame_id = %frame_id,
            display_name = %display_name,
            rejoin = outcome == JoinOutcome::AlreadyMember,
            "Frame joined session"
        );
        let _ = self.event_publisher.send(SwitchboardEvent::SessionJoined {
            session_id,
            frame_id,
            display_name,
        });
        true
    }

    fn handle_list_sessions(&self) -> Vec<SessionInfo> {
        self.sessions.list()
    }

    /// Pushes the packet to every registered frame on the route.
    ///
    /// Unknown destinations and frames whose inbound side is gone are
    /// skipped without error.
    fn handle_deliver(&mut self, route: &Route, packet: Packet) {
        let sender = packet.sender_frame_id;
        let mut delivered = 0usize;

        for (frame_id, inbound) in &self.frames {
            if !route.includes(*frame_id, sender) {
                continue;
            }
            if inbound.send(packet.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!(frame_id = %frame_id, "Inbound channel closed, packet dropped");
            }
        }

        debug!(
            topic = %packet.topic,
            sender = %sender,
            delivered,
            "Packet routed"
        );
    }
}
