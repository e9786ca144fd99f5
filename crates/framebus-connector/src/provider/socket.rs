//! Unix-socket provider: frames in any process, shared state in a hub.
//!
//! Each registered frame opens its own connection to the hub
//! (`framebusd`), so the hub can identify the frame by its socket and
//! unregister it when the socket closes.
//!
//! Per-frame tasks:
//! - a writer task drains queued lines onto the socket, which keeps
//!   `send_to` synchronous and preserves send order
//! - a reader task routes `deliver` messages to the inbound channel and
//!   completes pending requests by `request_id`
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use framebus_core::{FrameId, Packet, Route, SessionId, SessionInfo};
use framebus_hub::config::DEFAULT_SOCKET_PATH;
use framebus_protocol::{
    encode_line, parse_hub_message, FrameMessage, HubMessage, MessageType, ProtocolVersion, RequestId,
    MAX_MESSAGE_SIZE,
};

use super::{ConnectionProvider, FrameAttachment, FrameLink};
use crate::error::TransportError;

/// Environment variable overriding the hub socket path.
pub const SOCKET_ENV_VAR: &str = "FRAMEBUS_SOCKET";

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the socket provider.
///
/// # Example
///
/// ```rust
/// use framebus_connector::SocketProviderConfig;
///
/// let config = SocketProviderConfig {
///     socket_path: std::path::PathBuf::from("/tmp/my-hub.sock"),
///     display_name: Some("Diagram".into()),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct SocketProviderConfig {
    /// Path to the Unix socket where the hub listens.
    pub socket_path: PathBuf,

    /// Label sent in the handshake; only used in hub logs.
    pub display_name: Option<String>,
}

impl Default for SocketProviderConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            display_name: None,
        }
    }
}

impl SocketProviderConfig {
    /// Default configuration with `FRAMEBUS_SOCKET` applied if set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var(SOCKET_ENV_VAR) {
            config.socket_path = PathBuf::from(path);
        }
        config
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Provider that reaches other frames through a running hub.
#[derive(Debug, Clone)]
pub struct SocketProvider {
    config: SocketProviderConfig,
}

impl SocketProvider {
    #[must_use]
    pub fn new(config: SocketProviderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SocketProviderConfig {
        &self.config
    }

    fn connect_error(&self, reason: impl ToString) -> TransportError {
        TransportError::Connect {
            path: self.config.socket_path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Sends `connect` and waits for the hub to assign a frame id.
    async fn handshake(
        &self,
        reader: &mut BufReader<OwnedReadHalf>,
        writer: &mut OwnedWriteHalf,
    ) -> Result<FrameId, TransportError> {
        let connect = FrameMessage::connect(self.config.display_name.clone());
        let line = encode_line(&connect).map_err(|e| TransportError::Protocol(e.to_string()))?;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| self.connect_error(e))?;

        let mut reply = String::new();
        let bytes_read = reader
            .read_line(&mut reply)
            .await
            .map_err(|e| self.connect_error(e))?;
        if bytes_read == 0 {
            return Err(TransportError::Disconnected);
        }

        match parse_hub_message(&reply).map_err(|e| TransportError::Protocol(e.to_string()))? {
            HubMessage::Connected {
                protocol_version,
                frame_id,
            } => {
                if !ProtocolVersion::CURRENT.is_compatible_with(&protocol_version) {
                    return Err(TransportError::VersionMismatch {
                        local: ProtocolVersion::CURRENT,
                        remote: protocol_version,
                    });
                }
                Ok(frame_id)
            }
            HubMessage::Rejected { reason, .. } => Err(TransportError::Rejected(reason)),
            HubMessage::Error { message, code, .. } => Err(TransportError::Remote { message, code }),
            other => Err(TransportError::Protocol(format!(
                "Unexpected response to connect: {other:?}"
            ))),
        }
    }
}

#[async_trait]
impl ConnectionProvider for SocketProvider {
    async fn register_frame(&self) -> Result<FrameAttachment, TransportError> {
        let stream = UnixStream::connect(&self.config.socket_path)
            .await
            .map_err(|e| self.connect_error(e))?;
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let frame_id = self.handshake(&mut reader, &mut writer).await?;
        info!(
            frame_id = %frame_id,
            socket_path = %self.config.socket_path.display(),
            "Frame attached to hub"
        );

        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let pending = Arc::new(Mutex::new(PendingRequests::default()));

        tokio::spawn(write_loop(writer, outgoing_rx, frame_id));
        tokio::spawn(read_loop(reader, inbound_tx, Arc::clone(&pending), frame_id));

        Ok(FrameAttachment {
            link: Box::new(SocketLink {
                frame_id,
                outgoing,
                pending,
                next_request: AtomicU64::new(1),
                detached: AtomicBool::new(false),
            }),
            inbound,
        })
    }
}

// ============================================================================
// Link
// ============================================================================

/// Requests awaiting a hub reply.
#[derive(Default)]
struct PendingRequests {
    /// Set once the reader has stopped; no new waiters are accepted.
    closed: bool,
    waiters: HashMap<RequestId, oneshot::Sender<HubMessage>>,
}

/// An encoded line waiting for the writer task.
struct Outgoing {
    line: String,
    /// The writer stops after this line.
    last: bool,
}

struct SocketLink {
    frame_id: FrameId,
    outgoing: mpsc::UnboundedSender<Outgoing>,
    pending: Arc<Mutex<PendingRequests>>,
    next_request: AtomicU64,
    detached: AtomicBool,
}

impl SocketLink {
    /// Encodes a message and hands it to the writer task.
    ///
    /// Lines the hub would refuse are rejected here, so one oversized
    /// packet never reaches the socket.
    fn enqueue(&self, message: FrameMessage) -> Result<(), TransportError> {
        let last = matches!(message.message, MessageType::Disconnect);
        let line = encode_line(&message).map_err(|e| TransportError::Protocol(e.to_string()))?;
        if line.trim_end().len() > MAX_MESSAGE_SIZE {
            return Err(TransportError::Protocol(format!(
                "Message too large ({} bytes, max: {MAX_MESSAGE_SIZE})",
                line.len()
            )));
        }
        self.outgoing
            .send(Outgoing { line, last })
            .map_err(|_| TransportError::Disconnected)
    }

    /// Queues a request and waits for the reply with the same id.
    async fn request(
        &self,
        build: impl FnOnce(RequestId) -> FrameMessage,
    ) -> Result<HubMessage, TransportError> {
        let request_id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self.pending.lock().await;
            if pending.closed {
                return Err(TransportError::Disconnected);
            }
            pending.waiters.insert(request_id, tx);
        }

        if let Err(e) = self.enqueue(build(request_id)) {
            self.pending.lock().await.waiters.remove(&request_id);
            return Err(e);
        }

        let reply = rx.await.map_err(|_| TransportError::Disconnected)?;
        match reply {
            HubMessage::Error { message, code, .. } => Err(TransportError::Remote { message, code }),
            other => Ok(other),
        }
    }
}

fn unexpected(reply: HubMessage) -> TransportError {
    TransportError::Protocol(format!("Unexpected reply: {reply:?}"))
}

#[async_trait]
impl FrameLink for SocketLink {
    fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    async fn claim_session(&self, session_id: SessionId) -> Result<bool, TransportError> {
        match self
            .request(|request_id| FrameMessage::claim_session(request_id, session_id))
            .await?
        {
            HubMessage::SessionClaimed { claimed, .. } => Ok(claimed),
            other => Err(unexpected(other)),
        }
    }

    async fn join_session(&self, session_id: SessionId, display_name: String) -> Result<bool, TransportError> {
        match self
            .request(|request_id| FrameMessage::join_session(request_id, session_id, display_name))
            .await?
        {
            HubMessage::SessionJoined { joined, .. } => Ok(joined),
            other => Err(unexpected(other)),
        }
    }

    async fn describe_session(&self, session_id: SessionId) -> Result<Option<SessionInfo>, TransportError> {
        match self
            .request(|request_id| FrameMessage::describe_session(request_id, session_id))
            .await?
        {
            HubMessage::SessionDescribed { session, .. } => Ok(session),
            other => Err(unexpected(other)),
        }
    }

    fn send_to(&self, route: Route, packet: Packet) {
        if let Err(e) = self.enqueue(FrameMessage::send(route, packet)) {
            debug!(frame_id = %self.frame_id, error = %e, "Packet dropped");
        }
    }

    fn detach(&self) {
        if self.detached.swap(true, Ordering::AcqRel) {
            return;
        }
        // The writer stops after flushing the disconnect; the hub then
        // closes its side and the reader sees EOF.
        let _ = self.enqueue(FrameMessage::disconnect());
        debug!(frame_id = %self.frame_id, "Frame detached from hub");
    }
}

impl Drop for SocketLink {
    fn drop(&mut self) {
        self.detach();
    }
}

// ============================================================================
// Socket Tasks
// ============================================================================

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    frame_id: FrameId,
) {
    while let Some(Outgoing { line, last }) = outgoing.recv().await {
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = written {
            debug!(frame_id = %frame_id, error = %e, "Hub write failed");
            break;
        }
        if last {
            break;
        }
    }

    let _ = writer.shutdown().await;
}

async fn read_loop(
    mut reader: BufReader<OwnedReadHalf>,
    inbound: mpsc::UnboundedSender<Packet>,
    pending: Arc<Mutex<PendingRequests>>,
    frame_id: FrameId,
) {
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!(frame_id = %frame_id, "Hub closed connection");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                debug!(frame_id = %frame_id, error = %e, "Hub read failed");
                break;
            }
        }

        let message = match parse_hub_message(&line) {
            Ok(message) => message,
            Err(e) => {
                warn!(frame_id = %frame_id, error = %e, "Malformed message from hub");
                continue;
            }
        };

        match message {
            HubMessage::Deliver { packet } => {
                // Receiver gone means the connector was disposed; keep
                // draining so replies still reach pending requests.
                let _ = inbound.send(packet);
            }
            HubMessage::Pong { seq } => {
                debug!(frame_id = %frame_id, seq, "Pong from hub");
            }
            other => match other.request_id() {
                Some(request_id) => {
                    let waiter = pending.lock().await.waiters.remove(&request_id);
                    match waiter {
                        Some(tx) => {
                            let _ = tx.send(other);
                        }
                        None => debug!(frame_id = %frame_id, request_id, "Reply for unknown request"),
                    }
                }
                None => warn!(frame_id = %frame_id, reply = ?other, "Unsolicited message from hub"),
            },
        }
    }

    let mut pending = pending.lock().await;
    pending.closed = true;
    // Dropping the senders fails every outstanding request with Disconnected
    pending.waiters.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SocketProviderConfig::default();
        assert_eq!(config.socket_path, PathBuf::from(DEFAULT_SOCKET_PATH));
        assert!(config.display_name.is_none());
    }

    #[tokio::test]
    async fn test_connect_error_names_socket() {
        let dir = tempfile::tempdir().unwrap();
        let provider = SocketProvider::new(SocketProviderConfig {
            socket_path: dir.path().join("missing.sock"),
            display_name: None,
        });

        let err = match provider.register_frame().await {
            Err(e) => e,
            Ok(_) => panic!("no hub is listening"),
        };
        assert!(matches!(err, TransportError::Connect { .. }));
        assert!(err.to_string().contains("missing.sock"));
    }
}
