//! Connection handler for individual frame connections.
//!
//! Each frame connection gets its own `ConnectionHandler` that:
//! - Performs protocol version negotiation and registers the frame
//! - Parses incoming messages and routes them to the switchboard
//! - Forwards packets addressed to the frame back over the socket
//! - Unregisters the frame when the connection ends
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Connection errors are logged and result in graceful disconnect

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use framebus_core::{FrameId, Packet};
use framebus_protocol::{
    encode_line, parse_frame_message, FrameMessage, HubMessage, MessageType, ParseError,
    ProtocolVersion, VersionError,
};

use crate::registry::{SwitchboardError, SwitchboardHandle};

/// Writer shared between the request loop and the packet forwarder
pub type FrameWriter = Arc<Mutex<BufWriter<OwnedWriteHalf>>>;

/// Time a new connection has to send its `connect` message
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Write timeout (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// What the request loop should do after a message.
enum Flow {
    Continue,
    Disconnect,
}

/// Newline-delimited reader that never buffers more than one maximum-size
/// line. An over-long line is reported once and then skipped up to its
/// terminating newline.
struct LineReader {
    inner: OwnedReadHalf,
    codec: LinesCodec,
    buffer: BytesMut,
}

impl LineReader {
    fn new(inner: OwnedReadHalf, max_length: usize) -> Self {
        Self {
            inner,
            codec: LinesCodec::new_with_max_length(max_length),
            buffer: BytesMut::new(),
        }
    }

    /// Next complete line, `Ok(None)` at end of stream.
    async fn next_line(&mut self) -> Result<Option<String>, LinesCodecError> {
        loop {
            if let Some(line) = self.codec.decode(&mut self.buffer)? {
                return Ok(Some(line));
            }
            if self.inner.read_buf(&mut self.buffer).await? == 0 {
                return self.codec.decode_eof(&mut self.buffer);
            }
        }
    }
}

/// Connection handler for a single frame.
pub struct ConnectionHandler {
    reader: LineReader,

    writer: FrameWriter,

    switchboard: SwitchboardHandle,

    max_message_size: usize,

    cancel_token: CancellationToken,

    /// Assigned after a successful handshake
    frame_id: Option<FrameId>,

    connection_number: u64,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `reader` - Read half of the Unix stream
    /// * `writer` - Write half of the Unix stream
    /// * `switchboard` - Shared frame/session state
    /// * `max_message_size` - Longest accepted line in bytes
    /// * `cancel_token` - Stops the handler on hub shutdown
    /// * `connection_number` - Unique number for this connection
    pub fn new(
        reader: OwnedReadHalf,
        writer: OwnedWriteHalf,
        switchboard: SwitchboardHandle,
        max_message_size: usize,
        cancel_token: CancellationToken,
        connection_number: u64,
    ) -> Self {
        Self {
            reader: LineReader::new(reader, max_message_size),
            writer: Arc::new(Mutex::new(BufWriter::new(writer))),
            switchboard,
            max_message_size,
            cancel_token,
            frame_id: None,
            connection_number,
        }
    }

    /// Frame id assigned to this connection, once the handshake succeeded.
    pub fn frame_id(&self) -> Option<FrameId> {
        self.frame_id
    }

    /// Runs the connection handler.
    ///
    /// Performs the handshake, then processes requests until the frame
    /// disconnects or the hub shuts down. Returns the frame id that was
    /// served, if the handshake succeeded.
    pub async fn run(mut self) -> Option<FrameId> {
        debug!(connection = self.connection_number, "New frame connection");

        let (frame_id, inbound) = match self.handle_handshake().await {
            Ok(registered) => registered,
            Err(e) => {
                warn!(
                    connection = self.connection_number,
                    error = %e,
                    "Handshake failed"
                );
                return None;
            }
        };

        let forwarder = spawn_forwarder(Arc::clone(&self.writer), inbound, frame_id);

        if let Err(e) = self.process_messages(frame_id).await {
            debug!(frame_id = %frame_id, error = %e, "Connection closed");
        }

        forwarder.abort();
        self.switchboard.unregister_frame(frame_id);

        info!(frame_id = %frame_id, "Frame disconnected");
        Some(frame_id)
    }

    /// Expects a `connect` message, validates the protocol version and
    /// registers the frame with the switchboard.
    async fn handle_handshake(
        &mut self,
    ) -> Result<(FrameId, mpsc::UnboundedReceiver<Packet>), ConnectionError> {
        let msg = timeout(HANDSHAKE_TIMEOUT, self.read_message())
            .await
            .map_err(|_| ConnectionError::Timeout)??;

        if let Err(e) = ProtocolVersion::require_compatible(&msg.protocol_version) {
            warn!(
                frame_version = %msg.protocol_version,
                hub_version = %ProtocolVersion::CURRENT,
                "Protocol version mismatch"
            );
            self.send_message(HubMessage::rejected(&e.to_string())).await?;
            return Err(e.into());
        }

        let display_name = match msg.message {
            MessageType::Connect { display_name } => display_name,
            other => {
                self.send_message(HubMessage::error("Expected connect message for handshake"))
                    .await?;
                return Err(ConnectionError::UnexpectedMessage(format!("{other:?}")));
            }
        };

        let (frame_id, inbound) = match self.switchboard.register_frame().await {
            Ok(registered) => registered,
            Err(e) => {
                self.send_message(HubMessage::rejected(&e.to_string())).await?;
                return Err(e.into());
            }
        };

        if let Err(e) = self.send_message(HubMessage::connected(frame_id)).await {
            self.switchboard.unregister_frame(frame_id);
            return Err(e);
        }

        self.frame_id = Some(frame_id);
        info!(
            frame_id = %frame_id,
            display_name = ?display_name,
            connection = self.connection_number,
            "Frame connected"
        );
        Ok((frame_id, inbound))
    }

    /// Reads and handles requests until EOF, `disconnect`, or cancellation.
    async fn process_messages(&mut self, frame_id: FrameId) -> Result<(), ConnectionError> {
        let cancel = self.cancel_token.clone();

        loop {
            let msg = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(frame_id = %frame_id, "Hub shutting down, closing frame connection");
                    return Ok(());
                }

                result = self.read_message() => match result {
                    Ok(msg) => msg,
                    Err(ConnectionError::Eof) => {
                        debug!(frame_id = %frame_id, "Frame sent EOF");
                        return Ok(());
                    }
                    Err(ConnectionError::Parse(reason)) => {
                        warn!(frame_id = %frame_id, error = %reason, "Malformed message from frame");
                        self.send_message(HubMessage::error(&reason)).await?;
                        continue;
                    }
                    Err(e @ ConnectionError::MessageTooLarge { .. }) => {
                        warn!(frame_id = %frame_id, error = %e, "Oversized message from frame dropped");
                        self.send_message(HubMessage::Error {
                            message: e.to_string(),
                            request_id: None,
                            code: Some("message_too_large".to_string()),
                        })
                        .await?;
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            };

            if let Flow::Disconnect = self.handle_message(frame_id, msg).await? {
                debug!(frame_id = %frame_id, "Frame requested disconnect");
                return Ok(());
            }
        }
    }

    /// Handles a single frame request.
    async fn handle_message(&mut self, frame_id: FrameId, msg: FrameMessage) -> Result<Flow, ConnectionError> {
        match msg.message {
            MessageType::Connect { .. } => {
                self.send_message(HubMessage::error("Already connected")).await?;
            }

            MessageType::ClaimSession {
                request_id,
                session_id,
            } => {
                let reply = match self.switchboard.claim_session(frame_id, session_id).await {
                    Ok(claimed) => HubMessage::SessionClaimed { request_id, claimed },
                    Err(e) => switchboard_error_reply(request_id, &e),
                };
                self.send_message(reply).await?;
            }

            MessageType::JoinSession {
                request_id,
                session_id,
                display_name,
            } => {
                let reply = match self
                    .switchboard
                    .join_session(frame_id, session_id, display_name)
                    .await
                {
                    Ok(joined) => HubMessage::SessionJoined { request_id, joined },
                    Err(e) => switchboard_error_reply(request_id, &e),
                };
                self.send_message(reply).await?;
            }

            MessageType::DescribeSession {
                request_id,
                session_id,
            } => {
                let session = self.switchboard.describe_session(session_id).await;
                self.send_message(HubMessage::SessionDescribed { request_id, session })
                    .await?;
            }

            MessageType::Send { route, mut packet } => {
                if packet.sender_frame_id != frame_id {
                    warn!(
                        frame_id = %frame_id,
                        claimed_sender = %packet.sender_frame_id,
                        "Packet sender does not match connection, rewriting"
                    );
                    packet.sender_frame_id = frame_id;
                }
                self.switchboard.deliver(route, packet);
            }

            MessageType::Ping { seq } => {
                self.send_message(HubMessage::pong(seq)).await?;
            }

            MessageType::Disconnect => return Ok(Flow::Disconnect),
        }

        Ok(Flow::Continue)
    }

    /// Reads one line and parses it as a frame message.
    async fn read_message(&mut self) -> Result<FrameMessage, ConnectionError> {
        let max = self.max_message_size;
        let line = match self.reader.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return Err(ConnectionError::Eof),
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                return Err(ConnectionError::MessageTooLarge { max })
            }
            Err(LinesCodecError::Io(e)) => return Err(ConnectionError::Io(e.to_string())),
        };

        let msg = parse_frame_message(&line, max).map_err(|e| match e {
            ParseError::TooLarge { max, .. } => ConnectionError::MessageTooLarge { max },
            other => ConnectionError::Parse(other.to_string()),
        })?;

        debug!(
            frame_id = ?self.frame_id,
            message_type = ?std::mem::discriminant(&msg.message),
            "Received message"
        );

        Ok(msg)
    }

    async fn send_message(&self, msg: HubMessage) -> Result<(), ConnectionError> {
        write_message(&self.writer, &msg).await
    }
}

fn switchboard_error_reply(request_id: u64, err: &SwitchboardError) -> HubMessage {
    HubMessage::request_error(request_id, &err.to_string(), err.code())
}

/// Serializes and writes one message, bounded by the write timeout.
async fn write_message(writer: &FrameWriter, msg: &HubMessage) -> Result<(), ConnectionError> {
    let line = encode_line(msg).map_err(|e| ConnectionError::Parse(e.to_string()))?;

    let mut writer = writer.lock().await;

    match timeout(WRITE_TIMEOUT, async {
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok::<(), std::io::Error>(())
    })
    .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ConnectionError::Io(e.to_string())),
        Err(_) => Err(ConnectionError::WriteTimeout),
    }
}

/// Drains the frame's inbound channel onto the socket.
fn spawn_forwarder(
    writer: FrameWriter,
    mut inbound: mpsc::UnboundedReceiver<Packet>,
    frame_id: FrameId,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(packet) = inbound.recv().await {
            if let Err(e) = write_message(&writer, &HubMessage::deliver(packet)).await {
                debug!(frame_id = %frame_id, error = %e, "Failed to forward packet");
                break;
            }
        }
    })
}

/// Errors that end a frame connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Protocol version mismatch: {0}")]
    Version(#[from] VersionError),

    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection closed")]
    Eof,

    #[error("Handshake timeout")]
    Timeout,

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Message too large (max: {max} bytes)")]
    MessageTooLarge { max: usize },

    #[error("Switchboard error: {0}")]
    Switchboard(#[from] SwitchboardError),
}
