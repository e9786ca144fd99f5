//! Unix socket server exposing a switchboard to frames in other processes.
//!
//! The server:
//! - Listens on a Unix socket for frame connections
//! - Spawns a ConnectionHandler for each frame
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    HubServer    │
//! │                 │
//! │  UnixListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌───────────────────┐
//! │ConnectionHandler│────▶│ SwitchboardHandle │
//! │   (per frame)   │◀────│  (inbound packets)│
//! └─────────────────┘     └───────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Server errors are logged and allow continued operation

mod connection;

pub use connection::{ConnectionError, ConnectionHandler, FrameWriter};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::HubConfig;
use crate::registry::SwitchboardHandle;

/// Unix socket server for the framebus hub.
pub struct HubServer {
    config: HubConfig,

    /// Shared frame/session state
    switchboard: SwitchboardHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter used to tag log lines before a frame id exists
    connection_counter: AtomicU64,
}

impl HubServer {
    /// Creates a new hub server.
    ///
    /// # Arguments
    ///
    /// * `config` - Socket path and limits
    /// * `switchboard` - Handle to the switchboard frames will share
    /// * `cancel_token` - Token for graceful shutdown
    pub fn new(config: HubConfig, switchboard: SwitchboardHandle, cancel_token: CancellationToken) -> Self {
        Self {
            config,
            switchboard,
            cancel_token,
            connection_counter: AtomicU64::new(0),
        }
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Runs the server.
    ///
    /// Listens for connections until the cancellation token is triggered.
    /// This method does not return until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let socket_path = &self.config.socket_path;

        // Remove a stale socket file left by a previous run
        if socket_path.exists() {
            std::fs::remove_file(socket_path).map_err(|e| ServerError::SocketSetup {
                path: socket_path.clone(),
                error: e.to_string(),
            })?;
        }

        if let Some(parent) = socket_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| ServerError::SocketSetup {
                    path: socket_path.clone(),
                    error: e.to_string(),
                })?;
            }
        }

        let listener = UnixListener::bind(socket_path).map_err(|e| ServerError::SocketSetup {
            path: socket_path.clone(),
            error: e.to_string(),
        })?;

        info!(
            socket = %socket_path.display(),
            max_frames = self.config.switchboard.max_frames,
            "Hub listening"
        );

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Hub shutdown requested");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, conn_num);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        self.cleanup();
        Ok(())
    }

    /// Spawns a handler task for a new frame connection.
    fn handle_connection(&self, stream: tokio::net::UnixStream, connection_number: u64) {
        let (reader, writer) = stream.into_split();
        let handler = ConnectionHandler::new(
            reader,
            writer,
            self.switchboard.clone(),
            self.config.max_message_size,
            self.cancel_token.child_token(),
            connection_number,
        );

        tokio::spawn(handler.run());
    }

    /// Removes the socket file on shutdown.
    fn cleanup(&self) {
        let socket_path = &self.config.socket_path;
        if socket_path.exists() {
            if let Err(e) = std::fs::remove_file(socket_path) {
                warn!(
                    socket = %socket_path.display(),
                    error = %e,
                    "Failed to remove socket file"
                );
            }
        }

        info!("Hub cleanup complete");
    }
}

/// Errors that stop the hub server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to setup socket at {path}: {error}")]
    SocketSetup { path: PathBuf, error: String },

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}
