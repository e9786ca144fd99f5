//! Error types for the connector and its providers.
//!
//! Session outcomes ("someone else owns it", "nobody owns it yet") are
//! `Ok(false)` results, not errors. These types cover the cases where the
//! provider itself could not answer.

use framebus_core::DomainError;
use framebus_hub::registry::SwitchboardError;
use framebus_protocol::ProtocolVersion;
use thiserror::Error;

/// Failures of a connection provider.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Could not reach the hub.
    ///
    /// Usually means `framebusd` is not running or the socket path is wrong.
    #[error("Failed to connect to hub at {path}: {reason}")]
    Connect { path: String, reason: String },

    /// The hub refused the frame (capacity, version).
    #[error("Hub rejected frame: {0}")]
    Rejected(String),

    #[error("Protocol version mismatch (frame: {local}, hub: {remote})")]
    VersionMismatch {
        local: ProtocolVersion,
        remote: ProtocolVersion,
    },

    /// The hub sent something this frame did not expect.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The hub answered a request with an error.
    #[error("Hub error{}: {message}", code_suffix(.code))]
    Remote {
        message: String,
        code: Option<String>,
    },

    /// The connection (or in-process switchboard) went away mid-request.
    #[error("Transport disconnected")]
    Disconnected,

    /// Error raised by an in-process switchboard.
    #[error(transparent)]
    Switchboard(#[from] SwitchboardError),
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default()
}

/// Errors returned by `WindowConnector`.
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Payload could not be serialized into a packet.
    #[error(transparent)]
    Payload(#[from] DomainError),
}

/// Convenience Result type alias for connector operations.
pub type Result<T> = std::result::Result<T, ConnectorError>;
