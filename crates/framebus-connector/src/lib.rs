//! framebus Connector - frame-side messaging facade
//!
//! One [`WindowConnector`] per frame. It registers with a
//! [`ConnectionProvider`], claims or joins sessions, and sends and receives
//! topic-tagged packets:
//! - `provider` - Capability traits plus the in-memory and Unix-socket providers
//! - `router` - Inbound session filter and per-topic fan-out
//! - `connector` - The `WindowConnector` facade
//!
//! ```no_run
//! use framebus_connector::{InMemoryProvider, WindowConnector};
//!
//! # async fn demo() -> Result<(), framebus_connector::ConnectorError> {
//! let provider = InMemoryProvider::spawn();
//! let main = WindowConnector::connect(&provider).await?;
//! let diagram = WindowConnector::connect(&provider).await?;
//!
//! assert!(main.create_session(1u32).await?);
//! assert!(diagram.join_session(1u32, "Diagram").await?);
//!
//! let mut selections = diagram.receiver("select");
//! main.broadcast("select", &42)?;
//! let packet = selections.recv().await;
//! # Ok(())
//! # }
//! ```

pub mod connector;
pub mod error;
pub mod provider;
pub mod router;

pub use connector::WindowConnector;
pub use error::{ConnectorError, TransportError};
pub use provider::{
    ConnectionProvider, FrameAttachment, FrameLink, InMemoryProvider, SocketProvider,
    SocketProviderConfig, SOCKET_ENV_VAR,
};
pub use router::{TopicReceiver, TopicRouter};

pub use framebus_core::{FrameId, Packet, Route, SessionId, SessionInfo, SessionState};
