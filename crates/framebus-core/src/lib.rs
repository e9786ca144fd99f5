//! framebus Core - Shared types for session-scoped frame messaging
//!
//! This crate provides the domain types shared between the hub
//! (framebus-hub) and the frame-side connector (framebus-connector).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod frame;
pub mod packet;
pub mod session;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use frame::FrameId;
pub use packet::{Packet, Route};
pub use session::{MemberInfo, SessionId, SessionInfo, SessionRole, SessionState};
