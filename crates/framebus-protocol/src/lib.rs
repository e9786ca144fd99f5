//! framebus Protocol - Wire protocol between frames and the hub
//!
//! This crate provides message types and parsing for the newline-delimited
//! JSON stream each frame keeps open to the hub.

pub mod message;
pub mod parse;
pub mod version;

pub use message::{FrameMessage, HubMessage, MessageType, RequestId};
pub use parse::{encode_line, parse_frame_message, parse_hub_message, ParseError, MAX_MESSAGE_SIZE};
pub use version::{ProtocolVersion, VersionError};
