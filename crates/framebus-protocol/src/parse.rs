//! Line framing for the hub stream.
//!
//! Each message is one JSON document terminated by `\n`. Lines longer than
//! [`MAX_MESSAGE_SIZE`] are rejected before any JSON parsing happens.

use serde::Serialize;
use thiserror::Error;

use crate::{FrameMessage, HubMessage};

/// Maximum accepted line length in bytes (1 MiB).
pub const MAX_MESSAGE_SIZE: usize = 1_048_576;

/// Errors produced while framing or parsing a line.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("message too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("empty message")]
    Empty,

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn check_line(line: &str, max: usize) -> Result<&str, ParseError> {
    if line.len() > max {
        return Err(ParseError::TooLarge {
            size: line.len(),
            max,
        });
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(trimmed)
}

/// Parses a frame → hub line, enforcing `max` as the size limit.
pub fn parse_frame_message(line: &str, max: usize) -> Result<FrameMessage, ParseError> {
    let body = check_line(line, max)?;
    Ok(serde_json::from_str(body)?)
}

/// Parses a hub → frame line.
pub fn parse_hub_message(line: &str) -> Result<HubMessage, ParseError> {
    let body = check_line(line, MAX_MESSAGE_SIZE)?;
    Ok(serde_json::from_str(body)?)
}

/// Serializes a message as a single newline-terminated line.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, ParseError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageType;
    use framebus_core::{FrameId, SessionId};

    #[test]
    fn test_encode_then_parse_frame_line() {
        let line = encode_line(&FrameMessage::join_session(1, SessionId::from(1u32), "Diagram".into())).unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);

        let parsed = parse_frame_message(&line, MAX_MESSAGE_SIZE).unwrap();
        assert!(matches!(
            parsed.message,
            MessageType::JoinSession { ref display_name, .. } if display_name == "Diagram"
        ));
    }

    #[test]
    fn test_parse_hub_line() {
        let line = encode_line(&HubMessage::connected(FrameId::new(2))).unwrap();
        let parsed = parse_hub_message(&line).unwrap();
        assert_eq!(parsed, HubMessage::connected(FrameId::new(2)));
    }

    #[test]
    fn test_rejects_oversized_line() {
        let line = "x".repeat(64);
        let err = parse_frame_message(&line, 16).unwrap_err();
        assert!(matches!(err, ParseError::TooLarge { size: 64, max: 16 }));
    }

    #[test]
    fn test_rejects_blank_and_garbage() {
        assert!(matches!(parse_hub_message("  \n"), Err(ParseError::Empty)));
        assert!(matches!(parse_hub_message("{not json"), Err(ParseError::Json(_))));
        assert!(matches!(
            parse_frame_message(r#"{"type":"ping","seq":1}"#, MAX_MESSAGE_SIZE),
            Err(ParseError::Json(_))
        ));
    }
}
