//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone)]
pub enum DomainError {
    /// A frame identifier could not be parsed
    #[error("Invalid frame id: {value}")]
    InvalidFrameId { value: String },

    /// Packet payload could not be converted to or from JSON
    #[error("Payload error on topic '{topic}': {reason}")]
    Payload { topic: String, reason: String },
}

impl DomainError {
    /// Creates a payload error from any displayable error.
    pub fn payload<E: std::fmt::Display>(topic: &str, err: E) -> Self {
        Self::Payload {
            topic: topic.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
