//! Frame identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Identifier of one frame (window) attached to a provider.
///
/// Assigned by the provider when the frame registers and never reused
/// for the lifetime of that provider. Used both as the unicast
/// destination address and as the sender identity of every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(u64);

/// Prefix accepted (and produced by `Display`) for textual frame ids.
pub const FRAME_ID_PREFIX: &str = "frame-";

impl FrameId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw numeric value.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{FRAME_ID_PREFIX}{}", self.0)
    }
}

impl From<u64> for FrameId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Parses either `"frame-7"` or a bare `"7"`.
impl FromStr for FrameId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().strip_prefix(FRAME_ID_PREFIX).unwrap_or(s.trim());
        digits
            .parse::<u64>()
            .map(Self)
            .map_err(|_| DomainError::InvalidFrameId {
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id_display() {
        assert_eq!(FrameId::new(7).to_string(), "frame-7");
    }

    #[test]
    fn test_frame_id_parse() {
        assert_eq!("frame-12".parse::<FrameId>().unwrap(), FrameId::new(12));
        assert_eq!("12".parse::<FrameId>().unwrap(), FrameId::new(12));
        assert!("frame-".parse::<FrameId>().is_err());
        assert!("window-3".parse::<FrameId>().is_err());
    }

    #[test]
    fn test_frame_id_serializes_as_number() {
        let json = serde_json::to_string(&FrameId::new(3)).unwrap();
        assert_eq!(json, "3");
    }
}
