//! Session identifiers, membership views and per-frame session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::FrameId;

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Application-chosen key of a logical group of frames.
///
/// Sessions are scoped purely by this key: two unrelated features that pick
/// the same id share a session. Numeric ids are stored in their decimal form
/// so `SessionId::from(1)` and `SessionId::from("1")` are the same session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u32> for SessionId {
    fn from(n: u32) -> Self {
        Self(n.to_string())
    }
}

impl From<u64> for SessionId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl From<i32> for SessionId {
    fn from(n: i32) -> Self {
        Self(n.to_string())
    }
}

impl From<i64> for SessionId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Membership
// ============================================================================

/// How a frame belongs to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
    /// Created the session. Routing treats it like any other member.
    Owner,
    /// Joined an existing session.
    Member,
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Owner => write!(f, "owner"),
            Self::Member => write!(f, "member"),
        }
    }
}

/// One frame's entry in a session's member list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub frame_id: FrameId,
    /// Descriptive label supplied on join (e.g. "Diagram"). Has no routing effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub role: SessionRole,
    pub joined_at: DateTime<Utc>,
}

/// Read-only snapshot of a session as held by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub owner: FrameId,
    pub created_at: DateTime<Utc>,
    /// Members in join order; the owner is always first.
    pub members: Vec<MemberInfo>,
}

impl SessionInfo {
    /// Returns true if `frame_id` is the owner or a joined member.
    pub fn has_member(&self, frame_id: FrameId) -> bool {
        self.members.iter().any(|m| m.frame_id == frame_id)
    }

    /// Returns the display names of joined members, skipping unnamed ones.
    pub fn display_names(&self) -> impl Iterator<Item = &str> {
        self.members
            .iter()
            .filter_map(|m| m.display_name.as_deref())
    }
}

// ============================================================================
// Connector Session State
// ============================================================================

/// Session aspect of a single connector.
///
/// `Unbound -> Owner` on a successful create, `Unbound -> Member` on a
/// successful join. There is no transition back to `Unbound`. Once bound,
/// a later successful create or join moves the current session to the new id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unbound,
    Owner(SessionId),
    Member(SessionId),
}

impl SessionState {
    /// The session broadcasts are scoped to, if any.
    pub fn current(&self) -> Option<&SessionId> {
        match self {
            Self::Unbound => None,
            Self::Owner(id) | Self::Member(id) => Some(id),
        }
    }

    pub fn is_bound(&self) -> bool {
        !matches!(self, Self::Unbound)
    }
}
