//! Session ownership and membership table.
//!
//! Plain data structure owned by the switchboard actor; every mutation
//! happens on the actor task, so no locking is involved.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use framebus_core::{FrameId, MemberInfo, SessionId, SessionInfo, SessionRole};

use super::commands::SwitchboardError;

/// Result of a claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The session did not exist; the caller now owns it.
    Claimed,
    /// The caller already owned the session.
    AlreadyOwner,
    /// Another frame owns the session. The caller was not added.
    OwnedBy(FrameId),
}

impl ClaimOutcome {
    pub fn succeeded(self) -> bool {
        matches!(self, Self::Claimed | Self::AlreadyOwner)
    }
}

/// Result of a join attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    /// Already a member; the display name was refreshed.
    AlreadyMember,
    /// No owner exists yet.
    NoOwner,
}

impl JoinOutcome {
    pub fn succeeded(self) -> bool {
        !matches!(self, Self::NoOwner)
    }
}

#[derive(Debug)]
struct SessionEntry {
    owner: FrameId,
    created_at: DateTime<Utc>,
    members: Vec<MemberInfo>,
}

impl SessionEntry {
    fn to_info(&self, session_id: &SessionId) -> SessionInfo {
        SessionInfo {
            session_id: session_id.clone(),
            owner: self.owner,
            created_at: self.created_at,
            members: self.members.clone(),
        }
    }
}

/// All sessions known to one switchboard.
///
/// Membership only grows: there is no leave operation.
#[derive(Debug)]
pub struct SessionTable {
    sessions: BTreeMap<SessionId, SessionEntry>,
    max_sessions: usize,
}

impl SessionTable {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: BTreeMap::new(),
            max_sessions,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Attempts to make `frame_id` the owner of `session_id`.
    pub fn claim(&mut self, frame_id: FrameId, session_id: &SessionId) -> Result<ClaimOutcome, SwitchboardError> {
        if let Some(entry) = self.sessions.get(session_id) {
            return Ok(if entry.owner == frame_id {
                ClaimOutcome::AlreadyOwner
            } else {
                ClaimOutcome::OwnedBy(entry.owner)
            });
        }

        if self.sessions.len() >= self.max_sessions {
            return Err(SwitchboardError::TooManySessions {
                max: self.max_sessions,
            });
        }

        let now = Utc::now();
        self.sessions.insert(
            session_id.clone(),
            SessionEntry {
                owner: frame_id,
                created_at: now,
                members: vec![MemberInfo {
                    frame_id,
                    display_name: None,
                    role: SessionRole::Owner,
                    joined_at: now,
                }],
            },
        );
        Ok(ClaimOutcome::Claimed)
    }

    /// Adds `frame_id` to an owned session.
    pub fn join(&mut self, frame_id: FrameId, session_id: &SessionId, display_name: &str) -> JoinOutcome {
        let Some(entry) = self.sessions.get_mut(session_id) else {
            return JoinOutcome::NoOwner;
        };

        if let Some(existing) = entry.members.iter_mut().find(|m| m.frame_id == frame_id) {
            existing.display_name = Some(display_name.to_string());
            return JoinOutcome::AlreadyMember;
        }

        entry.members.push(MemberInfo {
            frame_id,
            display_name: Some(display_name.to_string()),
            role: SessionRole::Member,
            joined_at: Utc::now(),
        });
        JoinOutcome::Joined
    }

    pub fn describe(&self, session_id: &SessionId) -> Option<SessionInfo> {
        self.sessions.get(session_id).map(|e| e.to_info(session_id))
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        self.sessions
            .iter()
            .map(|(id, entry)| entry.to_info(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(n: u64) -> FrameId {
        FrameId::new(n)
    }

    #[test]
    fn test_first_claim_wins() {
        let mut table = SessionTable::new(8);
        let id = SessionId::from(1u32);

        assert_eq!(table.claim(frame(1), &id).unwrap(), ClaimOutcome::Claimed);
        assert_eq!(table.claim(frame(2), &id).unwrap(), ClaimOutcome::OwnedBy(frame(1)));
        assert_eq!(table.claim(frame(1), &id).unwrap(), ClaimOutcome::AlreadyOwner);

        let info = table.describe(&id).unwrap();
        assert_eq!(info.owner, frame(1));
        assert!(!info.has_member(frame(2)), "failed claim must not add membership");
    }

    #[test]
    fn test_join_requires_owner() {
        let mut table = SessionTable::new(8);
        let id = SessionId::from("graph");

        assert_eq!(table.join(frame(2), &id, "Diagram"), JoinOutcome::NoOwner);
        assert!(table.is_empty());

        table.claim(frame(1), &id).unwrap();
        assert_eq!(table.join(frame(2), &id, "Diagram"), JoinOutcome::Joined);
        assert_eq!(table.join(frame(2), &id, "Timeline"), JoinOutcome::AlreadyMember);

        let info = table.describe(&id).unwrap();
        assert_eq!(info.members.len(), 2);
        assert_eq!(info.members[0].role, SessionRole::Owner);
        assert_eq!(info.members[1].display_name.as_deref(), Some("Timeline"));
    }

    #[test]
    fn test_owner_join_keeps_owner_role() {
        let mut table = SessionTable::new(8);
        let id = SessionId::from(3u32);
        table.claim(frame(1), &id).unwrap();

        assert_eq!(table.join(frame(1), &id, "Main"), JoinOutcome::AlreadyMember);
        let info = table.describe(&id).unwrap();
        assert_eq!(info.members.len(), 1);
        assert_eq!(info.members[0].role, SessionRole::Owner);
    }

    #[test]
    fn test_capacity_only_limits_new_sessions() {
        let mut table = SessionTable::new(1);
        table.claim(frame(1), &SessionId::from(1u32)).unwrap();

        let err = table.claim(frame(2), &SessionId::from(2u32)).unwrap_err();
        assert_eq!(err, SwitchboardError::TooManySessions { max: 1 });

        // Existing sessions still answer claims normally
        assert_eq!(
            table.claim(frame(2), &SessionId::from(1u32)).unwrap(),
            ClaimOutcome::OwnedBy(frame(1))
        );
    }

    #[test]
    fn test_list_is_ordered_by_id() {
        let mut table = SessionTable::new(8);
        table.claim(frame(1), &SessionId::from("b")).unwrap();
        table.claim(frame(1), &SessionId::from("a")).unwrap();

        let ids: Vec<_> = table.list().into_iter().map(|s| s.session_id).collect();
        assert_eq!(ids, vec![SessionId::from("a"), SessionId::from("b")]);
    }
}
