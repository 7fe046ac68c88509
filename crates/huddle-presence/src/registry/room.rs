//! Room records, memberships, and snapshots.

use chrono::{DateTime, Utc};
use huddle_common::{ConnectionId, CreateRoomRequest, RoomId, RoomSummary, UserId, Visibility};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What a caller asks for when creating a room. Unset fields take the
/// registry's policy defaults.
#[derive(Debug, Clone, Default)]
pub struct RoomSpec {
    pub name: String,
    pub description: Option<String>,
    pub capacity: Option<u32>,
    pub visibility: Option<Visibility>,
}

impl From<CreateRoomRequest> for RoomSpec {
    fn from(req: CreateRoomRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            capacity: req.capacity,
            visibility: req.visibility,
        }
    }
}

/// A user's seat in a room, owned by one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub user_id: UserId,
    pub session: ConnectionId,
}

/// Room state as seen by a user at the moment they joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub room_name: String,
    pub description: Option<String>,
    pub capacity: u32,
    pub visibility: Visibility,
    /// Current members other than the joiner, in join order.
    pub members: Vec<UserId>,
    /// Live member count including the joiner.
    pub user_count: u32,
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

pub(crate) struct Room {
    pub(crate) id: RoomId,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) capacity: u32,
    pub(crate) visibility: Visibility,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) members: Vec<Membership>,
    /// Set once the room has been collected; holders of a stale handle
    /// must treat it as gone.
    pub(crate) closed: bool,
}

impl Room {
    pub(crate) fn new(id: RoomId, spec: RoomSpec, capacity: u32, visibility: Visibility) -> Self {
        Self {
            id,
            name: spec.name.trim().to_string(),
            description: spec.description,
            capacity,
            visibility,
            created_at: Utc::now(),
            members: Vec::new(),
            closed: false,
        }
    }

    pub(crate) fn is_full(&self) -> bool {
        self.members.len() as u32 >= self.capacity
    }

    pub(crate) fn user_count(&self) -> u32 {
        self.members.len() as u32
    }

    pub(crate) fn session_of(&self, user_id: &UserId) -> Option<&ConnectionId> {
        self.members
            .iter()
            .find(|m| &m.user_id == user_id)
            .map(|m| &m.session)
    }

    /// Replace the session token of an existing member. Returns false if
    /// the user is not a member.
    pub(crate) fn refresh_session(&mut self, user_id: &UserId, session: &ConnectionId) -> bool {
        match self.members.iter_mut().find(|m| &m.user_id == user_id) {
            Some(m) => {
                m.session = session.clone();
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove(&mut self, user_id: &UserId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| &m.user_id != user_id);
        self.members.len() != before
    }

    /// Snapshot from `viewer`'s point of view: the viewer is never listed.
    pub(crate) fn snapshot_for(&self, viewer: &UserId) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.id.clone(),
            room_name: self.name.clone(),
            description: self.description.clone(),
            capacity: self.capacity,
            visibility: self.visibility,
            members: self
                .members
                .iter()
                .filter(|m| &m.user_id != viewer)
                .map(|m| m.user_id.clone())
                .collect(),
            user_count: self.user_count(),
        }
    }

    pub(crate) fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            capacity: self.capacity,
            user_count: self.user_count(),
            visibility: self.visibility,
            created_at: self.created_at,
        }
    }

    pub(crate) fn collectable(&self) -> bool {
        !self.closed && self.members.is_empty() && self.visibility == Visibility::Private
    }
}

/// Lowercase ASCII slug of a room name: runs of other characters become a
/// single `-`.
pub(crate) fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "room".to_string()
    } else {
        slug.to_string()
    }
}
