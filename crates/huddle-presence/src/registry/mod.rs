//! Room registry: room metadata and membership, with no network code.
//!
//! Each room sits behind its own mutex, so mutations of one room are
//! strictly serialized while different rooms proceed in parallel. A join
//! that moves a user between rooms locks both rooms in id order and
//! updates the user index before either lock is released, so nobody sees
//! the user in two rooms or in none.
//!
//! Fan-out happens through [`MembershipObserver`], which is called while
//! the room lock is held. That makes the registry the single
//! serialization point for presence events in a room.

mod room;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

use huddle_common::{ConnectionId, RegistryError, RoomId, RoomSummary, UserId, Visibility};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

pub use room::{Membership, RoomSnapshot, RoomSpec};

use room::{slugify, Room};

// ---------------------------------------------------------------------------
// Policy and observer
// ---------------------------------------------------------------------------

/// Defaults applied to room specs, plus the empty-room collection policy.
#[derive(Debug, Clone)]
pub struct RoomPolicy {
    pub default_capacity: u32,
    pub default_visibility: Visibility,
    /// Remove private rooms once their last member leaves.
    pub collect_empty_private: bool,
}

impl Default for RoomPolicy {
    fn default() -> Self {
        Self {
            default_capacity: 20,
            default_visibility: Visibility::Public,
            collect_empty_private: false,
        }
    }
}

impl From<&huddle_config::RoomsConfig> for RoomPolicy {
    fn from(config: &huddle_config::RoomsConfig) -> Self {
        Self {
            default_capacity: config.default_capacity,
            default_visibility: config.default_visibility,
            collect_empty_private: config.collect_empty_private,
        }
    }
}

/// A membership change, described while the room is still locked.
#[derive(Debug)]
pub enum RoomChange<'a> {
    Joined {
        /// What the joiner sees; never lists the joiner.
        snapshot: &'a RoomSnapshot,
        user_id: &'a UserId,
        session: &'a ConnectionId,
        /// Members present before the join.
        others: &'a [Membership],
    },
    /// Joined the room the user was already in. Only the joiner hears
    /// about it.
    Rejoined {
        snapshot: &'a RoomSnapshot,
        user_id: &'a UserId,
        session: &'a ConnectionId,
    },
    Left {
        room_id: &'a RoomId,
        user_id: &'a UserId,
        remaining: &'a [Membership],
    },
}

/// Receives membership changes in the exact order the registry applies
/// them. Implementations must not block.
pub trait MembershipObserver: Send + Sync {
    fn on_change(&self, change: RoomChange<'_>);
}

impl MembershipObserver for () {
    fn on_change(&self, _change: RoomChange<'_>) {}
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub snapshot: RoomSnapshot,
    /// The room the user was moved out of, if any.
    pub vacated: Option<RoomId>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// In-memory owner of all rooms and memberships.
pub struct RoomRegistry {
    policy: RoomPolicy,
    rooms: RwLock<HashMap<RoomId, Arc<Mutex<Room>>>>,
    /// Which room each user is in (user_id -> room_id). Only written while
    /// the affected room locks are held.
    user_rooms: Mutex<HashMap<UserId, RoomId>>,
}

impl RoomRegistry {
    pub fn new(policy: RoomPolicy) -> Self {
        Self {
            policy,
            rooms: RwLock::new(HashMap::new()),
            user_rooms: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &RoomPolicy {
        &self.policy
    }

    /// Build a registry from config, creating every seeded room.
    pub async fn from_config(config: &huddle_config::RoomsConfig) -> Result<Self, RegistryError> {
        let registry = Self::new(RoomPolicy::from(config));
        for seed in &config.seed {
            let spec = RoomSpec {
                name: seed.name.clone(),
                description: seed.description.clone(),
                capacity: seed.capacity,
                visibility: seed.visibility,
            };
            match &seed.id {
                Some(id) => {
                    registry.seed_room(RoomId::from(id.as_str()), spec).await?;
                }
                None => {
                    registry.create_room(spec).await?;
                }
            }
        }
        Ok(registry)
    }

    // -- Room lifecycle -----------------------------------------------------

    /// Create a room with a generated `slug-xxxxxxxx` id.
    pub async fn create_room(&self, spec: RoomSpec) -> Result<RoomId, RegistryError> {
        let (capacity, visibility) = self.resolve(&spec)?;
        let slug = slugify(&spec.name);

        let mut rooms = self.rooms.write().await;
        let id = loop {
            let candidate = RoomId::from(format!("{slug}-{}", huddle_common::id::short_suffix()));
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        let room = Room::new(id.clone(), spec, capacity, visibility);
        info!(room_id = %id, name = %room.name, capacity, "Room created");
        rooms.insert(id.clone(), Arc::new(Mutex::new(room)));
        Ok(id)
    }

    /// Create a room under a fixed id, used for rooms seeded at start.
    pub async fn seed_room(&self, id: RoomId, spec: RoomSpec) -> Result<RoomId, RegistryError> {
        let (capacity, visibility) = self.resolve(&spec)?;
        if id.as_str().trim().is_empty() {
            return Err(RegistryError::InvalidSpec("room id must not be empty".into()));
        }

        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&id) {
            return Err(RegistryError::InvalidSpec(format!("room {id} already exists")));
        }
        let room = Room::new(id.clone(), spec, capacity, visibility);
        info!(room_id = %id, name = %room.name, capacity, "Room seeded");
        rooms.insert(id.clone(), Arc::new(Mutex::new(room)));
        Ok(id)
    }

    fn resolve(&self, spec: &RoomSpec) -> Result<(u32, Visibility), RegistryError> {
        if spec.name.trim().is_empty() {
            return Err(RegistryError::InvalidSpec("name must not be empty".into()));
        }
        let capacity = spec.capacity.unwrap_or(self.policy.default_capacity);
        if capacity == 0 {
            return Err(RegistryError::InvalidSpec("capacity must be positive".into()));
        }
        Ok((
            capacity,
            spec.visibility.unwrap_or(self.policy.default_visibility),
        ))
    }

    /// All rooms with live member counts, oldest first.
    pub async fn list_rooms(&self) -> Vec<RoomSummary> {
        let handles: Vec<Arc<Mutex<Room>>> = self.rooms.read().await.values().cloned().collect();
        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            let room = handle.lock().await;
            if !room.closed {
                summaries.push(room.summary());
            }
        }
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        summaries
    }

    pub async fn summary(&self, room_id: &RoomId) -> Option<RoomSummary> {
        let handle = self.room_handle(room_id).await?;
        let room = handle.lock().await;
        (!room.closed).then(|| room.summary())
    }

    // -- Membership ---------------------------------------------------------

    /// Put `user_id` into `room_id`, moving them out of any other room in
    /// the same step.
    ///
    /// Fails with `RoomNotFound` or `RoomFull`; on failure nothing changes,
    /// including the user's current membership elsewhere. Joining the room
    /// the user is already in rebinds the membership to `session` and
    /// reports a fresh snapshot to the joiner only.
    pub async fn join(
        &self,
        user_id: &UserId,
        room_id: &RoomId,
        session: &ConnectionId,
        observer: &dyn MembershipObserver,
    ) -> Result<JoinOutcome, RegistryError> {
        loop {
            let target = self
                .room_handle(room_id)
                .await
                .ok_or_else(|| RegistryError::RoomNotFound(room_id.clone()))?;
            let prev_id = self.user_rooms.lock().await.get(user_id).cloned();
            let prev = match &prev_id {
                Some(id) if id != room_id => self.room_handle(id).await,
                _ => None,
            };

            // Lock order: ascending room id.
            let (mut target_room, mut prev_room) = match (&prev, &prev_id) {
                (Some(handle), Some(id)) if id < room_id => {
                    let p = handle.lock().await;
                    (target.lock().await, Some(p))
                }
                (Some(handle), _) => {
                    let t = target.lock().await;
                    (t, Some(handle.lock().await))
                }
                (None, _) => (target.lock().await, None),
            };

            let mut index = self.user_rooms.lock().await;
            if index.get(user_id) != prev_id.as_ref() {
                // Another mutation for this user slipped in; start over.
                continue;
            }
            if target_room.closed {
                return Err(RegistryError::RoomNotFound(room_id.clone()));
            }

            if prev_id.as_ref() == Some(room_id) && target_room.refresh_session(user_id, session) {
                debug!(room_id = %room_id, user_id = %user_id, "Membership rebound to new session");
                let snapshot = target_room.snapshot_for(user_id);
                observer.on_change(RoomChange::Rejoined {
                    snapshot: &snapshot,
                    user_id,
                    session,
                });
                return Ok(JoinOutcome {
                    snapshot,
                    vacated: None,
                });
            }

            if target_room.is_full() {
                return Err(RegistryError::RoomFull {
                    room_id: room_id.clone(),
                    capacity: target_room.capacity,
                });
            }

            let mut vacated = None;
            let mut collect_vacated = false;
            if let Some(prev_room) = prev_room.as_mut() {
                if prev_room.remove(user_id) {
                    observer.on_change(RoomChange::Left {
                        room_id: &prev_room.id,
                        user_id,
                        remaining: &prev_room.members,
                    });
                    info!(room_id = %prev_room.id, user_id = %user_id, "User vacated room");
                    collect_vacated = self.policy.collect_empty_private && prev_room.collectable();
                    vacated = Some(prev_room.id.clone());
                }
            }

            let others = target_room.members.clone();
            target_room.members.push(Membership {
                user_id: user_id.clone(),
                session: session.clone(),
            });
            index.insert(user_id.clone(), room_id.clone());
            drop(index);

            let snapshot = target_room.snapshot_for(user_id);
            observer.on_change(RoomChange::Joined {
                snapshot: &snapshot,
                user_id,
                session,
                others: &others,
            });
            info!(
                room_id = %room_id,
                user_id = %user_id,
                user_count = snapshot.user_count,
                "User joined room"
            );

            drop(prev_room);
            drop(target_room);
            if let (true, Some(id)) = (collect_vacated, &vacated) {
                self.collect_if_empty(id).await;
            }

            return Ok(JoinOutcome { snapshot, vacated });
        }
    }

    /// Remove the user from whatever room they are in. Leaving when not
    /// in a room is a no-op. Returns the room that was left.
    pub async fn leave(
        &self,
        user_id: &UserId,
        observer: &dyn MembershipObserver,
    ) -> Option<RoomId> {
        self.remove_member(user_id, None, observer).await
    }

    /// Same as [`leave`](Self::leave), but only when the membership is
    /// still owned by `session`. A connection that was superseded by a
    /// reconnect therefore cannot evict the newer session.
    pub async fn drop_session(
        &self,
        user_id: &UserId,
        session: &ConnectionId,
        observer: &dyn MembershipObserver,
    ) -> Option<RoomId> {
        self.remove_member(user_id, Some(session), observer).await
    }

    async fn remove_member(
        &self,
        user_id: &UserId,
        session: Option<&ConnectionId>,
        observer: &dyn MembershipObserver,
    ) -> Option<RoomId> {
        loop {
            let room_id = self.user_rooms.lock().await.get(user_id).cloned()?;
            let Some(handle) = self.room_handle(&room_id).await else {
                let mut index = self.user_rooms.lock().await;
                if index.get(user_id) == Some(&room_id) {
                    index.remove(user_id);
                }
                return None;
            };

            let mut room = handle.lock().await;
            let mut index = self.user_rooms.lock().await;
            if index.get(user_id) != Some(&room_id) {
                continue;
            }
            if let Some(session) = session {
                if room.session_of(user_id) != Some(session) {
                    debug!(user_id = %user_id, "Ignoring drop from superseded session");
                    return None;
                }
            }

            room.remove(user_id);
            index.remove(user_id);
            drop(index);

            observer.on_change(RoomChange::Left {
                room_id: &room_id,
                user_id,
                remaining: &room.members,
            });
            info!(
                room_id = %room_id,
                user_id = %user_id,
                user_count = room.user_count(),
                "User left room"
            );

            let collect = self.policy.collect_empty_private && room.collectable();
            drop(room);
            if collect {
                self.collect_if_empty(&room_id).await;
            }
            return Some(room_id);
        }
    }

    async fn collect_if_empty(&self, room_id: &RoomId) {
        let mut rooms = self.rooms.write().await;
        let Some(handle) = rooms.get(room_id).cloned() else {
            return;
        };
        let mut room = handle.lock().await;
        if room.collectable() {
            room.closed = true;
            rooms.remove(room_id);
            info!(room_id = %room_id, "Empty private room collected");
        }
    }

    // -- Reads --------------------------------------------------------------

    /// The room a user currently belongs to.
    pub async fn room_of(&self, user_id: &UserId) -> Option<RoomId> {
        self.user_rooms.lock().await.get(user_id).cloned()
    }

    /// Member ids of a room in join order.
    pub async fn members(&self, room_id: &RoomId) -> Option<Vec<UserId>> {
        let handle = self.room_handle(room_id).await?;
        let room = handle.lock().await;
        Some(room.members.iter().map(|m| m.user_id.clone()).collect())
    }

    /// Room state as `viewer` would see it on joining.
    pub async fn snapshot(&self, room_id: &RoomId, viewer: &UserId) -> Option<RoomSnapshot> {
        let handle = self.room_handle(room_id).await?;
        let room = handle.lock().await;
        (!room.closed).then(|| room.snapshot_for(viewer))
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    async fn room_handle(&self, room_id: &RoomId) -> Option<Arc<Mutex<Room>>> {
        self.rooms.read().await.get(room_id).cloned()
    }
}
