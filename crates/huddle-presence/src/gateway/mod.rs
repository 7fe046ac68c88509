//! Presence gateway: per-connection protocol state on top of the registry.
//!
//! The gateway knows nothing about sockets. A transport calls
//! [`Gateway::connect`] to obtain a connection id and an outbound queue,
//! feeds decoded frames to [`Gateway::handle`], and calls
//! [`Gateway::disconnect`] exactly once when the socket goes away.
//!
//! Broadcasts are emitted from [`MembershipObserver::on_change`], which
//! the registry invokes under the room lock, so every member of a room
//! receives `user-joined` / `user-left` in the same relative order.


use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};

use chrono::{DateTime, Utc};
use huddle_common::{ClientMessage, ConnectionId, GatewayError, RoomId, ServerMessage, UserId};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::registry::{MembershipObserver, RoomChange, RoomRegistry};

// ---------------------------------------------------------------------------
// Connection and session state
// ---------------------------------------------------------------------------

/// Lifecycle of one presence connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport is up, no identity attached yet.
    Unauthenticated,
    /// Identity attached, not in a room.
    Idle { user_id: UserId },
    InRoom { user_id: UserId, room_id: RoomId },
}

impl ConnectionState {
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            ConnectionState::Unauthenticated => None,
            ConnectionState::Idle { user_id } | ConnectionState::InRoom { user_id, .. } => {
                Some(user_id)
            }
        }
    }
}

/// The live binding of a user to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub connection: ConnectionId,
    pub room_id: Option<RoomId>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Default)]
struct GatewayState {
    connections: HashMap<ConnectionId, ConnectionState>,
    /// user_id -> current session. At most one per user.
    sessions: HashMap<UserId, Session>,
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

pub struct Gateway {
    registry: Arc<RoomRegistry>,
    /// Outbound queues. A std lock because the registry calls the observer
    /// synchronously while holding a room lock.
    outbound: StdRwLock<HashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>>,
    state: Mutex<GatewayState>,
}

impl Gateway {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self {
            registry,
            outbound: StdRwLock::new(HashMap::new()),
            state: Mutex::new(GatewayState::default()),
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Register a new transport connection. Dropping every sender for the
    /// returned receiver tells the transport to close the socket.
    pub async fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let conn = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        self.outbound
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(conn.clone(), tx);
        self.state
            .lock()
            .await
            .connections
            .insert(conn.clone(), ConnectionState::Unauthenticated);
        debug!(conn = %conn, "Connection registered");
        (conn, rx)
    }

    /// Dispatch one decoded client frame.
    pub async fn handle(&self, conn: &ConnectionId, msg: ClientMessage) {
        match msg {
            ClientMessage::Identify { user_id } => {
                if let Err(e) = self.identify(conn, &user_id).await {
                    self.send(conn, ServerMessage::Error {
                        message: e.to_string(),
                    });
                }
            }
            ClientMessage::JoinRoom { user_id, room_id } => {
                if let Err(message) = self.join_room(conn, &user_id, &room_id).await {
                    self.send(conn, ServerMessage::JoinError { message });
                }
            }
            ClientMessage::LeaveRoom {} => self.leave_room(conn).await,
            ClientMessage::Ping {} => self.send(conn, ServerMessage::pong_now()),
            ClientMessage::Pong { .. } => {}
        }
    }

    /// Attach an identity to a connection.
    ///
    /// If the user already has a session on another connection, the new
    /// connection takes over: the old one is told so, loses its room
    /// membership and is closed.
    pub async fn identify(&self, conn: &ConnectionId, user_id: &UserId) -> Result<(), GatewayError> {
        let replaced = {
            let mut state = self.state.lock().await;
            let current = state.connections.get(conn).cloned();
            match current {
                None => return Err(GatewayError::ConnectionLost(conn.to_string())),
                Some(ConnectionState::Unauthenticated) => {}
                Some(current) => {
                    if let Some(bound) = current.user_id().filter(|b| *b != user_id) {
                        return Err(GatewayError::IdentityMismatch {
                            bound: bound.clone(),
                            requested: user_id.clone(),
                        });
                    }
                    drop(state);
                    self.send(conn, ServerMessage::Identified {
                        user_id: user_id.clone(),
                    });
                    return Ok(());
                }
            }

            state.connections.insert(
                conn.clone(),
                ConnectionState::Idle {
                    user_id: user_id.clone(),
                },
            );
            let previous = state.sessions.insert(
                user_id.clone(),
                Session {
                    user_id: user_id.clone(),
                    connection: conn.clone(),
                    room_id: None,
                    joined_at: Utc::now(),
                },
            );
            let replaced = previous.map(|s| s.connection).filter(|old| old != conn);
            if let Some(old) = &replaced {
                state.connections.insert(old.clone(), ConnectionState::Unauthenticated);
            }
            replaced
        };

        info!(conn = %conn, user_id = %user_id, "Identity attached");
        self.send(conn, ServerMessage::Identified {
            user_id: user_id.clone(),
        });

        if let Some(old) = replaced {
            warn!(user_id = %user_id, old = %old, new = %conn, "Session replaced by new connection");
            self.send(&old, ServerMessage::Error {
                message: "session replaced".into(),
            });
            self.registry.drop_session(user_id, &old, self).await;
            self.close_outbound(&old);
        }
        Ok(())
    }

    /// Join (or move to) a room. An unauthenticated connection is bound to
    /// `user_id` first. Errors come back as the `join-error` message text.
    async fn join_room(
        &self,
        conn: &ConnectionId,
        user_id: &UserId,
        room_id: &RoomId,
    ) -> Result<(), String> {
        let bound = self.state(conn).await.and_then(|s| s.user_id().cloned());
        match bound {
            None => self.identify(conn, user_id).await.map_err(|e| e.to_string())?,
            Some(bound) if &bound != user_id => {
                return Err(GatewayError::IdentityMismatch {
                    bound,
                    requested: user_id.clone(),
                }
                .to_string());
            }
            Some(_) => {}
        }

        self.registry
            .join(user_id, room_id, conn, self)
            .await
            .map_err(|e| {
                debug!(conn = %conn, user_id = %user_id, room_id = %room_id, error = %e, "Join rejected");
                e.to_string()
            })?;

        let still_bound = {
            let mut state = self.state.lock().await;
            let owns_session = state
                .sessions
                .get(user_id)
                .is_some_and(|s| &s.connection == conn);
            match state.connections.get_mut(conn) {
                Some(conn_state) if owns_session => {
                    *conn_state = ConnectionState::InRoom {
                        user_id: user_id.clone(),
                        room_id: room_id.clone(),
                    };
                    if let Some(session) = state.sessions.get_mut(user_id) {
                        session.room_id = Some(room_id.clone());
                        session.joined_at = Utc::now();
                    }
                    true
                }
                _ => false,
            }
        };

        if !still_bound {
            // The connection closed or was superseded while joining.
            self.registry.drop_session(user_id, conn, self).await;
        }
        Ok(())
    }

    /// Leave the current room. A no-op when identified but not in one.
    async fn leave_room(&self, conn: &ConnectionId) {
        let user_id = match self.state(conn).await {
            Some(ConnectionState::InRoom { user_id, .. }) => user_id,
            Some(ConnectionState::Unauthenticated) => {
                self.send(conn, ServerMessage::Error {
                    message: GatewayError::NotAuthenticated.to_string(),
                });
                return;
            }
            _ => return,
        };
        self.registry.drop_session(&user_id, conn, self).await;

        let mut state = self.state.lock().await;
        if let Some(conn_state) = state.connections.get_mut(conn) {
            *conn_state = ConnectionState::Idle {
                user_id: user_id.clone(),
            };
        }
        if let Some(session) = state.sessions.get_mut(&user_id) {
            if &session.connection == conn {
                session.room_id = None;
            }
        }
    }

    /// Tear down a connection. Safe to call more than once.
    pub async fn disconnect(&self, conn: &ConnectionId, reason: &str) {
        let user_id = {
            let mut state = self.state.lock().await;
            let Some(conn_state) = state.connections.remove(conn) else {
                self.close_outbound(conn);
                return;
            };
            let user_id = conn_state.user_id().cloned();
            if let Some(user_id) = &user_id {
                if state
                    .sessions
                    .get(user_id)
                    .is_some_and(|s| &s.connection == conn)
                {
                    state.sessions.remove(user_id);
                }
            }
            user_id
        };
        self.close_outbound(conn);

        match &user_id {
            Some(user_id) => {
                info!(conn = %conn, user_id = %user_id, reason, "Connection closed");
                self.registry.drop_session(user_id, conn, self).await;
            }
            None => debug!(conn = %conn, reason, "Unidentified connection closed"),
        }
    }

    // -- Reads --------------------------------------------------------------

    pub async fn state(&self, conn: &ConnectionId) -> Option<ConnectionState> {
        self.state.lock().await.connections.get(conn).cloned()
    }

    pub async fn session(&self, user_id: &UserId) -> Option<Session> {
        self.state.lock().await.sessions.get(user_id).cloned()
    }

    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.connections.len()
    }

    // -- Outbound -----------------------------------------------------------

    fn send(&self, conn: &ConnectionId, msg: ServerMessage) {
        let outbound = self.outbound.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = outbound.get(conn) {
            if tx.send(msg).is_err() {
                debug!(conn = %conn, "Outbound queue closed");
            }
        }
    }

    fn close_outbound(&self, conn: &ConnectionId) {
        self.outbound
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(conn);
    }
}

impl MembershipObserver for Gateway {
    fn on_change(&self, change: RoomChange<'_>) {
        match change {
            RoomChange::Joined {
                snapshot,
                user_id,
                session,
                others,
            } => {
                self.send(session, ServerMessage::RoomJoined {
                    room_id: snapshot.room_id.clone(),
                    room_name: snapshot.room_name.clone(),
                    current_users: snapshot.members.clone(),
                    user_count: snapshot.user_count,
                });
                let event = ServerMessage::UserJoined {
                    user_id: user_id.clone(),
                    room_id: snapshot.room_id.clone(),
                    user_count: snapshot.user_count,
                };
                for member in others {
                    self.send(&member.session, event.clone());
                }
            }
            RoomChange::Rejoined { snapshot, session, .. } => {
                self.send(session, ServerMessage::RoomJoined {
                    room_id: snapshot.room_id.clone(),
                    room_name: snapshot.room_name.clone(),
                    current_users: snapshot.members.clone(),
                    user_count: snapshot.user_count,
                });
            }
            RoomChange::Left {
                room_id,
                user_id,
                remaining,
            } => {
                let event = ServerMessage::UserLeft {
                    user_id: user_id.clone(),
                    room_id: room_id.clone(),
                    user_count: remaining.len() as u32,
                };
                for member in remaining {
                    self.send(&member.session, event.clone());
                }
            }
        }
    }
}
