//! Presence wire protocol and directory payloads.
//!
//! Every presence frame is a JSON text message internally tagged by
//! `"type"`. Event names are kebab-case (`join-room`, `user-left`) and
//! payload fields are camelCase (`roomId`, `userCount`), shared verbatim
//! by the server and the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{RoomId, UserId};

// ---------------------------------------------------------------------------
// Presence frames
// ---------------------------------------------------------------------------

/// Frames a client sends to the presence gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Attach the opaque identity handed over by the auth provider.
    #[serde(rename_all = "camelCase")]
    Identify { user_id: UserId },

    #[serde(rename_all = "camelCase")]
    JoinRoom { user_id: UserId, room_id: RoomId },

    LeaveRoom {},

    Ping {},

    Pong { timestamp: u64 },
}

/// Frames the presence gateway sends to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Identified { user_id: UserId },

    /// Snapshot sent only to the joining connection. Never lists the joiner.
    #[serde(rename_all = "camelCase")]
    RoomJoined {
        room_id: RoomId,
        room_name: String,
        current_users: Vec<UserId>,
        user_count: u32,
    },

    #[serde(rename_all = "camelCase")]
    UserJoined {
        user_id: UserId,
        room_id: RoomId,
        user_count: u32,
    },

    #[serde(rename_all = "camelCase")]
    UserLeft {
        user_id: UserId,
        room_id: RoomId,
        user_count: u32,
    },

    JoinError { message: String },

    Error { message: String },

    Ping {},

    Pong { timestamp: u64 },
}

impl ClientMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

impl ServerMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }

    pub fn pong_now() -> Self {
        ServerMessage::Pong {
            timestamp: now_millis(),
        }
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

// ---------------------------------------------------------------------------
// Directory payloads
// ---------------------------------------------------------------------------

/// Whether a room shows up for everyone or only for invited members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// One row of `listRooms()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: RoomId,
    pub name: String,
    pub description: Option<String>,
    pub capacity: u32,
    pub user_count: u32,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
}

/// Body of `createRoom()`. A missing name deserializes as empty and is
/// rejected by the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
}
