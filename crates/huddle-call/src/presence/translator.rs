//! Turns gateway frames into presence events, and presence events into
//! orchestrator inputs.

use huddle_common::{RoomId, ServerMessage, UserId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::orchestrator::{OrchestratorHandle, OrchestratorInput};

/// What the presence client reports about the room it is in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    Connected,
    Disconnected,
    /// Everyone else in the room right after joining it.
    Snapshot {
        room_id: RoomId,
        room_name: String,
        users: Vec<UserId>,
        user_count: u32,
    },
    UserJoined {
        user_id: UserId,
        room_id: RoomId,
        user_count: u32,
    },
    UserLeft {
        user_id: UserId,
        room_id: RoomId,
        user_count: u32,
    },
    /// This client left `room_id`, by request or by moving elsewhere.
    RoomLeft { room_id: RoomId },
    JoinError(String),
    Error(String),
}

/// Map one gateway frame to a presence event. Frames about `self_id`
/// and heartbeat traffic produce nothing.
pub fn translate(msg: ServerMessage, self_id: &UserId) -> Option<PresenceEvent> {
    match msg {
        ServerMessage::Identified { user_id } => {
            debug!(user_id = %user_id, "Presence identity confirmed");
            None
        }
        ServerMessage::RoomJoined {
            room_id,
            room_name,
            current_users,
            user_count,
        } => Some(PresenceEvent::Snapshot {
            room_id,
            room_name,
            users: current_users.into_iter().filter(|u| u != self_id).collect(),
            user_count,
        }),
        ServerMessage::UserJoined {
            user_id,
            room_id,
            user_count,
        } => (&user_id != self_id).then_some(PresenceEvent::UserJoined {
            user_id,
            room_id,
            user_count,
        }),
        ServerMessage::UserLeft {
            user_id,
            room_id,
            user_count,
        } => (&user_id != self_id).then_some(PresenceEvent::UserLeft {
            user_id,
            room_id,
            user_count,
        }),
        ServerMessage::JoinError { message } => Some(PresenceEvent::JoinError(message)),
        ServerMessage::Error { message } => Some(PresenceEvent::Error(message)),
        ServerMessage::Ping {} | ServerMessage::Pong { .. } => None,
    }
}

/// The orchestrator input a presence event amounts to, if any.
pub fn into_orchestrator_input(event: PresenceEvent) -> Option<OrchestratorInput> {
    match event {
        PresenceEvent::Snapshot { users, .. } => Some(OrchestratorInput::Snapshot { users }),
        PresenceEvent::UserJoined { user_id, .. } => Some(OrchestratorInput::PeerJoined(user_id)),
        PresenceEvent::UserLeft { user_id, .. } => Some(OrchestratorInput::PeerLeft(user_id)),
        PresenceEvent::Disconnected | PresenceEvent::RoomLeft { .. } => {
            Some(OrchestratorInput::PresenceLost)
        }
        PresenceEvent::Connected | PresenceEvent::JoinError(_) | PresenceEvent::Error(_) => None,
    }
}

/// Feed presence events into a running orchestrator until either side
/// goes away.
pub fn forward(
    mut events: mpsc::Receiver<PresenceEvent>,
    orchestrator: OrchestratorHandle,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match &event {
                PresenceEvent::JoinError(message) => warn!(message = %message, "Room join rejected"),
                PresenceEvent::Error(message) => warn!(message = %message, "Presence error"),
                _ => {}
            }
            if let Some(input) = into_orchestrator_input(event) {
                if !orchestrator.send(input) {
                    break;
                }
            }
        }
    })
}
