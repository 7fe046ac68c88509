use std::path::PathBuf;

use crate::id::{RoomId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("room not found: {0}")]
    RoomNotFound(RoomId),

    #[error("room {room_id} is full ({capacity} members)")]
    RoomFull { room_id: RoomId, capacity: u32 },

    #[error("invalid room spec: {0}")]
    InvalidSpec(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    #[error("dial to {peer} failed: {reason}")]
    DialFailed { peer: UserId, reason: String },

    #[error("peer {peer} error: {kind}")]
    PeerError { peer: UserId, kind: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("connection has no identity attached")]
    NotAuthenticated,

    #[error("connection is bound to {bound}, not {requested}")]
    IdentityMismatch { bound: UserId, requested: UserId },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum HuddleError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Call(#[from] CallError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
