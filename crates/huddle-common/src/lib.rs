pub mod errors;
pub mod id;
pub mod protocol;

pub use errors::{CallError, ConfigError, GatewayError, HuddleError, MediaError, RegistryError};
pub use id::{ConnectionId, RoomId, UserId};
pub use protocol::{ClientMessage, CreateRoomRequest, RoomSummary, ServerMessage, Visibility};

pub type Result<T> = std::result::Result<T, HuddleError>;
