//! huddle-presence: room registry, presence gateway and room directory.
//!
//! The registry owns rooms and memberships. The gateway layers the
//! per-connection presence protocol on top of it, and the directory
//! exposes room listing and creation over HTTP. [`server::PresenceServer`]
//! wires all three to real sockets.

pub mod directory;
pub mod gateway;
pub mod registry;
pub mod server;
pub mod transport;

pub use gateway::{ConnectionState, Gateway, Session};
pub use registry::{
    JoinOutcome, MembershipObserver, RoomChange, RoomPolicy, RoomRegistry, RoomSnapshot, RoomSpec,
};
pub use server::PresenceServer;
