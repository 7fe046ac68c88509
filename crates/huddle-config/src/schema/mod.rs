//! Configuration schema types for Huddle.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod calls;
mod capture;
mod presence;
mod rooms;
mod server;
mod system;

pub use calls::*;
pub use capture::*;
pub use presence::*;
pub use rooms::*;
pub use server::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Root configuration shared by the presence server and the call client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HuddleConfig {
    pub server: ServerConfig,
    pub rooms: RoomsConfig,
    pub capture: CaptureConfig,
    pub calls: CallsConfig,
    pub presence: PresenceConfig,
    pub logging: LoggingConfig,
}

// =============================================================================
// Tests
// =============================================================================
