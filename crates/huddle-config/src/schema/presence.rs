//! Presence client configuration.

use serde::{Deserialize, Serialize};

/// Where the call client finds the presence gateway and which room it joins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    pub server_url: String,
    pub room_id: String,
    pub reconnect_delay_secs: u64,
    pub max_reconnect_delay_secs: u64,
    pub heartbeat_interval_secs: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:3001".into(),
            room_id: "conference-room".into(),
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 30,
            heartbeat_interval_secs: 25,
        }
    }
}
