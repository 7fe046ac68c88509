//! Presence server configuration types.

use serde::{Deserialize, Serialize};

/// Listener and liveness settings for the presence server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    /// WebSocket presence gateway port.
    pub ws_port: u16,
    /// Room directory HTTP port.
    pub http_port: u16,
    /// Seconds between server-initiated `ping` frames.
    pub heartbeat_interval_secs: u64,
    /// Close a connection after this many seconds without inbound traffic.
    pub idle_timeout_secs: u64,
    /// Seconds a new connection has to send its first frame.
    pub hello_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            ws_port: 3001,
            http_port: 3002,
            heartbeat_interval_secs: 25,
            idle_timeout_secs: 60,
            hello_timeout_secs: 10,
        }
    }
}
