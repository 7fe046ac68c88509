//! huddle-presence: presence and room directory server.
//!
//! Serves the WebSocket presence protocol on one port and the room
//! directory HTTP API on another. Call media never passes through here.

use std::path::PathBuf;

use clap::Parser;
use huddle_presence::PresenceServer;

#[derive(Parser)]
#[command(name = "huddle-presence", about = "Presence and room directory server for huddle")]
struct Args {
    /// Config file (defaults to the platform config dir).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// WebSocket port, overriding the config file.
    #[arg(long)]
    ws_port: Option<u16>,

    /// Directory HTTP port, overriding the config file.
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let loaded = match &args.config {
        Some(path) => huddle_config::load_config_from(path),
        None => huddle_config::load_config(),
    };
    let (mut config, config_error) = match loaded {
        Ok(config) => (config, None),
        Err(e) => (huddle_config::HuddleConfig::default(), Some(e)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .init();

    if let Some(e) = config_error {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
    }
    if let Some(port) = args.ws_port {
        config.server.ws_port = port;
    }
    if let Some(port) = args.http_port {
        config.server.http_port = port;
    }

    let server = PresenceServer::bind(&config)
        .await
        .expect("Failed to start presence server");

    if let Err(e) = server.run().await {
        tracing::error!(error = %e, "Presence server stopped");
    }
}
