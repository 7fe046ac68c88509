//! Server bootstrap: binds both listeners and runs gateway and directory
//! side by side over one shared registry.


use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use huddle_common::HuddleError;
use huddle_config::HuddleConfig;
use tokio::net::TcpListener;

use crate::directory;
use crate::gateway::Gateway;
use crate::registry::RoomRegistry;
use crate::transport::{self, TransportSettings};

pub struct PresenceServer {
    registry: Arc<RoomRegistry>,
    gateway: Arc<Gateway>,
    ws_listener: TcpListener,
    http_listener: TcpListener,
    settings: TransportSettings,
}

impl PresenceServer {
    /// Seed the registry and bind both ports. Port 0 picks a free port.
    pub async fn bind(config: &HuddleConfig) -> Result<Self, HuddleError> {
        let registry = Arc::new(RoomRegistry::from_config(&config.rooms).await?);
        let gateway = Arc::new(Gateway::new(Arc::clone(&registry)));

        let host = &config.server.bind_address;
        let ws_listener = TcpListener::bind((host.as_str(), config.server.ws_port)).await?;
        let http_listener = TcpListener::bind((host.as_str(), config.server.http_port)).await?;

        Ok(Self {
            registry,
            gateway,
            ws_listener,
            http_listener,
            settings: TransportSettings::from(&config.server),
        })
    }

    pub fn ws_addr(&self) -> std::io::Result<SocketAddr> {
        self.ws_listener.local_addr()
    }

    pub fn http_addr(&self) -> std::io::Result<SocketAddr> {
        self.http_listener.local_addr()
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Run until the HTTP server stops.
    pub async fn run(self) -> Result<(), HuddleError> {
        if let (Ok(ws), Ok(http)) = (self.ws_addr(), self.http_addr()) {
            tracing::info!(ws = %ws, http = %http, "huddle-presence listening");
        }

        let app = directory::router(Arc::clone(&self.registry));
        tokio::select! {
            _ = transport::serve(self.ws_listener, self.gateway, self.settings) => Ok(()),
            result = axum::serve(self.http_listener, app).into_future() => result.map_err(HuddleError::from),
        }
    }
}
