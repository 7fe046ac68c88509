//! WebSocket transport: accept loop and per-connection pump.
//!
//! Each socket gets its own task that forwards gateway output to the
//! client, decodes inbound frames for the gateway, and enforces liveness
//! with a heartbeat. Whatever ends the loop, the gateway is told.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use huddle_common::{ClientMessage, ConnectionId, GatewayError, ServerMessage};
use huddle_config::ServerConfig;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use crate::gateway::Gateway;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsStream = SplitStream<WebSocketStream<TcpStream>>;

/// Liveness timings for presence connections.
#[derive(Debug, Clone, Copy)]
pub struct TransportSettings {
    pub heartbeat_interval: Duration,
    pub idle_timeout: Duration,
    pub hello_timeout: Duration,
}

impl From<&ServerConfig> for TransportSettings {
    /// Zero timings are raised to one second; a zero interval would panic.
    fn from(config: &ServerConfig) -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(config.heartbeat_interval_secs.max(1)),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs.max(1)),
            hello_timeout: Duration::from_secs(config.hello_timeout_secs.max(1)),
        }
    }
}

/// Registration with the gateway that is released even if the pump
/// unwinds.
struct Registration {
    inner: Option<(Arc<Gateway>, ConnectionId)>,
}

impl Registration {
    fn new(gateway: Arc<Gateway>, conn: ConnectionId) -> Self {
        Self {
            inner: Some((gateway, conn)),
        }
    }

    async fn release(mut self, reason: &str) {
        if let Some((gateway, conn)) = self.inner.take() {
            gateway.disconnect(&conn, reason).await;
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let Some((gateway, conn)) = self.inner.take() else {
            return;
        };
        tracing::warn!(conn = %conn, "Presence connection aborted");
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                gateway.disconnect(&conn, "aborted").await;
            });
        }
    }
}

/// Accept presence connections until the listener fails permanently.
pub async fn serve(listener: TcpListener, gateway: Arc<Gateway>, settings: TransportSettings) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let gateway = Arc::clone(&gateway);
                tokio::spawn(async move {
                    match accept_async(stream).await {
                        Ok(ws) => handle_connection(ws, addr, gateway, settings).await,
                        Err(e) => {
                            tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
            }
        }
    }
}

/// Drive one WebSocket connection until it closes.
pub async fn handle_connection(
    ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    gateway: Arc<Gateway>,
    settings: TransportSettings,
) {
    let (mut sink, mut stream) = ws.split();

    // 1. Nothing is registered until the client says something.
    let first = match read_first(&mut sink, &mut stream, addr, settings.hello_timeout).await {
        Some(msg) => msg,
        None => return,
    };

    // 2. Register and dispatch the first frame.
    let (conn, mut rx) = gateway.connect().await;
    let registration = Registration::new(Arc::clone(&gateway), conn.clone());
    tracing::debug!(peer = %addr, conn = %conn, "Presence connection opened");
    gateway.handle(&conn, first).await;

    // 3. Pump until something gives.
    let mut heartbeat = tokio::time::interval(settings.heartbeat_interval);
    heartbeat.tick().await;
    let mut last_inbound = Instant::now();

    let reason: Result<(), GatewayError> = loop {
        tokio::select! {
            outbound = rx.recv() => {
                let Some(msg) = outbound else {
                    // Gateway dropped us (session replaced or shut down).
                    let _ = sink.send(Message::Close(None)).await;
                    break Ok(());
                };
                if let Err(e) = send_message(&mut sink, &msg).await {
                    break Err(GatewayError::ConnectionLost(e.to_string()));
                }
            }

            frame = stream.next() => {
                last_inbound = Instant::now();
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) => gateway.handle(&conn, msg).await,
                            Err(e) => {
                                tracing::debug!(peer = %addr, error = %e, "Malformed frame");
                                let err = GatewayError::Protocol(e.to_string());
                                let _ = send_message(&mut sink, &ServerMessage::Error {
                                    message: err.to_string(),
                                })
                                .await;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break Ok(()),
                    Some(Err(e)) => break Err(GatewayError::ConnectionLost(e.to_string())),
                    _ => {}
                }
            }

            _ = heartbeat.tick() => {
                if last_inbound.elapsed() >= settings.idle_timeout {
                    break Err(GatewayError::ConnectionLost(format!(
                        "no traffic for {}s",
                        settings.idle_timeout.as_secs()
                    )));
                }
                if let Err(e) = send_message(&mut sink, &ServerMessage::Ping {}).await {
                    break Err(GatewayError::ConnectionLost(e.to_string()));
                }
            }
        }
    };

    // 4. Cleanup.
    let reason = match &reason {
        Ok(()) => "closed".to_string(),
        Err(e) => e.to_string(),
    };
    tracing::debug!(peer = %addr, conn = %conn, reason = %reason, "Presence connection ended");
    registration.release(&reason).await;
}

/// Wait for the first text frame and decode it.
async fn read_first(
    sink: &mut WsSink,
    stream: &mut WsStream,
    addr: SocketAddr,
    timeout: Duration,
) -> Option<ClientMessage> {
    let frame = tokio::time::timeout(timeout, stream.next()).await;

    match frame {
        Ok(Some(Ok(Message::Text(text)))) => match serde_json::from_str::<ClientMessage>(&text) {
            Ok(msg) => Some(msg),
            Err(e) => {
                tracing::warn!(peer = %addr, error = %e, "Invalid first frame");
                let _ = send_message(sink, &ServerMessage::Error {
                    message: GatewayError::Protocol(e.to_string()).to_string(),
                })
                .await;
                None
            }
        },
        Ok(Some(Ok(_))) => {
            tracing::warn!(peer = %addr, "Expected text frame first");
            None
        }
        Ok(Some(Err(e))) => {
            tracing::warn!(peer = %addr, error = %e, "WS error before first frame");
            None
        }
        Ok(None) => {
            tracing::debug!(peer = %addr, "Connection closed before first frame");
            None
        }
        Err(_) => {
            tracing::warn!(peer = %addr, timeout_secs = timeout.as_secs(), "First frame timeout");
            None
        }
    }
}

/// Send a ServerMessage as a JSON text frame.
async fn send_message(
    sink: &mut WsSink,
    msg: &ServerMessage,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    sink.send(Message::Text(msg.to_json().into())).await
}
