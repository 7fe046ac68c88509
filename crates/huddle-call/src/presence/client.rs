//! Presence client with auto-reconnect.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use huddle_common::protocol::now_millis;
use huddle_common::{ClientMessage, RoomId, ServerMessage, UserId};
use huddle_config::PresenceConfig;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::translator::{translate, PresenceEvent};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Requests from the application to the connection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceCommand {
    Join(RoomId),
    Leave,
    Disconnect,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Keeps one user connected to the presence gateway and in its room.
pub struct PresenceClient {
    user_id: UserId,
    command_tx: mpsc::Sender<PresenceCommand>,
    connected: Arc<RwLock<bool>>,
}

impl PresenceClient {
    /// Start the connection task. It identifies as `user_id` and joins
    /// `config.room_id` (if set) on every connect.
    pub fn start(config: PresenceConfig, user_id: UserId) -> (Self, mpsc::Receiver<PresenceEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (command_tx, command_rx) = mpsc::channel(32);
        let connected = Arc::new(RwLock::new(false));
        let room = (!config.room_id.is_empty()).then(|| RoomId::from(config.room_id.as_str()));

        tokio::spawn(connection_loop(
            config,
            user_id.clone(),
            room,
            Arc::clone(&connected),
            event_tx,
            command_rx,
        ));

        let client = Self {
            user_id,
            command_tx,
            connected,
        };
        (client, event_rx)
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }

    /// Move to `room`. Remembered across reconnects.
    pub async fn join(&self, room: RoomId) {
        let _ = self.command_tx.send(PresenceCommand::Join(room)).await;
    }

    pub async fn leave(&self) {
        let _ = self.command_tx.send(PresenceCommand::Leave).await;
    }

    /// Leave the room, close the socket and stop reconnecting.
    pub async fn disconnect(&self) {
        let _ = self.command_tx.send(PresenceCommand::Disconnect).await;
    }
}

// ---------------------------------------------------------------------------
// Connection loop
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionExit {
    Lost,
    Shutdown,
}

async fn connection_loop(
    config: PresenceConfig,
    user_id: UserId,
    mut room: Option<RoomId>,
    connected: Arc<RwLock<bool>>,
    event_tx: mpsc::Sender<PresenceEvent>,
    mut command_rx: mpsc::Receiver<PresenceCommand>,
) {
    let mut reconnect_delay = config.reconnect_delay_secs;

    loop {
        info!(url = %config.server_url, "Connecting to presence gateway");

        match tokio::time::timeout(
            CONNECT_TIMEOUT,
            tokio_tungstenite::connect_async(config.server_url.as_str()),
        )
        .await
        {
            Ok(Ok((ws_stream, _))) => {
                reconnect_delay = config.reconnect_delay_secs;
                *connected.write().await = true;
                let _ = event_tx.send(PresenceEvent::Connected).await;

                let exit = run_session(
                    ws_stream,
                    &config,
                    &user_id,
                    &mut room,
                    &event_tx,
                    &mut command_rx,
                )
                .await;

                *connected.write().await = false;
                let _ = event_tx.send(PresenceEvent::Disconnected).await;
                if exit == SessionExit::Shutdown {
                    info!(user_id = %user_id, "Presence client stopped");
                    return;
                }
            }
            Ok(Err(e)) => {
                error!(error = %e, "Failed to connect to presence gateway");
                let _ = event_tx
                    .send(PresenceEvent::Error(format!("Connection failed: {e}")))
                    .await;
            }
            Err(_elapsed) => {
                error!("Presence connection timed out after 15s");
                let _ = event_tx
                    .send(PresenceEvent::Error(
                        "Connection timed out after 15s".to_string(),
                    ))
                    .await;
            }
        }

        // Exponential backoff. Commands still apply while we wait.
        info!(delay = reconnect_delay, "Reconnecting in {} seconds", reconnect_delay);
        let wake = tokio::time::sleep(Duration::from_secs(reconnect_delay));
        tokio::pin!(wake);
        loop {
            tokio::select! {
                _ = &mut wake => break,
                command = command_rx.recv() => match command {
                    Some(PresenceCommand::Join(next)) => room = Some(next),
                    Some(PresenceCommand::Leave) => room = None,
                    Some(PresenceCommand::Disconnect) | None => {
                        info!(user_id = %user_id, "Presence client stopped");
                        return;
                    }
                },
            }
        }
        reconnect_delay = (reconnect_delay * 2).min(config.max_reconnect_delay_secs);
    }
}

/// Drive one connected socket until it drops or the client shuts down.
async fn run_session(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    config: &PresenceConfig,
    user_id: &UserId,
    room: &mut Option<RoomId>,
    event_tx: &mpsc::Sender<PresenceEvent>,
    command_rx: &mut mpsc::Receiver<PresenceCommand>,
) -> SessionExit {
    let (mut write, mut read) = ws_stream.split();

    // Re-establish identity and membership.
    let mut hello = vec![ClientMessage::Identify {
        user_id: user_id.clone(),
    }];
    if let Some(room_id) = room.as_ref() {
        hello.push(ClientMessage::JoinRoom {
            user_id: user_id.clone(),
            room_id: room_id.clone(),
        });
    }
    for msg in &hello {
        if send_message(&mut write, msg).await.is_err() {
            return SessionExit::Lost;
        }
    }

    let period = Duration::from_secs(config.heartbeat_interval_secs.max(1));
    let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(ServerMessage::Ping {}) => {
                        let pong = ClientMessage::Pong { timestamp: now_millis() };
                        if send_message(&mut write, &pong).await.is_err() {
                            return SessionExit::Lost;
                        }
                    }
                    Ok(msg) => {
                        if let Some(event) = translate(msg, user_id) {
                            if event_tx.send(event).await.is_err() {
                                return SessionExit::Shutdown;
                            }
                        }
                    }
                    Err(e) => debug!(error = %e, "Unrecognized presence frame"),
                },
                Some(Ok(WsMessage::Close(_))) | None => {
                    info!("Presence gateway closed connection");
                    return SessionExit::Lost;
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Presence WebSocket error");
                    return SessionExit::Lost;
                }
                Some(Ok(_)) => {}
            },

            command = command_rx.recv() => {
                let (msg, vacated) = match command {
                    Some(PresenceCommand::Join(next)) => {
                        let vacated = room.replace(next.clone()).filter(|prev| prev != &next);
                        (ClientMessage::JoinRoom { user_id: user_id.clone(), room_id: next }, vacated)
                    }
                    Some(PresenceCommand::Leave) => (ClientMessage::LeaveRoom {}, room.take()),
                    Some(PresenceCommand::Disconnect) | None => {
                        let _ = send_message(&mut write, &ClientMessage::LeaveRoom {}).await;
                        let _ = write.send(WsMessage::Close(None)).await;
                        return SessionExit::Shutdown;
                    }
                };
                // Peers from the old room are gone as far as we're concerned.
                if let Some(room_id) = vacated {
                    if event_tx.send(PresenceEvent::RoomLeft { room_id }).await.is_err() {
                        return SessionExit::Shutdown;
                    }
                }
                if send_message(&mut write, &msg).await.is_err() {
                    return SessionExit::Lost;
                }
            }

            _ = heartbeat.tick() => {
                if send_message(&mut write, &ClientMessage::Ping {}).await.is_err() {
                    return SessionExit::Lost;
                }
            }
        }
    }
}

async fn send_message<S>(write: &mut S, msg: &ClientMessage) -> Result<(), WsError>
where
    S: Sink<WsMessage, Error = WsError> + Unpin,
{
    write.send(WsMessage::Text(msg.to_json().into())).await
}
