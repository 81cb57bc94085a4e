//! Realtime chat channel with fixed-cadence reconnect.
//!
//! The transport is a trait so the reconnect behavior can be driven without
//! a server; the production transport is tokio-tungstenite. A dropped
//! connection schedules reconnect attempts every `reconnect_interval` until
//! one succeeds, after which the timer is cleared. Manual teardown stops
//! everything.

use anyhow::Result;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use super::message::{ChatMessage, MessageLog, OutgoingMessage};
use crate::error::ConsultError;

pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatStatus {
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn ChatConnection>>;
}

#[async_trait]
pub trait ChatConnection: Send {
    async fn send(&mut self, text: String) -> Result<()>;

    /// Next text frame. `None` means the peer closed the channel.
    async fn recv(&mut self) -> Option<Result<String>>;

    async fn close(&mut self);
}

/// Production transport: `{ws|wss}://host/ws/chat/{appointment_id}/`.
pub struct WsChatTransport {
    url: String,
}

impl WsChatTransport {
    pub fn new(host: &str, secure: bool, appointment_id: &str) -> Self {
        let scheme = if secure { "wss" } else { "ws" };
        Self {
            url: format!("{scheme}://{host}/ws/chat/{appointment_id}/"),
        }
    }
}

#[async_trait]
impl ChatTransport for WsChatTransport {
    async fn connect(&self) -> Result<Box<dyn ChatConnection>> {
        debug!("Connecting chat channel to {}", self.url);
        let (ws, _) = connect_async(&self.url)
            .await
            .map_err(|e| ConsultError::transport(format!("Chat connection failed: {e}")))?;
        let (sink, stream) = ws.split();
        Ok(Box::new(WsChatConnection { sink, stream }))
    }
}

struct WsChatConnection {
    sink: futures::stream::SplitSink<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        Message,
    >,
    stream: futures::stream::SplitStream<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    >,
}

#[async_trait]
impl ChatConnection for WsChatConnection {
    async fn send(&mut self, text: String) -> Result<()> {
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| ConsultError::transport(format!("Chat send failed: {e}")).into())
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => {
                    return Some(Err(
                        ConsultError::transport(format!("Chat channel error: {e}")).into()
                    ))
                }
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.sink.send(Message::Close(None)).await;
    }
}

/// Handle to a running chat channel.
pub struct ChatHandle {
    outgoing: mpsc::Sender<String>,
    status: watch::Receiver<ChatStatus>,
    log: MessageLog,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ChatHandle {
    /// Queue a message for the server. Empty messages are dropped.
    pub async fn send(&self, message: &str) -> Result<()> {
        let message = message.trim();
        if message.is_empty() {
            return Ok(());
        }
        self.outgoing
            .send(message.to_string())
            .await
            .map_err(|_| ConsultError::transport("Chat channel is closed").into())
    }

    pub fn status(&self) -> ChatStatus {
        *self.status.borrow()
    }

    /// Clonable handle for queueing outgoing messages from other tasks.
    pub fn sender(&self) -> mpsc::Sender<String> {
        self.outgoing.clone()
    }

    pub fn log(&self) -> MessageLog {
        self.log.clone()
    }

    /// Tear the channel down; reconnect attempts stop too.
    pub async fn close(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

pub struct ChatChannel;

impl ChatChannel {
    pub fn spawn(transport: Arc<dyn ChatTransport>, log: MessageLog) -> ChatHandle {
        Self::spawn_with_interval(transport, log, RECONNECT_INTERVAL)
    }

    pub fn spawn_with_interval(
        transport: Arc<dyn ChatTransport>,
        log: MessageLog,
        reconnect_interval: Duration,
    ) -> ChatHandle {
        let (outgoing_tx, outgoing_rx) = mpsc::channel(32);
        let (status_tx, status_rx) = watch::channel(ChatStatus::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_loop(
            transport,
            log.clone(),
            reconnect_interval,
            outgoing_rx,
            status_tx,
            shutdown_rx,
        ));

        ChatHandle {
            outgoing: outgoing_tx,
            status: status_rx,
            log,
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// A dropped shutdown sender means the handle is gone; treat it the same as
/// an explicit teardown so the loop can never spin without an owner.
fn shutdown_requested(shutdown: &watch::Receiver<bool>) -> bool {
    shutdown.has_changed().is_err() || *shutdown.borrow()
}

async fn run_loop(
    transport: Arc<dyn ChatTransport>,
    log: MessageLog,
    reconnect_interval: Duration,
    mut outgoing: mpsc::Receiver<String>,
    status: watch::Sender<ChatStatus>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if shutdown_requested(&shutdown) {
            break;
        }

        match transport.connect().await {
            Ok(connection) => {
                info!("Chat channel connected");
                let _ = status.send(ChatStatus::Connected);
                drive(connection, &log, &mut outgoing, &mut shutdown).await;
                if shutdown_requested(&shutdown) {
                    break;
                }
                warn!("Chat channel lost, reconnecting");
                let _ = status.send(ChatStatus::Reconnecting);
            }
            Err(e) => {
                warn!("Chat connect failed: {e:#}");
                let _ = status.send(ChatStatus::Reconnecting);
            }
        }

        tokio::select! {
            _ = sleep(reconnect_interval) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    let _ = status.send(ChatStatus::Closed);
    debug!("Chat channel loop stopped");
}

/// Pump one live connection until it drops or teardown is requested.
async fn drive(
    mut connection: Box<dyn ChatConnection>,
    log: &MessageLog,
    outgoing: &mut mpsc::Receiver<String>,
    shutdown: &mut watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            incoming = connection.recv() => match incoming {
                Some(Ok(text)) => match serde_json::from_str::<ChatMessage>(&text) {
                    Ok(message) => {
                        log.insert(message).await;
                    }
                    Err(e) => warn!("Dropping malformed chat message: {e}"),
                },
                Some(Err(e)) => {
                    warn!("Chat channel error: {e:#}");
                    return;
                }
                None => {
                    debug!("Chat channel closed by server");
                    return;
                }
            },
            queued = outgoing.recv() => match queued {
                Some(text) => {
                    let payload = match serde_json::to_string(&OutgoingMessage { message: text }) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!("Failed to encode chat message: {e}");
                            continue;
                        }
                    };
                    if connection.send(payload).await.is_err() {
                        return;
                    }
                }
                None => {
                    connection.close().await;
                    return;
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    connection.close().await;
                    return;
                }
            }
        }
    }
}
