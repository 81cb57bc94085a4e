//! Production widget binding over the provider's room event endpoint.
//!
//! Joining opens a WebSocket to the hosted provider, announces the room and
//! access token, and maps incoming event payloads into `CallEvent` variants.
//! Malformed payloads are dropped at this boundary with a warning; they never
//! reach the controller.

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::ConferenceWidget;
use crate::call::event::CallEvent;
use crate::error::ConsultError;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

pub struct EventBridgeWidget {
    url: String,
    room_name: String,
    token: String,
    events_tx: mpsc::Sender<CallEvent>,
    events_rx: Option<mpsc::Receiver<CallEvent>>,
    sink: Option<WsSink>,
    reader_task: Option<JoinHandle<()>>,
}

impl EventBridgeWidget {
    pub fn new(url: &str, room_name: &str, token: &str) -> Self {
        let (events_tx, events_rx) = mpsc::channel(32);
        Self {
            url: url.to_string(),
            room_name: room_name.to_string(),
            token: token.to_string(),
            events_tx,
            events_rx: Some(events_rx),
            sink: None,
            reader_task: None,
        }
    }

    async fn send_command(&mut self, payload: serde_json::Value) -> Result<()> {
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| ConsultError::transport("Not connected to the call provider"))?;
        sink.send(Message::Text(payload.to_string()))
            .await
            .map_err(|e| ConsultError::transport(format!("Failed to send call command: {e}")).into())
    }

    fn spawn_reader(&mut self, mut source: WsSource) {
        let tx = self.events_tx.clone();
        self.reader_task = Some(tokio::spawn(async move {
            while let Some(message) = source.next().await {
                match message {
                    Ok(Message::Text(text)) => match CallEvent::from_wire(&text) {
                        Ok(event) => {
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping malformed widget event: {e:#}"),
                    },
                    Ok(Message::Close(_)) => {
                        debug!("Widget event stream closed by provider");
                        let _ = tx.send(CallEvent::Left).await;
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let _ = tx
                            .send(CallEvent::Error {
                                message: format!("Widget connection error: {e}"),
                            })
                            .await;
                        return;
                    }
                }
            }
            let _ = tx.send(CallEvent::Left).await;
        }));
    }
}

#[async_trait]
impl ConferenceWidget for EventBridgeWidget {
    fn take_events(&mut self) -> Option<mpsc::Receiver<CallEvent>> {
        self.events_rx.take()
    }

    async fn join(&mut self) -> Result<()> {
        info!("Joining room \"{}\" via {}", self.room_name, self.url);

        let (ws, _) = connect_async(&self.url)
            .await
            .map_err(|e| ConsultError::transport(format!("Failed to reach provider: {e}")))?;
        let (mut sink, source) = ws.split();

        let hello = json!({ "room": self.room_name, "token": self.token });
        sink.send(Message::Text(hello.to_string()))
            .await
            .map_err(|e| ConsultError::transport(format!("Failed to announce join: {e}")))?;

        self.spawn_reader(source);
        self.sink = Some(sink);
        Ok(())
    }

    async fn leave(&mut self) -> Result<()> {
        if let Some(mut sink) = self.sink.take() {
            debug!("Leaving room \"{}\"", self.room_name);
            let _ = sink.send(Message::Close(None)).await;
        }
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        Ok(())
    }

    async fn set_local_audio(&mut self, enabled: bool) -> Result<()> {
        debug!("Setting local audio enabled={enabled}");
        self.send_command(json!({ "command": "set-local-audio", "enabled": enabled }))
            .await
    }

    async fn set_local_video(&mut self, enabled: bool) -> Result<()> {
        debug!("Setting local video enabled={enabled}");
        self.send_command(json!({ "command": "set-local-video", "enabled": enabled }))
            .await
    }
}

impl Drop for EventBridgeWidget {
    fn drop(&mut self) {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
    }
}
