//! Chat channel behavior against a scripted transport: reconnect cadence,
//! history-plus-live deduplication.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use teleconsult::chat::{ChatChannel, ChatConnection, ChatMessage, ChatStatus, ChatTransport, MessageLog};
use teleconsult::error::ConsultError;

struct ScriptedConnection {
    incoming: mpsc::Receiver<String>,
}

#[async_trait]
impl ChatConnection for ScriptedConnection {
    async fn send(&mut self, _text: String) -> Result<()> {
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        self.incoming.recv().await.map(Ok)
    }

    async fn close(&mut self) {}
}

struct ScriptedTransport {
    failures_before_success: usize,
    attempts: AtomicUsize,
    incoming_tx: Mutex<Option<mpsc::Sender<String>>>,
}

impl ScriptedTransport {
    fn new(failures_before_success: usize) -> Self {
        Self {
            failures_before_success,
            attempts: AtomicUsize::new(0),
            incoming_tx: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn connect(&self) -> Result<Box<dyn ChatConnection>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures_before_success {
            return Err(ConsultError::transport("connection refused").into());
        }
        let (tx, rx) = mpsc::channel(8);
        *self.incoming_tx.lock().unwrap() = Some(tx);
        Ok(Box::new(ScriptedConnection { incoming: rx }))
    }
}

fn wire_message(id: i64, text: &str) -> String {
    format!(
        r#"{{"message_id": {id}, "message": "{text}", "is_self": false,
            "sender_name": "Dr. Rao", "timestamp": "10:15"}}"#
    )
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_until_success_then_stop() {
    let transport = Arc::new(ScriptedTransport::new(3));
    let handle = ChatChannel::spawn(
        Arc::clone(&transport) as Arc<dyn ChatTransport>,
        MessageLog::default(),
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(handle.status(), ChatStatus::Reconnecting);

    // One attempt every five seconds until the fourth succeeds.
    tokio::time::sleep(Duration::from_secs(16)).await;
    assert_eq!(transport.attempts.load(Ordering::SeqCst), 4);
    assert_eq!(handle.status(), ChatStatus::Connected);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.attempts.load(Ordering::SeqCst), 4);

    handle.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_history_and_live_messages_deduplicate() {
    let transport = Arc::new(ScriptedTransport::new(0));
    let log = MessageLog::default();
    let handle = ChatChannel::spawn(
        Arc::clone(&transport) as Arc<dyn ChatTransport>,
        log.clone(),
    );
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Simulate a history backfill that already delivered message 1.
    log.insert(ChatMessage {
        id: Some(1),
        message_id: 1,
        message: "earlier".to_string(),
        is_self: false,
        sender_name: "Dr. Rao".to_string(),
        timestamp: "10:00".to_string(),
    })
    .await;

    let tx = transport.incoming_tx.lock().unwrap().clone().unwrap();
    tx.send(wire_message(1, "earlier")).await.unwrap();
    tx.send(wire_message(2, "and now this")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let messages = log.messages().await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].message, "earlier");
    assert_eq!(messages[1].message, "and now this");
    assert_eq!(log.last_message_id().await, 2);

    handle.close().await;
}
