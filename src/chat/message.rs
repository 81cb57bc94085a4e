//! Chat message wire types and the in-memory message log.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// One chat message as the server sends it, over the live channel or the
/// history endpoint. History rows carry a storage `id` the live channel
/// omits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub id: Option<i64>,
    pub message_id: i64,
    pub message: String,
    pub is_self: bool,
    pub sender_name: String,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryResponse {
    pub messages: Vec<ChatMessage>,
}

/// Client → server payload on the live channel.
#[derive(Debug, Serialize)]
pub struct OutgoingMessage {
    pub message: String,
}

#[derive(Default)]
struct LogState {
    messages: Vec<ChatMessage>,
    last_message_id: i64,
    loading_history: bool,
}

/// Shared, de-duplicating message log.
///
/// Messages arrive from two paths (history backfill and the live channel)
/// and may overlap; `message_id` decides identity.
#[derive(Clone, Default)]
pub struct MessageLog {
    inner: Arc<Mutex<LogState>>,
}

impl MessageLog {
    /// Append a message unless one with the same `message_id` is already
    /// displayed. Returns whether it was inserted.
    pub async fn insert(&self, message: ChatMessage) -> bool {
        let mut state = self.inner.lock().await;
        if state
            .messages
            .iter()
            .any(|m| m.message_id == message.message_id)
        {
            return false;
        }
        if message.message_id > state.last_message_id {
            state.last_message_id = message.message_id;
        }
        state.messages.push(message);
        true
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.inner.lock().await.messages.clone()
    }

    /// Highest message id seen so far; the history endpoint's cursor.
    pub async fn last_message_id(&self) -> i64 {
        self.inner.lock().await.last_message_id
    }

    /// Claim the history-load guard. Returns false when a load is already
    /// running; concurrent loads are rejected, not queued.
    pub async fn begin_history_load(&self) -> bool {
        let mut state = self.inner.lock().await;
        if state.loading_history {
            return false;
        }
        state.loading_history = true;
        true
    }

    pub async fn finish_history_load(&self) {
        self.inner.lock().await.loading_history = false;
    }
}
