//! Chat endpoints.
//!
//! Provides HTTP endpoints for:
//! - Sending a chat message (POST /chat/send)
//! - Listing received messages (GET /chat/messages)

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::chat::MessageLog;

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub message: String,
}

#[derive(Clone)]
pub struct ChatState {
    pub outgoing: mpsc::Sender<String>,
    pub log: MessageLog,
}

/// Creates the chat router with all chat-related endpoints.
pub fn router(state: ChatState) -> Router {
    Router::new()
        .route("/send", post(send_message))
        .route("/messages", get(list_messages))
        .with_state(state)
}

/// Queues a message on the chat channel. Blank messages are rejected.
async fn send_message(
    State(state): State<ChatState>,
    Json(req): Json<SendRequest>,
) -> ApiResult<Json<Value>> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("Message must not be empty"));
    }

    info!("Chat message queued via API");
    state
        .outgoing
        .send(message.to_string())
        .await
        .map_err(|_| ApiError::internal("Chat channel is closed"))?;

    Ok(Json(json!({ "success": true })))
}

/// Lists messages received so far, oldest first.
async fn list_messages(State(state): State<ChatState>) -> Json<Value> {
    let messages = state.log.messages().await;
    Json(json!({ "messages": messages }))
}
