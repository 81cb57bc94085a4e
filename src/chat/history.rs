//! Chat history backfill over HTTP.

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::message::{ChatMessage, HistoryResponse, MessageLog};
use crate::error::ConsultError;

pub struct HistoryClient {
    client: reqwest::Client,
    base_url: String,
    csrf_token: Option<String>,
}

impl HistoryClient {
    pub fn new(base_url: &str, csrf_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            csrf_token,
        }
    }

    /// Fetch messages for the appointment newer than `last_message_id`.
    pub async fn fetch_since(
        &self,
        appointment_id: &str,
        last_message_id: i64,
    ) -> Result<Vec<ChatMessage>> {
        let url = format!(
            "{}/chat/appointment/{}/messages/?last_message_id={}",
            self.base_url, appointment_id, last_message_id
        );

        let mut request = self.client.get(&url);
        if let Some(token) = &self.csrf_token {
            request = request.header("X-CSRFToken", token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ConsultError::transport(format!("Failed to load chat history: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConsultError::remote(format!(
                "Chat history request failed ({status})"
            ))
            .into());
        }

        let parsed: HistoryResponse = response
            .json()
            .await
            .context("Failed to parse chat history response")?;

        Ok(parsed.messages)
    }

    /// Backfill the log from the server, starting at the log's cursor.
    ///
    /// Guarded: if a load is already running this is a no-op. A fetch
    /// failure is surfaced and does not retry.
    pub async fn load_into(&self, appointment_id: &str, log: &MessageLog) -> Result<usize> {
        if !log.begin_history_load().await {
            warn!("Chat history load already in progress");
            return Ok(0);
        }

        let result = self
            .fetch_since(appointment_id, log.last_message_id().await)
            .await;
        log.finish_history_load().await;

        let messages = result?;
        let mut inserted = 0;
        for message in messages {
            if log.insert(message).await {
                inserted += 1;
            }
        }

        info!("Loaded {} chat history messages", inserted);
        Ok(inserted)
    }
}
