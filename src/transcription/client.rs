//! HTTP client for the consultation backend's transcription endpoints.
//!
//! Two calls: a multipart POST that creates a transcription job from the
//! recorded audio, and a lightweight GET used to poll that job's status.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::error::ConsultError;

/// Response from the transcription-creation endpoint.
#[derive(Debug, Deserialize)]
pub struct CreateResponse {
    pub success: bool,
    pub transcription_id: Option<String>,
    pub error: Option<String>,
}

/// Poll result from the status endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobStatus {
    pub completed: bool,
    pub failed: bool,
    pub error_message: Option<String>,
}

/// Transcription backend surface, kept behind a trait so the pipeline can be
/// driven without a server.
#[async_trait]
pub trait TranscriptionApi: Send + Sync {
    /// Submit one audio payload for the appointment, returns the
    /// server-assigned transcription id.
    async fn create(&self, appointment_id: &str, audio: Vec<u8>) -> Result<String>;

    async fn status(&self, transcription_id: &str) -> Result<JobStatus>;
}

pub struct HttpTranscriptionApi {
    client: reqwest::Client,
    base_url: String,
    csrf_token: String,
}

impl HttpTranscriptionApi {
    pub fn new(base_url: &str, csrf_token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            csrf_token: csrf_token.to_string(),
        }
    }
}

#[async_trait]
impl TranscriptionApi for HttpTranscriptionApi {
    async fn create(&self, appointment_id: &str, audio: Vec<u8>) -> Result<String> {
        let url = format!("{}/transcription/create/{}/", self.base_url, appointment_id);
        info!("Submitting audio for transcription to {}", url);

        let form = Form::new().part(
            "audio_data",
            Part::bytes(audio)
                .file_name("recording.mp3")
                .mime_str("audio/mp3")?,
        );

        let response = self
            .client
            .post(&url)
            .header("X-CSRFToken", &self.csrf_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ConsultError::transport(format!("Failed to submit transcription: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read transcription response body")?;

        if !status.is_success() {
            error!("Transcription submit failed with status {}: {}", status, body);
            if let Ok(parsed) = serde_json::from_str::<CreateResponse>(&body) {
                if let Some(message) = parsed.error {
                    return Err(ConsultError::remote(format!(
                        "Server error ({status}): {message}"
                    ))
                    .into());
                }
            }
            return Err(ConsultError::remote(format!(
                "Transcription submit failed ({status}): {body}"
            ))
            .into());
        }

        let parsed: CreateResponse =
            serde_json::from_str(&body).context("Failed to parse transcription response")?;

        if !parsed.success {
            return Err(ConsultError::remote(
                parsed
                    .error
                    .unwrap_or_else(|| "Failed to start transcription".to_string()),
            )
            .into());
        }

        parsed
            .transcription_id
            .context("Transcription response carried no transcription_id")
    }

    async fn status(&self, transcription_id: &str) -> Result<JobStatus> {
        let url = format!("{}/transcription/status/{}/", self.base_url, transcription_id);
        debug!("Checking transcription status at {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ConsultError::transport(format!("Failed to check status: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read status response body")?;

        if !status.is_success() {
            return Err(ConsultError::remote(format!(
                "Status check failed ({status}): {body}"
            ))
            .into());
        }

        serde_json::from_str(&body).context("Failed to parse status response")
    }
}
