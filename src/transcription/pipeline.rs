//! Submit-and-poll pipeline for one transcription job.
//!
//! At most one job is in flight per session: a second submit while a job is
//! running is rejected client-side, not queued. Preconditions (payload,
//! appointment id, anti-forgery token) are checked before any network call.
//! No stage retries; unrecoverable conditions are surfaced and terminate the
//! stage.

use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{info, warn};

use super::client::TranscriptionApi;
use crate::ui::Banner;

pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Submitted,
    Polling,
    Completed,
    Failed,
}

/// Terminal result of a job that got past submission preconditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed {
        transcription_id: String,
        /// Where the user is taken on success.
        detail_path: String,
    },
    Failed {
        message: String,
    },
}

pub struct TranscriptionPipeline {
    api: Arc<dyn TranscriptionApi>,
    banner: Banner,
    appointment_id: Option<String>,
    csrf_token: Option<String>,
    poll_interval: Duration,
    in_flight: Mutex<Option<JobPhase>>,
}

impl TranscriptionPipeline {
    pub fn new(
        api: Arc<dyn TranscriptionApi>,
        banner: Banner,
        appointment_id: Option<String>,
        csrf_token: Option<String>,
    ) -> Self {
        Self {
            api,
            banner,
            appointment_id,
            csrf_token,
            poll_interval: POLL_INTERVAL,
            in_flight: Mutex::new(None),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub async fn current_phase(&self) -> Option<JobPhase> {
        *self.in_flight.lock().await
    }

    /// Submit the recorded audio and poll the job to a terminal state.
    ///
    /// Fire-and-forget from the caller's perspective: call teardown spawns
    /// this and does not wait on it.
    pub async fn submit_and_poll(&self, payload: Vec<u8>) -> Result<JobOutcome> {
        let appointment_id = {
            let mut guard = self.in_flight.lock().await;
            if guard.is_some() {
                warn!("Transcription already in progress, ignoring request");
                bail!("transcription already in progress");
            }

            // Local preconditions, checked before any network call.
            if payload.is_empty() {
                self.banner.error("No audio data to transcribe");
                bail!("no audio data to transcribe");
            }
            let Some(appointment_id) = self.appointment_id.clone() else {
                self.banner
                    .error("Appointment ID missing, cannot submit transcription");
                bail!("appointment id missing");
            };
            if self.csrf_token.as_deref().map_or(true, str::is_empty) {
                self.banner
                    .error("Security token missing, cannot submit transcription");
                bail!("security token missing");
            }

            *guard = Some(JobPhase::Submitted);
            appointment_id
        };

        let result = self.run(&appointment_id, payload).await;

        // The guard clears on every terminal path so a later session can
        // submit again.
        *self.in_flight.lock().await = None;

        result
    }

    async fn run(&self, appointment_id: &str, payload: Vec<u8>) -> Result<JobOutcome> {
        info!(
            "Submitting {} bytes of audio for appointment {}",
            payload.len(),
            appointment_id
        );

        let transcription_id = match self.api.create(appointment_id, payload).await {
            Ok(id) => id,
            Err(e) => {
                self.banner
                    .error(format!("Failed to submit transcription: {e}"));
                return Err(e);
            }
        };

        info!("Transcription started with id {}", transcription_id);
        *self.in_flight.lock().await = Some(JobPhase::Polling);

        loop {
            sleep(self.poll_interval).await;

            let status = match self.api.status(&transcription_id).await {
                Ok(status) => status,
                Err(e) => {
                    // A failed poll stops polling; it does not retry
                    // transparently.
                    self.banner
                        .error(format!("Failed to check transcription status: {e}"));
                    return Err(e);
                }
            };

            if status.completed {
                *self.in_flight.lock().await = Some(JobPhase::Completed);
                let detail_path = format!("/transcription/detail/{}/", transcription_id);
                self.banner.success("Transcription completed");
                info!("Opening {}", detail_path);
                return Ok(JobOutcome::Completed {
                    transcription_id,
                    detail_path,
                });
            }

            if status.failed {
                *self.in_flight.lock().await = Some(JobPhase::Failed);
                let message = status
                    .error_message
                    .unwrap_or_else(|| "Unknown error".to_string());
                self.banner
                    .error(format!("Transcription failed: {message}"));
                return Ok(JobOutcome::Failed { message });
            }

            // Neither flag set: keep polling.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcription::client::JobStatus;
    use crate::ui::NoticeKind;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockApi {
        create_calls: AtomicUsize,
        status_calls: AtomicUsize,
        fail_create: bool,
        statuses: Vec<JobStatus>,
    }

    #[async_trait]
    impl TranscriptionApi for MockApi {
        async fn create(&self, _appointment_id: &str, _audio: Vec<u8>) -> Result<String> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_create {
                return Err(anyhow!("Server error (500): Internal Server Error"));
            }
            Ok("t-42".to_string())
        }

        async fn status(&self, _transcription_id: &str) -> Result<JobStatus> {
            let n = self.status_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .statuses
                .get(n)
                .cloned()
                .unwrap_or_else(|| JobStatus {
                    completed: true,
                    ..Default::default()
                }))
        }
    }

    fn pipeline_with(api: MockApi, banner: Banner) -> TranscriptionPipeline {
        TranscriptionPipeline::new(
            Arc::new(api),
            banner,
            Some("appt-1".to_string()),
            Some("csrf".to_string()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_polls_then_completes() {
        let api = MockApi {
            statuses: vec![JobStatus::default(), JobStatus::default(), JobStatus::default()],
            ..Default::default()
        };
        let banner = Banner::default();
        let pipeline = pipeline_with(api, banner.clone());

        let outcome = pipeline.submit_and_poll(vec![1, 2, 3]).await.unwrap();
        assert_eq!(
            outcome,
            JobOutcome::Completed {
                transcription_id: "t-42".to_string(),
                detail_path: "/transcription/detail/t-42/".to_string(),
            }
        );

        let successes = banner
            .history()
            .iter()
            .filter(|n| n.kind == NoticeKind::Success)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(pipeline.current_phase().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_submit_is_rejected_silently() {
        let api = Arc::new(MockApi {
            statuses: vec![JobStatus::default(), JobStatus::default()],
            ..Default::default()
        });
        let banner = Banner::default();
        let pipeline = Arc::new(TranscriptionPipeline::new(
            Arc::clone(&api) as Arc<dyn TranscriptionApi>,
            banner.clone(),
            Some("appt-1".to_string()),
            Some("csrf".to_string()),
        ));

        let first = tokio::spawn({
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.submit_and_poll(vec![1]).await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(pipeline.current_phase().await, Some(JobPhase::Polling));

        // Busy rejection is a log line, not a user-facing notice, and the
        // rejected submission never reaches the backend.
        let err = pipeline.submit_and_poll(vec![2]).await.unwrap_err();
        assert!(err.to_string().contains("already in progress"));
        assert!(banner.history().is_empty());
        assert_eq!(api.create_calls.load(Ordering::SeqCst), 1);

        first.await.unwrap().unwrap();
        assert_eq!(pipeline.current_phase().await, None);
        assert_eq!(api.create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_payload_fails_locally() {
        let banner = Banner::default();
        let pipeline = pipeline_with(MockApi::default(), banner.clone());

        assert!(pipeline.submit_and_poll(Vec::new()).await.is_err());
        assert_eq!(banner.history().len(), 1);
        assert_eq!(pipeline.current_phase().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_csrf_fails_locally() {
        let banner = Banner::default();
        let pipeline = TranscriptionPipeline::new(
            Arc::new(MockApi::default()),
            banner.clone(),
            Some("appt-1".to_string()),
            None,
        );

        assert!(pipeline.submit_and_poll(vec![1]).await.is_err());
        assert!(banner.last_error().unwrap().contains("Security token"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_failure_clears_guard_and_skips_polling() {
        let api = MockApi {
            fail_create: true,
            ..Default::default()
        };
        let banner = Banner::default();
        let pipeline = pipeline_with(api, banner.clone());

        assert!(pipeline.submit_and_poll(vec![1]).await.is_err());
        assert_eq!(pipeline.current_phase().await, None);
        let errors = banner
            .history()
            .iter()
            .filter(|n| n.kind == NoticeKind::Error)
            .count();
        assert_eq!(errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_reported_failure_surfaces_message() {
        let api = MockApi {
            statuses: vec![JobStatus {
                completed: false,
                failed: true,
                error_message: Some("audio unreadable".to_string()),
            }],
            ..Default::default()
        };
        let banner = Banner::default();
        let pipeline = pipeline_with(api, banner.clone());

        let outcome = pipeline.submit_and_poll(vec![1]).await.unwrap();
        assert_eq!(
            outcome,
            JobOutcome::Failed {
                message: "audio unreadable".to_string()
            }
        );
        assert!(banner.last_error().unwrap().contains("audio unreadable"));
    }
}
