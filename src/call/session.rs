//! Session state and shared handle.
//!
//! One `SessionState` exists per consultation, owned by the controller and
//! shared read-only with the control API. This replaces the pile of
//! module-level flags the feature historically grew around.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallPhase {
    Uninitialized,
    Initializing,
    Joining,
    Active,
    Ending,
    Ended,
    Error,
}

impl CallPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Joining => "joining",
            Self::Active => "active",
            Self::Ending => "ending",
            Self::Ended => "ended",
            Self::Error => "error",
        }
    }

    /// Error is reachable from every pre-teardown state, and terminal.
    pub fn can_fail(&self) -> bool {
        matches!(
            self,
            Self::Uninitialized | Self::Initializing | Self::Joining | Self::Active
        )
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: CallPhase,
    pub participant_count: usize,
    pub started_at: Option<DateTime<Utc>>,
    /// Human-readable status line; display only, never drives control flow.
    pub status_line: String,
    pub elapsed: Option<String>,
    pub last_error: Option<String>,
    /// Local microphone track state; both tracks start enabled on join.
    pub audio_enabled: bool,
    pub video_enabled: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: CallPhase::Uninitialized,
            participant_count: 0,
            started_at: None,
            status_line: "Waiting to join".to_string(),
            elapsed: None,
            last_error: None,
            audio_enabled: true,
            video_enabled: true,
        }
    }
}

impl SessionState {
    pub fn duration_seconds(&self) -> Option<u64> {
        self.started_at.map(|started| {
            let elapsed = Utc::now() - started;
            elapsed.num_seconds().max(0) as u64
        })
    }
}

/// Format a duration as the HH:MM:SS string shown next to the call.
pub fn format_elapsed(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

#[derive(Clone, Default)]
pub struct SessionHandle {
    inner: Arc<Mutex<SessionState>>,
}

impl SessionHandle {
    pub async fn get(&self) -> SessionState {
        self.inner.lock().await.clone()
    }

    pub async fn set_phase(&self, phase: CallPhase) {
        self.inner.lock().await.phase = phase;
    }

    pub async fn set_status_line(&self, status: impl Into<String>) {
        self.inner.lock().await.status_line = status.into();
    }

    pub async fn set_elapsed(&self, elapsed: String) {
        self.inner.lock().await.elapsed = Some(elapsed);
    }

    /// Mark the session active, starting from one participant (self).
    pub async fn begin(&self) {
        let mut state = self.inner.lock().await;
        state.phase = CallPhase::Active;
        state.participant_count = 1;
        state.started_at = Some(Utc::now());
        state.status_line = "Connected".to_string();
        state.last_error = None;
        state.audio_enabled = true;
        state.video_enabled = true;
    }

    pub async fn set_audio_enabled(&self, enabled: bool) {
        self.inner.lock().await.audio_enabled = enabled;
    }

    pub async fn set_video_enabled(&self, enabled: bool) {
        self.inner.lock().await.video_enabled = enabled;
    }

    pub async fn participant_joined(&self, name: Option<&str>) {
        let mut state = self.inner.lock().await;
        state.participant_count += 1;
        state.status_line = format!(
            "Connected with {}",
            name.unwrap_or("another participant")
        );
    }

    /// Decrement the participant count, clamped at zero.
    ///
    /// When only this client remains the status line resets to waiting.
    pub async fn participant_left(&self) {
        let mut state = self.inner.lock().await;
        state.participant_count = state.participant_count.saturating_sub(1);
        if state.participant_count <= 1 {
            state.status_line = "Waiting for others to join...".to_string();
        }
    }

    pub async fn set_error(&self, message: impl Into<String>) {
        let mut state = self.inner.lock().await;
        state.phase = CallPhase::Error;
        state.last_error = Some(message.into());
    }

    pub async fn ended(&self) {
        let mut state = self.inner.lock().await;
        state.phase = CallPhase::Ended;
        state.participant_count = 0;
        state.status_line = "Call ended".to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_as_str() {
        assert_eq!(CallPhase::Active.as_str(), "active");
        assert_eq!(CallPhase::Uninitialized.as_str(), "uninitialized");
        assert_eq!(CallPhase::Error.as_str(), "error");
    }

    #[test]
    fn test_error_reachable_only_pre_teardown() {
        assert!(CallPhase::Active.can_fail());
        assert!(CallPhase::Joining.can_fail());
        assert!(!CallPhase::Ending.can_fail());
        assert!(!CallPhase::Ended.can_fail());
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "00:00:00");
        assert_eq!(format_elapsed(61), "00:01:01");
        assert_eq!(format_elapsed(3661), "01:01:01");
    }

    #[tokio::test]
    async fn test_begin_resets_and_counts_self() {
        let handle = SessionHandle::default();
        handle.begin().await;

        let state = handle.get().await;
        assert_eq!(state.phase, CallPhase::Active);
        assert_eq!(state.participant_count, 1);
        assert!(state.started_at.is_some());
    }

    #[tokio::test]
    async fn test_begin_re_enables_local_tracks() {
        let handle = SessionHandle::default();
        handle.set_audio_enabled(false).await;
        handle.set_video_enabled(false).await;
        handle.begin().await;

        let state = handle.get().await;
        assert!(state.audio_enabled);
        assert!(state.video_enabled);
    }

    #[tokio::test]
    async fn test_participant_count_never_goes_negative() {
        let handle = SessionHandle::default();
        handle.participant_left().await;
        handle.participant_left().await;

        let state = handle.get().await;
        assert_eq!(state.participant_count, 0);
        assert_eq!(state.status_line, "Waiting for others to join...");
    }

    #[tokio::test]
    async fn test_participant_join_updates_status() {
        let handle = SessionHandle::default();
        handle.begin().await;
        handle.participant_joined(Some("Dr. Rao")).await;

        let state = handle.get().await;
        assert_eq!(state.participant_count, 2);
        assert_eq!(state.status_line, "Connected with Dr. Rao");
    }

    #[tokio::test]
    async fn test_ended_clears_participants() {
        let handle = SessionHandle::default();
        handle.begin().await;
        handle.participant_joined(None).await;
        handle.ended().await;

        let state = handle.get().await;
        assert_eq!(state.phase, CallPhase::Ended);
        assert_eq!(state.participant_count, 0);
    }
}
