//! Call lifecycle orchestrator.
//!
//! Owns one video session end to end: validate configuration → join →
//! record local audio while active → on teardown, hand the recording to the
//! transcription pipeline. The handoff is fire-and-forget: ending a call is
//! never slowed by a slow upload or transcription backend.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::event::CallEvent;
use super::session::{format_elapsed, CallPhase, SessionHandle};
use super::widget::ConferenceWidget;
use crate::audio::Recorder;
use crate::config::RoomConfig;
use crate::transcription::{JobOutcome, TranscriptionPipeline};
use crate::ui::Banner;

/// Commands the control surface can send into a running call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallCommand {
    EndCall,
    ToggleAudio,
    ToggleVideo,
}

pub struct CallController {
    widget: Box<dyn ConferenceWidget>,
    recorder: Recorder,
    pipeline: Arc<TranscriptionPipeline>,
    session: SessionHandle,
    banner: Banner,
    events: Option<mpsc::Receiver<CallEvent>>,
    ticker: Option<JoinHandle<()>>,
    local_copy_dir: Option<PathBuf>,
    outcome_tx: Option<mpsc::Sender<JobOutcome>>,
}

impl CallController {
    pub fn new(
        widget: Box<dyn ConferenceWidget>,
        recorder: Recorder,
        pipeline: Arc<TranscriptionPipeline>,
        session: SessionHandle,
        banner: Banner,
    ) -> Self {
        Self {
            widget,
            recorder,
            pipeline,
            session,
            banner,
            events: None,
            ticker: None,
            local_copy_dir: None,
            outcome_tx: None,
        }
    }

    /// Keep a WAV copy of the session audio under `dir` before upload.
    pub fn with_local_copy(mut self, dir: PathBuf) -> Self {
        self.local_copy_dir = Some(dir);
        self
    }

    /// Receive the terminal transcription outcome of this session.
    pub fn with_outcome_sender(mut self, tx: mpsc::Sender<JobOutcome>) -> Self {
        self.outcome_tx = Some(tx);
        self
    }

    pub fn session(&self) -> SessionHandle {
        self.session.clone()
    }

    /// Check configuration preconditions and register for widget events.
    ///
    /// A missing room name, token or appointment id is fatal: the session
    /// goes straight to `Error` and nothing retries.
    pub async fn initialize(&mut self, room: &RoomConfig) -> Result<()> {
        self.session.set_phase(CallPhase::Initializing).await;
        self.session.set_status_line("Initializing call...").await;

        if let Err(e) = room.validate() {
            self.banner.error(e.to_string());
            self.session.set_error(e.to_string()).await;
            return Err(e.into());
        }

        self.events = Some(
            self.widget
                .take_events()
                .context("Widget event stream already taken")?,
        );
        Ok(())
    }

    /// Join the room. The session becomes `Active` when the widget reports
    /// the `Joined` event, not when this returns.
    pub async fn join(&mut self) -> Result<()> {
        self.session.set_phase(CallPhase::Joining).await;
        self.session.set_status_line("Joining call...").await;

        if let Err(e) = self.widget.join().await {
            self.banner.error(format!("Failed to join call: {e}"));
            self.session.set_error(e.to_string()).await;
            return Err(e);
        }
        Ok(())
    }

    /// Drive the session: consume widget events and control commands until
    /// the session reaches a terminal phase.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<CallCommand>) -> Result<()> {
        let mut events = self
            .events
            .take()
            .context("Controller not initialized before run")?;

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        // Widget instance is gone; an operation on it would
                        // be an error, so the session is too.
                        if self.session.get().await.phase.can_fail() {
                            self.fail("Call widget went away").await;
                        }
                    }
                },
                Some(command) = commands.recv() => match command {
                    CallCommand::EndCall => self.end_call().await?,
                    CallCommand::ToggleAudio => self.toggle_audio().await,
                    CallCommand::ToggleVideo => self.toggle_video().await,
                },
            }

            let phase = self.session.get().await.phase;
            if matches!(phase, CallPhase::Ended | CallPhase::Error) {
                break;
            }
        }
        Ok(())
    }

    async fn handle_event(&mut self, event: CallEvent) {
        debug!("Widget event: {:?}", event);
        match event {
            CallEvent::Joined => {
                info!("Joined the call");
                self.session.begin().await;
                self.start_ticker();

                // Idempotent: a second Joined this session is a no-op here.
                if let Err(e) = self.recorder.start() {
                    self.banner.error(format!("Failed to start recording: {e}"));
                }
            }
            CallEvent::ParticipantJoined { id, name } => {
                debug!("Participant joined: {} ({:?})", id, name);
                self.session.participant_joined(name.as_deref()).await;
            }
            CallEvent::ParticipantLeft { id } => {
                debug!("Participant left: {}", id);
                self.session.participant_left().await;
            }
            CallEvent::Left => {
                info!("Left the call");
                self.session.set_phase(CallPhase::Ending).await;
                self.stop_ticker();
                self.hand_off_recording();
                self.session.ended().await;
            }
            CallEvent::Error { message } => {
                if self.session.get().await.phase.can_fail() {
                    self.fail(format!("Call error: {message}")).await;
                } else {
                    debug!("Widget error after teardown began: {}", message);
                }
            }
        }
    }

    /// Flip the local microphone track. A no-op unless the call is active.
    pub async fn toggle_audio(&mut self) {
        let state = self.session.get().await;
        if state.phase != CallPhase::Active {
            debug!("Call not active, ignoring audio toggle");
            return;
        }

        let enabled = !state.audio_enabled;
        match self.widget.set_local_audio(enabled).await {
            Ok(()) => {
                info!("Local audio {}", if enabled { "unmuted" } else { "muted" });
                self.session.set_audio_enabled(enabled).await;
            }
            Err(e) => self.banner.error(format!("Failed to toggle microphone: {e}")),
        }
    }

    /// Flip the local camera track. A no-op unless the call is active.
    pub async fn toggle_video(&mut self) {
        let state = self.session.get().await;
        if state.phase != CallPhase::Active {
            debug!("Call not active, ignoring video toggle");
            return;
        }

        let enabled = !state.video_enabled;
        match self.widget.set_local_video(enabled).await {
            Ok(()) => {
                info!("Local video {}", if enabled { "enabled" } else { "disabled" });
                self.session.set_video_enabled(enabled).await;
            }
            Err(e) => self.banner.error(format!("Failed to toggle camera: {e}")),
        }
    }

    /// User-initiated end. A no-op unless a call is being joined or active.
    pub async fn end_call(&mut self) -> Result<()> {
        let phase = self.session.get().await.phase;
        if !matches!(phase, CallPhase::Joining | CallPhase::Active) {
            debug!("Call not active, nothing to end");
            return Ok(());
        }

        info!("Ending call");
        self.session.set_phase(CallPhase::Ending).await;
        self.session.set_status_line("Ending call...").await;
        self.stop_ticker();
        self.hand_off_recording();

        if let Err(e) = self.widget.leave().await {
            // Teardown already happened; surface the leave failure and
            // finish anyway.
            self.banner.error(format!("Error ending call: {e}"));
        }

        self.session.ended().await;
        Ok(())
    }

    /// Terminal widget error: surface it and freeze the session. Manual
    /// restart only, no auto-rejoin.
    async fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.banner.error(&message);
        self.stop_ticker();
        self.recorder.stop();
        self.session.set_error(message).await;
    }

    /// Stop recording and hand the captured audio to the transcription
    /// pipeline without blocking teardown.
    ///
    /// Chunks are packaged whenever any exist, even if recording was never
    /// marked active this session; a capture that died early still produced
    /// audio worth transcribing.
    fn hand_off_recording(&mut self) {
        self.recorder.stop();

        let chunks = self.recorder.chunks();
        if chunks.is_empty() {
            debug!("No audio chunks available for transcription");
            return;
        }

        let payload = chunks.payload();
        info!(
            "Submitting {} chunks ({} bytes) for transcription",
            chunks.len(),
            payload.len()
        );

        if let Some(dir) = &self.local_copy_dir {
            self.write_local_copy(dir.clone(), &payload);
        }

        let pipeline = Arc::clone(&self.pipeline);
        let outcome_tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            match pipeline.submit_and_poll(payload).await {
                Ok(outcome) => {
                    if let JobOutcome::Completed { detail_path, .. } = &outcome {
                        info!("Transcription ready at {}", detail_path);
                    }
                    if let Some(tx) = outcome_tx {
                        let _ = tx.send(outcome).await;
                    }
                }
                // Already surfaced by the pipeline at the failing stage.
                Err(e) => debug!("Transcription pipeline stopped: {e:#}"),
            }
        });
    }

    fn write_local_copy(&self, dir: PathBuf, payload: &[u8]) {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let path = dir.join(format!("consultation-{timestamp}.wav"));
        if let Err(e) = std::fs::create_dir_all(&dir)
            .map_err(anyhow::Error::from)
            .and_then(|_| crate::audio::write_wav(&path, payload, self.recorder.sample_rate()))
        {
            warn!("Failed to write local audio copy: {e:#}");
        }
    }

    fn start_ticker(&mut self) {
        self.stop_ticker();
        let session = self.session.clone();
        self.ticker = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            loop {
                ticker.tick().await;
                if let Some(seconds) = session.get().await.duration_seconds() {
                    session.set_elapsed(format_elapsed(seconds)).await;
                }
            }
        }));
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl Drop for CallController {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}
