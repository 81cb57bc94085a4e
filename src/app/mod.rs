use crate::api::{ApiServer, CallState, ChatState};
use crate::audio::{CaptureSource, DisabledCaptureSource, MicCaptureSource, Recorder};
use crate::call::{CallCommand, CallController, CallPhase, EventBridgeWidget, SessionHandle};
use crate::chat::{ChatChannel, ChatTransport, HistoryClient, MessageLog, WsChatTransport};
use crate::config::Config;
use crate::db::{self, ConsultationRepository};
use crate::transcription::{HttpTranscriptionApi, JobOutcome, TranscriptionApi, TranscriptionPipeline};
use crate::ui::Banner;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub async fn run_service(room: Option<String>, appointment: Option<String>) -> Result<()> {
    info!("Starting Teleconsult service");

    let mut config = Config::load()?;
    if room.is_some() {
        config.room.room_name = room;
    }
    if appointment.is_some() {
        config.room.appointment_id = appointment;
    }

    let conn = db::init_db()?;

    let banner = Banner::default();
    let session = SessionHandle::default();

    // Losing the microphone degrades to a call without recording; it must
    // not stop the session from joining.
    let source: Box<dyn CaptureSource> = match MicCaptureSource::new(config.recording.sample_rate)
    {
        Ok(mic) => Box::new(mic),
        Err(e) => {
            warn!("Audio capture unavailable: {e:#}");
            banner.error(format!("Microphone unavailable: {e:#}"));
            Box::new(DisabledCaptureSource::new(
                format!("Microphone unavailable: {e:#}"),
                config.recording.sample_rate,
            ))
        }
    };
    let recorder = Recorder::new(source);

    let csrf_token = config.server.csrf_token.clone();
    let api: Arc<dyn TranscriptionApi> = Arc::new(HttpTranscriptionApi::new(
        &config.server.base_url,
        csrf_token.as_deref().unwrap_or_default(),
    ));
    let pipeline = Arc::new(TranscriptionPipeline::new(
        Arc::clone(&api),
        banner.clone(),
        config.room.appointment_id.clone(),
        csrf_token.clone(),
    ));

    let bridge_url = config
        .room
        .bridge_url
        .clone()
        .unwrap_or_else(|| derive_bridge_url(&config.server.base_url));
    let widget = EventBridgeWidget::new(
        &bridge_url,
        config.room.room_name.as_deref().unwrap_or_default(),
        config.room.token.as_deref().unwrap_or_default(),
    );

    let (tx, rx) = mpsc::channel::<CallCommand>(10);
    let (outcome_tx, mut outcome_rx) = mpsc::channel::<JobOutcome>(4);

    let mut controller = CallController::new(
        Box::new(widget),
        recorder,
        Arc::clone(&pipeline),
        session.clone(),
        banner.clone(),
    )
    .with_outcome_sender(outcome_tx);
    if config.recording.keep_local_copy {
        controller = controller.with_local_copy(crate::global::recordings_dir()?);
    }

    // Chat channel, with HTTP history backfill once it is up.
    let log = MessageLog::default();
    let mut chat_handle = None;
    if config.chat.enabled {
        if let Some(appointment_id) = config.room.appointment_id.clone() {
            let (host, secure) = ws_host(&config.server.base_url);
            let transport: Arc<dyn ChatTransport> =
                Arc::new(WsChatTransport::new(&host, secure, &appointment_id));
            chat_handle = Some(ChatChannel::spawn_with_interval(
                transport,
                log.clone(),
                Duration::from_secs(config.chat.reconnect_seconds),
            ));

            let history = HistoryClient::new(&config.server.base_url, csrf_token.clone());
            let history_log = log.clone();
            tokio::spawn(async move {
                match history.load_into(&appointment_id, &history_log).await {
                    Ok(count) => info!("Loaded {count} chat messages from history"),
                    Err(e) => warn!("Failed to load chat history: {e:#}"),
                }
            });
        }
    }
    let chat_sender = chat_handle
        .as_ref()
        .map(|h| h.sender())
        .unwrap_or_else(closed_chat_sender);

    let api_server = ApiServer::new(
        CallState {
            tx,
            session: session.clone(),
            banner: banner.clone(),
        },
        ChatState {
            outgoing: chat_sender,
            log,
        },
    );
    tokio::spawn(async move {
        if let Err(e) = api_server.start().await {
            error!("API server failed: {}", e);
        }
    });

    controller.initialize(&config.room).await?;
    controller.join().await?;

    // Config is valid past initialize, so both fields are present.
    let consultation_id = ConsultationRepository::insert(
        &conn,
        config.room.appointment_id.as_deref().unwrap_or_default(),
        config.room.room_name.as_deref().unwrap_or_default(),
    )?;

    // Record the transcription outcome once the post-call upload resolves.
    let outcome_task = tokio::spawn(async move {
        if let Some(outcome) = outcome_rx.recv().await {
            let result = db::init_db().and_then(|conn| match &outcome {
                JobOutcome::Completed {
                    transcription_id, ..
                } => ConsultationRepository::set_transcription(
                    &conn,
                    consultation_id,
                    transcription_id,
                ),
                JobOutcome::Failed { message } => {
                    warn!("Transcription failed: {message}");
                    Ok(())
                }
            });
            if let Err(e) = result {
                error!("Failed to record transcription outcome: {e:#}");
            }
        }
    });

    info!("Teleconsult is ready!");
    info!("End the call with: curl -X POST http://127.0.0.1:4545/call/end");

    let run_result = controller.run(rx).await;

    // Release the controller's outcome sender so the outcome task sees the
    // channel close once any in-flight upload resolves.
    drop(controller);

    let snapshot = session.get().await;
    match snapshot.phase {
        CallPhase::Ended => {
            ConsultationRepository::complete(
                &conn,
                consultation_id,
                snapshot.duration_seconds().unwrap_or(0) as i64,
            )?;
        }
        CallPhase::Error => {
            let message = snapshot
                .last_error
                .clone()
                .unwrap_or_else(|| "call failed".to_string());
            ConsultationRepository::fail(&conn, consultation_id, &message)?;
        }
        _ => {}
    }

    if let Some(handle) = chat_handle {
        handle.close().await;
    }

    // Let the upload finish before the process exits.
    if let Err(e) = outcome_task.await {
        warn!("Outcome task aborted: {e}");
    }

    run_result
}

/// `{ws|wss}://host/ws/chat/...` derived from the HTTP base URL.
fn ws_host(base_url: &str) -> (String, bool) {
    if let Some(host) = base_url.strip_prefix("https://") {
        (host.trim_end_matches('/').to_string(), true)
    } else if let Some(host) = base_url.strip_prefix("http://") {
        (host.trim_end_matches('/').to_string(), false)
    } else {
        (base_url.trim_end_matches('/').to_string(), false)
    }
}

/// Default conferencing event endpoint next to the backend.
fn derive_bridge_url(base_url: &str) -> String {
    let (host, secure) = ws_host(base_url);
    let scheme = if secure { "wss" } else { "ws" };
    format!("{scheme}://{host}/ws/call/")
}

/// Sender whose receiver is already gone: chat sends report the channel
/// as closed instead of silently queueing.
fn closed_chat_sender() -> mpsc::Sender<String> {
    let (tx, _rx) = mpsc::channel(1);
    tx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_host_strips_scheme() {
        assert_eq!(ws_host("http://127.0.0.1:8000"), ("127.0.0.1:8000".to_string(), false));
        assert_eq!(
            ws_host("https://clinic.example.com/"),
            ("clinic.example.com".to_string(), true)
        );
    }

    #[test]
    fn test_derive_bridge_url() {
        assert_eq!(
            derive_bridge_url("https://clinic.example.com"),
            "wss://clinic.example.com/ws/call/"
        );
    }
}
