//! Call control endpoints.
//!
//! Provides HTTP endpoints for:
//! - Ending the call (POST /call/end)
//! - Toggling local tracks (POST /call/mute, POST /call/camera)
//! - Getting call status (GET /status)

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::call::{CallCommand, SessionHandle};
use crate::ui::Banner;

#[derive(Clone)]
pub struct CallState {
    pub tx: mpsc::Sender<CallCommand>,
    pub session: SessionHandle,
    pub banner: Banner,
}

/// Creates the call router with all call-related endpoints.
pub fn router(state: CallState) -> Router {
    Router::new()
        .route("/call/end", post(end_call))
        .route("/call/mute", post(toggle_audio))
        .route("/call/camera", post(toggle_video))
        .route("/status", get(call_status))
        .with_state(state)
}

/// Requests call teardown. The controller owns the lifecycle, so this only
/// queues the command; the response reflects the phase at queue time, and
/// `GET /status` reports the outcome once the controller has processed it.
async fn end_call(State(state): State<CallState>) -> Result<Json<Value>, StatusCode> {
    info!("End call command received via API");
    queue_command(&state, CallCommand::EndCall).await
}

/// Requests a local microphone toggle. Queued like `end_call`; the resulting
/// track state shows up in `GET /status` as `audio_enabled`.
async fn toggle_audio(State(state): State<CallState>) -> Result<Json<Value>, StatusCode> {
    info!("Audio toggle command received via API");
    queue_command(&state, CallCommand::ToggleAudio).await
}

/// Requests a local camera toggle. Queued like `end_call`; the resulting
/// track state shows up in `GET /status` as `video_enabled`.
async fn toggle_video(State(state): State<CallState>) -> Result<Json<Value>, StatusCode> {
    info!("Video toggle command received via API");
    queue_command(&state, CallCommand::ToggleVideo).await
}

async fn queue_command(
    state: &CallState,
    command: CallCommand,
) -> Result<Json<Value>, StatusCode> {
    match state.tx.send(command).await {
        Ok(_) => {
            let snapshot = state.session.get().await;
            Ok(Json(json!({
                "success": true,
                "phase": snapshot.phase.as_str(),
            })))
        }
        Err(e) => {
            error!("Failed to send call command: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Gets the current call status.
async fn call_status(State(state): State<CallState>) -> Json<Value> {
    let snapshot = state.session.get().await;

    Json(json!({
        "phase": snapshot.phase.as_str(),
        "participant_count": snapshot.participant_count,
        "status_line": snapshot.status_line,
        "elapsed": snapshot.elapsed,
        "audio_enabled": snapshot.audio_enabled,
        "video_enabled": snapshot.video_enabled,
        "last_error": snapshot.last_error,
        "notice": state.banner.last_error(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> (CallState, mpsc::Receiver<CallCommand>) {
        let (tx, rx) = mpsc::channel(4);
        let state = CallState {
            tx,
            session: SessionHandle::default(),
            banner: Banner::default(),
        };
        (state, rx)
    }

    async fn post(app: Router, uri: &str) -> Value {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_end_call_queues_and_reports_queue_time_phase() {
        let (state, mut rx) = test_state();

        let body = post(router(state), "/call/end").await;
        assert_eq!(body["success"], true);
        // No controller is draining the queue here, so the phase must be the
        // one read at queue time rather than a later one waited for.
        assert_eq!(body["phase"], "uninitialized");
        assert_eq!(rx.recv().await, Some(CallCommand::EndCall));
    }

    #[tokio::test]
    async fn test_mute_and_camera_queue_toggle_commands() {
        let (state, mut rx) = test_state();
        let app = router(state);

        let body = post(app.clone(), "/call/mute").await;
        assert_eq!(body["success"], true);
        assert_eq!(rx.recv().await, Some(CallCommand::ToggleAudio));

        let body = post(app, "/call/camera").await;
        assert_eq!(body["success"], true);
        assert_eq!(rx.recv().await, Some(CallCommand::ToggleVideo));
    }

    #[tokio::test]
    async fn test_status_reports_local_track_state() {
        let (state, _rx) = test_state();
        let session = state.session.clone();
        session.begin().await;
        session.set_audio_enabled(false).await;

        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(body["phase"], "active");
        assert_eq!(body["audio_enabled"], false);
        assert_eq!(body["video_enabled"], true);
    }
}
