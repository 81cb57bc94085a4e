//! REST API server for Teleconsult.
//!
//! Provides HTTP endpoints for:
//! - Call control (end, status)
//! - Chat (send, list messages)

pub mod error;
pub mod routes;

use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tracing::info;

pub use routes::call::CallState;
pub use routes::chat::ChatState;

pub struct ApiServer {
    port: u16,
    call_state: CallState,
    chat_state: ChatState,
}

impl ApiServer {
    pub fn new(call_state: CallState, chat_state: ChatState) -> Self {
        Self {
            port: 4545,
            call_state,
            chat_state,
        }
    }

    pub async fn start(self) -> Result<()> {
        let app = Router::new()
            // Root and version endpoints
            .route("/", get(status))
            .route("/version", get(version))
            // Call control endpoints
            .merge(routes::call::router(self.call_state))
            // Chat endpoints
            .nest("/chat", routes::chat::router(self.chat_state))
            .layer(ServiceBuilder::new());

        let listener = tokio::net::TcpListener::bind(&format!("127.0.0.1:{}", self.port)).await?;

        info!("API server listening on http://127.0.0.1:{}", self.port);
        info!("Endpoints:");
        info!("  GET  /              - Service info");
        info!("  GET  /version       - Get version info");
        info!("  GET  /status        - Get call status");
        info!("  POST /call/end      - End the call");
        info!("  POST /call/mute     - Toggle the local microphone");
        info!("  POST /call/camera   - Toggle the local camera");
        info!("  POST /chat/send     - Send a chat message");
        info!("  GET  /chat/messages - List chat messages");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "teleconsult",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "teleconsult"
    }))
}
