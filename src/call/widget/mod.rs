//! Conferencing widget boundary.
//!
//! The hosted provider's call object is opaque beyond its documented
//! event/command surface, so that surface is a trait. The production binding
//! lives in `bridge`; tests script their own.

pub mod bridge;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::event::CallEvent;

#[async_trait]
pub trait ConferenceWidget: Send {
    /// Take the widget's event stream. Yields `None` after the first call;
    /// exactly one consumer (the controller) owns the events.
    fn take_events(&mut self) -> Option<mpsc::Receiver<CallEvent>>;

    /// Join the configured room.
    async fn join(&mut self) -> Result<()>;

    /// Leave the room. Idempotent; completing it finishes session teardown.
    async fn leave(&mut self) -> Result<()>;

    /// Enable or disable the local microphone track.
    async fn set_local_audio(&mut self, enabled: bool) -> Result<()>;

    /// Enable or disable the local camera track.
    async fn set_local_video(&mut self, enabled: bool) -> Result<()>;
}

pub use bridge::EventBridgeWidget;
