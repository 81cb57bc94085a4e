//! Error taxonomy for the consultation client.
//!
//! Four families, matching where failures can originate: local configuration,
//! capture-device permission, network transport, and errors reported by a
//! remote party (conferencing provider or backend). Everything is surfaced at
//! the boundary where it occurs; only configuration errors are fatal.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsultError {
    /// Missing or invalid startup configuration. Fatal, no retry.
    #[error("configuration error: {0}")]
    Config(String),

    /// Capture-device access denied or unavailable. Aborts the capture
    /// stage only.
    #[error("capture permission error: {0}")]
    Permission(String),

    /// Network-level failure (connect, send, HTTP transport).
    #[error("transport error: {0}")]
    Transport(String),

    /// An explicit error payload reported by the widget or the backend,
    /// surfaced verbatim where possible.
    #[error("{0}")]
    Remote(String),
}

impl ConsultError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        Self::Permission(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }
}
