use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub room: RoomConfig,
    pub recording: RecordingConfig,
    pub chat: ChatConfig,
}

/// Consultation backend the client talks to for transcription and chat
/// history. All state-changing requests echo the anti-forgery token in the
/// `X-CSRFToken` header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    pub csrf_token: Option<String>,
}

/// Identifies the consultation this client joins. All three values are
/// required before the call controller will initialize.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    pub room_name: Option<String>,
    pub token: Option<String>,
    pub appointment_id: Option<String>,
    /// Event endpoint of the hosted conferencing provider.
    pub bridge_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub sample_rate: u32,
    /// Write a WAV copy of the session audio to the data dir before upload.
    pub keep_local_copy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub enabled: bool,
    pub reconnect_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            csrf_token: None,
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            keep_local_copy: true,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reconnect_seconds: 5,
        }
    }
}

impl RoomConfig {
    /// Check the configuration preconditions for joining a call.
    ///
    /// Missing room name, token or appointment id is a fatal configuration
    /// error: initialization is blocked and there is no retry.
    pub fn validate(&self) -> Result<(), crate::error::ConsultError> {
        fn present(v: &Option<String>) -> bool {
            v.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
        }

        if !present(&self.room_name) {
            return Err(crate::error::ConsultError::config(
                "room name missing, cannot join call",
            ));
        }
        if !present(&self.token) {
            return Err(crate::error::ConsultError::config(
                "access token missing, cannot join call",
            ));
        }
        if !present(&self.appointment_id) {
            return Err(crate::error::ConsultError::config(
                "appointment id missing, cannot join call",
            ));
        }
        Ok(())
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}
