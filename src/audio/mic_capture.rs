//! Microphone capture via cpal.
//!
//! Audio-only: the consultation video track belongs to the conferencing
//! provider; this client records only the local microphone for transcription.
//! Samples are converted to 16-bit PCM little-endian bytes as they arrive.

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error, info};

use super::capture::{CaptureBuffer, CaptureSource};
use crate::error::ConsultError;

pub struct MicCaptureSource {
    device: cpal::Device,
    config: cpal::StreamConfig,
    buffer: CaptureBuffer,
    stream: Option<cpal::Stream>,
    active: bool,
    target_sample_rate: u32,
}

impl MicCaptureSource {
    pub fn new(sample_rate: u32) -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .context("No input device available for consultation audio capture")?;

        info!(
            "Consultation mic source using device: {}",
            device.name().unwrap_or_else(|_| "unknown".to_string())
        );

        let config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        Ok(Self {
            device,
            config,
            buffer: CaptureBuffer::default(),
            stream: None,
            active: false,
            target_sample_rate: sample_rate,
        })
    }
}

impl CaptureSource for MicCaptureSource {
    fn start(&mut self) -> Result<(), ConsultError> {
        if self.active {
            return Ok(());
        }

        let buffer = self.buffer.clone();
        let err_fn = |err| error!("Consultation mic stream error: {}", err);

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mut bytes = Vec::with_capacity(data.len() * 2);
                    for &sample in data {
                        let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                        bytes.extend_from_slice(&pcm.to_le_bytes());
                    }
                    buffer.push(&bytes);
                },
                err_fn,
                None,
            )
            .map_err(|e| {
                ConsultError::permission(format!("Failed to open microphone stream: {e}"))
            })?;

        stream
            .play()
            .map_err(|e| ConsultError::permission(format!("Failed to start microphone: {e}")))?;

        self.stream = Some(stream);
        self.active = true;

        info!("Consultation mic capture started");
        Ok(())
    }

    fn stop(&mut self) {
        if !self.active {
            return;
        }

        // Dropping the stream stops the device track.
        if let Some(stream) = self.stream.take() {
            debug!("Stopping consultation mic stream");
            drop(stream);
        }

        self.active = false;
        info!("Consultation mic capture stopped");
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn buffer(&self) -> CaptureBuffer {
        self.buffer.clone()
    }

    fn sample_rate(&self) -> u32 {
        self.target_sample_rate
    }
}

impl Drop for MicCaptureSource {
    fn drop(&mut self) {
        if self.active {
            debug!("Dropping active MicCaptureSource, cleaning up");
            self.stop();
        }
    }
}
