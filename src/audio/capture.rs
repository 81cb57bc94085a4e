//! Capture source abstraction for session audio.
//!
//! A source owns the underlying device track and fills a shared buffer; the
//! recorder drains that buffer on a fixed cadence. Sources stay on the task
//! that owns them (device streams are not `Send`); only the buffer handle
//! crosses tasks.

use crate::error::ConsultError;

/// Shared byte buffer filled by a capture callback and drained by the
/// recorder's flush timer.
#[derive(Clone, Default)]
pub struct CaptureBuffer {
    inner: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    pub fn push(&self, bytes: &[u8]) {
        if let Ok(mut buf) = self.inner.lock() {
            buf.extend_from_slice(bytes);
        }
    }

    /// Take everything captured since the last drain.
    pub fn drain(&self) -> Vec<u8> {
        match self.inner.lock() {
            Ok(mut buf) => std::mem::take(&mut *buf),
            Err(_) => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().map(|buf| buf.is_empty()).unwrap_or(true)
    }
}

/// Trait for audio-only capture sources (microphone, scripted test input).
///
/// One source is exclusively owned by the recorder for the session's
/// lifetime; no other code path touches the track while it is active.
pub trait CaptureSource {
    /// Acquire the capture stream and start filling the buffer.
    ///
    /// Access denial is a permission error: the caller surfaces it and leaves
    /// recording idle, it does not retry.
    fn start(&mut self) -> Result<(), ConsultError>;

    /// Halt the underlying track. Buffered audio is left in place.
    fn stop(&mut self);

    fn is_active(&self) -> bool;

    /// Handle to the shared buffer this source fills.
    fn buffer(&self) -> CaptureBuffer;

    fn sample_rate(&self) -> u32;
}

/// Stand-in used when no capture device could be acquired. The session runs
/// without audio; `start` surfaces the original failure so each recording
/// attempt reports why it stays idle.
pub struct DisabledCaptureSource {
    reason: String,
    sample_rate: u32,
    buffer: CaptureBuffer,
}

impl DisabledCaptureSource {
    pub fn new(reason: impl Into<String>, sample_rate: u32) -> Self {
        Self {
            reason: reason.into(),
            sample_rate,
            buffer: CaptureBuffer::default(),
        }
    }
}

impl CaptureSource for DisabledCaptureSource {
    fn start(&mut self) -> Result<(), ConsultError> {
        Err(ConsultError::permission(self.reason.clone()))
    }

    fn stop(&mut self) {}

    fn is_active(&self) -> bool {
        false
    }

    fn buffer(&self) -> CaptureBuffer {
        self.buffer.clone()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_source_refuses_to_start() {
        let mut source = DisabledCaptureSource::new("Microphone access denied", 16_000);
        assert!(source.start().is_err());
        assert!(!source.is_active());
        assert!(source.buffer().is_empty());
    }

    #[test]
    fn test_buffer_drain_takes_all() {
        let buf = CaptureBuffer::default();
        buf.push(&[1, 2, 3]);
        buf.push(&[4]);

        assert_eq!(buf.drain(), vec![1, 2, 3, 4]);
        assert!(buf.is_empty());
        assert!(buf.drain().is_empty());
    }

    #[test]
    fn test_buffer_handles_are_shared() {
        let buf = CaptureBuffer::default();
        let writer = buf.clone();
        writer.push(&[9, 9]);
        assert_eq!(buf.drain(), vec![9, 9]);
    }
}
