//! Session audio recorder.
//!
//! One recording exists per session. While recording, a fixed 1-second flush
//! timer drains the capture buffer into an ordered chunk sequence; insertion
//! order is chronological order, which is what makes the reassembled payload
//! playable. Stopping tears down the device track but keeps the chunks for
//! packaging.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::capture::CaptureSource;
use crate::error::ConsultError;

pub const FLUSH_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingPhase {
    Idle,
    Recording,
    Stopped,
}

impl RecordingPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingPhase::Idle => "idle",
            RecordingPhase::Recording => "recording",
            RecordingPhase::Stopped => "stopped",
        }
    }
}

/// Ordered chunk sequence, append-only while recording.
#[derive(Clone, Default)]
pub struct ChunkStore {
    inner: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl ChunkStore {
    pub fn push(&self, chunk: Vec<u8>) {
        if let Ok(mut chunks) = self.inner.lock() {
            chunks.push(chunk);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Vec<u8>> {
        self.inner.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// All chunks concatenated, in insertion order, as one upload payload.
    pub fn payload(&self) -> Vec<u8> {
        match self.inner.lock() {
            Ok(chunks) => chunks.iter().flat_map(|c| c.iter().copied()).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn clear(&self) {
        if let Ok(mut chunks) = self.inner.lock() {
            chunks.clear();
        }
    }
}

pub struct Recorder {
    source: Box<dyn CaptureSource>,
    phase: RecordingPhase,
    chunks: ChunkStore,
    flush_task: Option<JoinHandle<()>>,
    flush_interval: Duration,
}

impl Recorder {
    pub fn new(source: Box<dyn CaptureSource>) -> Self {
        Self {
            source,
            phase: RecordingPhase::Idle,
            chunks: ChunkStore::default(),
            flush_task: None,
            flush_interval: FLUSH_INTERVAL,
        }
    }

    #[cfg(test)]
    fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn phase(&self) -> RecordingPhase {
        self.phase
    }

    pub fn chunks(&self) -> ChunkStore {
        self.chunks.clone()
    }

    pub fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    /// Start recording. A no-op when already recording.
    ///
    /// A fresh session starts with an empty chunk sequence; restarting after
    /// a stop keeps the chunks already captured this session.
    pub fn start(&mut self) -> Result<(), ConsultError> {
        if self.phase == RecordingPhase::Recording {
            debug!("Recording already in progress, not starting again");
            return Ok(());
        }

        if self.phase == RecordingPhase::Idle {
            self.chunks.clear();
        }

        self.source.start()?;

        let buffer = self.source.buffer();
        let chunks = self.chunks.clone();
        let flush_interval = self.flush_interval;
        self.flush_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(flush_interval);
            ticker.tick().await; // immediate first tick carries nothing
            loop {
                ticker.tick().await;
                let data = buffer.drain();
                if !data.is_empty() {
                    debug!("Audio flush: {} bytes", data.len());
                    chunks.push(data);
                }
            }
        }));

        self.phase = RecordingPhase::Recording;
        info!("Audio recording started");
        Ok(())
    }

    /// Stop recording. A no-op when not recording.
    ///
    /// Halts the device track and appends whatever the buffer still holds as
    /// a final chunk. The chunk sequence is retained for packaging.
    pub fn stop(&mut self) {
        if self.phase != RecordingPhase::Recording {
            debug!("No active recording to stop");
            return;
        }

        if let Some(task) = self.flush_task.take() {
            task.abort();
        }

        self.source.stop();

        let tail = self.source.buffer().drain();
        if !tail.is_empty() {
            self.chunks.push(tail);
        }

        self.phase = RecordingPhase::Stopped;
        info!("Audio recording stopped, {} chunks captured", self.chunks.len());
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Some(task) = self.flush_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::capture::CaptureBuffer;

    struct FakeSource {
        buffer: CaptureBuffer,
        active: bool,
        starts: usize,
        deny: bool,
    }

    impl FakeSource {
        fn new() -> Self {
            Self {
                buffer: CaptureBuffer::default(),
                active: false,
                starts: 0,
                deny: false,
            }
        }
    }

    impl CaptureSource for FakeSource {
        fn start(&mut self) -> Result<(), ConsultError> {
            if self.deny {
                return Err(ConsultError::permission("microphone access denied"));
            }
            self.starts += 1;
            self.active = true;
            Ok(())
        }

        fn stop(&mut self) {
            self.active = false;
        }

        fn is_active(&self) -> bool {
            self.active
        }

        fn buffer(&self) -> CaptureBuffer {
            self.buffer.clone()
        }

        fn sample_rate(&self) -> u32 {
            16000
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_flushes_preserve_order_and_skip_empty() {
        let source = FakeSource::new();
        let buffer = source.buffer();
        let mut recorder = Recorder::new(Box::new(source));

        recorder.start().unwrap();
        // Offset pushes to mid-interval so each flush drains exactly one.
        tokio::time::sleep(Duration::from_millis(500)).await;
        for i in 0u8..5 {
            buffer.push(&[i; 4]);
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        // An empty interval must not produce a chunk.
        tokio::time::sleep(Duration::from_secs(2)).await;
        recorder.stop();

        let chunks = recorder.chunks().snapshot();
        assert_eq!(chunks.len(), 5);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk, &vec![i as u8; 4]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_is_noop() {
        let source = FakeSource::new();
        let mut recorder = Recorder::new(Box::new(source));

        recorder.start().unwrap();
        recorder.start().unwrap();
        assert_eq!(recorder.phase(), RecordingPhase::Recording);
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let source = FakeSource::new();
        let mut recorder = Recorder::new(Box::new(source));

        recorder.stop();
        assert_eq!(recorder.phase(), RecordingPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_keeps_chunks_and_drains_tail() {
        let source = FakeSource::new();
        let buffer = source.buffer();
        let mut recorder = Recorder::new(Box::new(source));

        recorder.start().unwrap();
        buffer.push(&[1, 2]);
        tokio::time::sleep(Duration::from_secs(1)).await;
        buffer.push(&[3]); // still in the buffer at stop time
        recorder.stop();

        assert_eq!(recorder.phase(), RecordingPhase::Stopped);
        assert_eq!(recorder.chunks().payload(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_permission_denied_leaves_idle() {
        let mut source = FakeSource::new();
        source.deny = true;
        let mut recorder = Recorder::new(Box::new(source));

        let err = recorder.start().unwrap_err();
        assert!(matches!(err, ConsultError::Permission(_)));
        assert_eq!(recorder.phase(), RecordingPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop_keeps_session_chunks() {
        let source = FakeSource::new();
        let buffer = source.buffer();
        let mut recorder =
            Recorder::new(Box::new(source)).with_flush_interval(Duration::from_millis(100));

        recorder.start().unwrap();
        buffer.push(&[7]);
        tokio::time::sleep(Duration::from_millis(150)).await;
        recorder.stop();
        assert_eq!(recorder.chunks().len(), 1);

        recorder.start().unwrap();
        buffer.push(&[8]);
        tokio::time::sleep(Duration::from_millis(150)).await;
        recorder.stop();

        assert_eq!(recorder.chunks().payload(), vec![7, 8]);
    }
}
