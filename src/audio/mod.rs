pub mod capture;
pub mod mic_capture;
pub mod recorder;

pub use capture::{CaptureBuffer, CaptureSource, DisabledCaptureSource};
pub use mic_capture::MicCaptureSource;
pub use recorder::{ChunkStore, Recorder, RecordingPhase, FLUSH_INTERVAL};

use anyhow::Result;
use hound::{WavSpec, WavWriter};
use std::path::Path;
use tracing::info;

/// Write a local WAV copy of the session audio (16-bit mono PCM bytes).
pub fn write_wav(path: &Path, pcm_bytes: &[u8], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for pair in pcm_bytes.chunks_exact(2) {
        writer.write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
    }
    writer.finalize()?;

    info!(
        "Session audio saved: {:?} ({} bytes)",
        path,
        pcm_bytes.len()
    );
    Ok(())
}
