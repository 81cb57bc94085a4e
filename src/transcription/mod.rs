pub mod client;
pub mod pipeline;

pub use client::{CreateResponse, HttpTranscriptionApi, JobStatus, TranscriptionApi};
pub use pipeline::{JobOutcome, JobPhase, TranscriptionPipeline, POLL_INTERVAL};
