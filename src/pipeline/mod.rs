//! Long-form transcription pipeline.
//!
//! Segments a waveform into overlapping windows, transcribes them in bounded
//! batches, and stitches the per-window text back into one transcript.

pub mod orchestrator;
pub mod stitcher;
pub mod transcript;
pub mod worker;

pub use orchestrator::{ChunkedPipeline, PipelineConfig, Plan};
pub use stitcher::{Stitcher, StitcherConfig, clean_transcription};
pub use transcript::{ChunkResult, Transcript};
pub use worker::{BatchCancel, RetryPolicy, transcribe_batch, transcribe_window};
