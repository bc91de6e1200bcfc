//! longscribe - Long-form transcription for Whisper-style models
//!
//! Splits long recordings into overlapping windows, transcribes them in
//! bounded parallel batches, and stitches the results into one transcript.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod chunking;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod stt;

// Core capability (waveform → windows → text)
pub use audio::Waveform;
pub use chunking::{BatchScheduler, Segmenter, SegmenterConfig, Window};
pub use stt::{ChunkOutput, ChunkTranscriber, TimedText};

// Pipeline
pub use pipeline::{
    ChunkResult, ChunkedPipeline, PipelineConfig, RetryPolicy, Stitcher, StitcherConfig,
    Transcript,
};

// Error handling
pub use error::{LongscribeError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
