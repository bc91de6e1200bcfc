//! Speech-to-text backends behind the [`ChunkTranscriber`] capability.

pub mod transcriber;
pub mod whisper;

pub use transcriber::{ChunkOutput, ChunkTranscriber, MockTranscriber, TimedText};
pub use whisper::{WhisperConfig, WhisperTranscriber};
