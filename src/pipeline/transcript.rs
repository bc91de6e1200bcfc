//! Per-window results and the final merged transcript.

use crate::chunking::Window;
use crate::stt::{ChunkOutput, TimedText};
use serde::{Deserialize, Serialize};

/// Model output for one window, tagged with the window it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkResult {
    pub window: Window,
    pub output: ChunkOutput,
}

impl ChunkResult {
    pub fn new(window: Window, output: ChunkOutput) -> Self {
        Self { window, output }
    }

    pub fn index(&self) -> usize {
        self.window.index
    }
}

/// Merged transcription of a whole waveform.
///
/// `timestamps` is `Some` only when they were requested; records are in the
/// source timeline, sorted and non-overlapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Vec<TimedText>>,
    pub duration_s: f64,
    pub chunk_count: usize,
}

impl Transcript {
    /// Transcript of silence or of an empty waveform.
    pub fn empty(duration_s: f64, return_timestamps: bool) -> Self {
        Self {
            text: String::new(),
            timestamps: return_timestamps.then(Vec::new),
            duration_s,
            chunk_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Number of words in the merged text.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}
