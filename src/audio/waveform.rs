//! Mono waveform shared read-only across transcription workers.

use crate::error::{LongscribeError, Result};
use std::sync::Arc;

/// Mono f32 samples at a fixed sample rate.
///
/// Cloning is cheap: the sample buffer is reference counted, so every worker
/// thread can hold the waveform and borrow its own window from it without
/// copying audio.
#[derive(Debug, Clone)]
pub struct Waveform {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl Waveform {
    /// Wraps samples recorded at `sample_rate` Hz.
    pub fn new(samples: impl Into<Arc<[f32]>>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(LongscribeError::invalid(
                "sample_rate",
                "must be greater than 0",
            ));
        }
        Ok(Self {
            samples: samples.into(),
            sample_rate,
        })
    }

    /// Converts 16-bit PCM to f32 normalized to [-1.0, 1.0].
    pub fn from_i16(samples: &[i16], sample_rate: u32) -> Result<Self> {
        let converted: Vec<f32> = samples.iter().map(|&s| s as f32 / 32768.0).collect();
        Self::new(converted, sample_rate)
    }

    /// All samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Samples in `[start, end)`, clamped to the waveform bounds.
    pub fn slice(&self, start: usize, end: usize) -> &[f32] {
        let end = end.min(self.samples.len());
        let start = start.min(end);
        &self.samples[start..end]
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration_s(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}
