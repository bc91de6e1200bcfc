//! Splits a waveform into fixed-length overlapping windows.
//!
//! Every window except the last is exactly `chunk_length_s` long and starts
//! `chunk_length_s - overlap_s` after its predecessor, so adjacent windows
//! share `overlap_s` of audio. The last window holds whatever samples remain
//! and is never padded. The plan depends only on the waveform length and the
//! configuration.

use crate::audio::Waveform;
use crate::defaults;
use crate::error::{LongscribeError, Result};
use serde::{Deserialize, Serialize};

/// Window length and overlap, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Window length in seconds (default: 30s).
    pub chunk_length_s: f64,
    /// Audio shared by adjacent windows, in seconds (default: 5s).
    pub overlap_s: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            chunk_length_s: defaults::CHUNK_LENGTH_S,
            overlap_s: defaults::OVERLAP_S,
        }
    }
}

impl SegmenterConfig {
    pub fn new(chunk_length_s: f64, overlap_s: f64) -> Self {
        Self {
            chunk_length_s,
            overlap_s,
        }
    }

    /// Overlap given as a fraction of the window length, in `[0, 1)`.
    pub fn with_overlap_fraction(chunk_length_s: f64, fraction: f64) -> Result<Self> {
        if !fraction.is_finite() || !(0.0..1.0).contains(&fraction) {
            return Err(LongscribeError::invalid(
                "overlap_fraction",
                format!("must be in [0, 1), got {}", fraction),
            ));
        }
        Ok(Self::new(chunk_length_s, chunk_length_s * fraction))
    }

    /// Checks the constraints that do not depend on the sample rate.
    pub fn validate(&self) -> Result<()> {
        if !self.chunk_length_s.is_finite() || self.chunk_length_s <= 0.0 {
            return Err(LongscribeError::invalid(
                "chunk_length_s",
                format!("must be a positive number, got {}", self.chunk_length_s),
            ));
        }
        if !self.overlap_s.is_finite() || self.overlap_s < 0.0 {
            return Err(LongscribeError::invalid(
                "overlap_s",
                format!("must be zero or positive, got {}", self.overlap_s),
            ));
        }
        if self.overlap_s >= self.chunk_length_s {
            return Err(LongscribeError::invalid(
                "overlap_s",
                format!(
                    "must be smaller than chunk_length_s ({} >= {})",
                    self.overlap_s, self.chunk_length_s
                ),
            ));
        }
        Ok(())
    }
}

/// A contiguous range `[start_sample, end_sample)` of the source waveform.
///
/// `overlap_left` is the number of samples shared with the previous window,
/// `overlap_right` the number shared with the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub index: usize,
    pub start_sample: usize,
    pub end_sample: usize,
    pub overlap_left: usize,
    pub overlap_right: usize,
}

impl Window {
    pub fn len(&self) -> usize {
        self.end_sample - self.start_sample
    }

    pub fn is_empty(&self) -> bool {
        self.end_sample == self.start_sample
    }

    /// Offset of the window in the source timeline, in seconds.
    pub fn start_s(&self, sample_rate: u32) -> f64 {
        self.start_sample as f64 / sample_rate as f64
    }

    pub fn end_s(&self, sample_rate: u32) -> f64 {
        self.end_sample as f64 / sample_rate as f64
    }

    pub fn duration_s(&self, sample_rate: u32) -> f64 {
        self.len() as f64 / sample_rate as f64
    }

    /// The window's samples, borrowed from the waveform.
    pub fn samples<'a>(&self, waveform: &'a Waveform) -> &'a [f32] {
        waveform.slice(self.start_sample, self.end_sample)
    }
}

/// Window planner bound to one sample rate.
#[derive(Debug, Clone)]
pub struct Segmenter {
    config: SegmenterConfig,
    sample_rate: u32,
    chunk_samples: usize,
    overlap_samples: usize,
}

impl Segmenter {
    /// Validates `config` at `sample_rate` and converts it to sample counts.
    pub fn new(config: SegmenterConfig, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(LongscribeError::invalid(
                "sample_rate",
                "must be greater than 0",
            ));
        }
        config.validate()?;

        let chunk_samples = (config.chunk_length_s * sample_rate as f64).round() as usize;
        let overlap_samples = (config.overlap_s * sample_rate as f64).round() as usize;
        if chunk_samples == 0 {
            return Err(LongscribeError::invalid(
                "chunk_length_s",
                format!(
                    "{}s is shorter than one sample at {}Hz",
                    config.chunk_length_s, sample_rate
                ),
            ));
        }
        if overlap_samples >= chunk_samples {
            return Err(LongscribeError::invalid(
                "overlap_s",
                format!(
                    "leaves no forward step at {}Hz ({} overlap samples for {} window samples)",
                    sample_rate, overlap_samples, chunk_samples
                ),
            ));
        }

        Ok(Self {
            config,
            sample_rate,
            chunk_samples,
            overlap_samples,
        })
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples per full window.
    pub fn chunk_samples(&self) -> usize {
        self.chunk_samples
    }

    /// Samples shared by adjacent windows.
    pub fn overlap_samples(&self) -> usize {
        self.overlap_samples
    }

    /// Distance between the starts of adjacent windows.
    pub fn step_samples(&self) -> usize {
        self.chunk_samples - self.overlap_samples
    }

    /// Plans the windows for a waveform of `total_samples` samples.
    ///
    /// An empty waveform yields no windows.
    pub fn plan(&self, total_samples: usize) -> Vec<Window> {
        let mut windows: Vec<Window> = Vec::new();
        if total_samples == 0 {
            return windows;
        }

        let step = self.step_samples();
        let mut start = 0usize;
        loop {
            let end = (start + self.chunk_samples).min(total_samples);
            let overlap_left = windows
                .last()
                .map_or(0, |prev| prev.end_sample.saturating_sub(start));
            windows.push(Window {
                index: windows.len(),
                start_sample: start,
                end_sample: end,
                overlap_left,
                overlap_right: 0,
            });
            if end == total_samples {
                break;
            }
            start += step;
        }

        for i in 1..windows.len() {
            windows[i - 1].overlap_right = windows[i].overlap_left;
        }
        windows
    }

    /// Plans the windows for `waveform`.
    ///
    /// Fails if the waveform was recorded at a different rate than the one
    /// this segmenter was built for.
    pub fn segment(&self, waveform: &Waveform) -> Result<Vec<Window>> {
        if waveform.sample_rate() != self.sample_rate {
            return Err(LongscribeError::invalid(
                "sample_rate",
                format!(
                    "waveform is {}Hz but the segmenter was configured for {}Hz",
                    waveform.sample_rate(),
                    self.sample_rate
                ),
            ));
        }
        Ok(self.plan(waveform.len()))
    }
}
