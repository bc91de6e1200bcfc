//! Chunked transcription pipeline: segment, transcribe batches, stitch.

use crate::audio::Waveform;
use crate::chunking::{BatchScheduler, Segmenter, SegmenterConfig, Window};
use crate::defaults;
use crate::error::{LongscribeError, Result};
use crate::pipeline::stitcher::{Stitcher, StitcherConfig};
use crate::pipeline::transcript::{ChunkResult, Transcript};
use crate::pipeline::worker::{RetryPolicy, transcribe_batch};
use crate::stt::ChunkTranscriber;
use std::sync::Arc;
use std::time::Instant;

/// Configuration for the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Window length and overlap
    pub segmenter: SegmenterConfig,
    /// Maximum number of windows transcribed at once
    pub batch_size: usize,
    /// Emit (start, end, text) records in the source timeline
    pub return_timestamps: bool,
    /// Retry policy for failing windows
    pub retry: RetryPolicy,
    /// Boundary resolution settings
    pub stitcher: StitcherConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            segmenter: SegmenterConfig::default(),
            batch_size: defaults::BATCH_SIZE,
            return_timestamps: false,
            retry: RetryPolicy::default(),
            stitcher: StitcherConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Checks every parameter without touching any audio.
    pub fn validate(&self) -> Result<()> {
        self.segmenter.validate()?;
        BatchScheduler::new(self.batch_size)?;
        self.retry.validate()?;
        if self.stitcher.min_candidate_tokens == 0 {
            return Err(LongscribeError::invalid(
                "min_candidate_tokens",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Window layout for one waveform.
#[derive(Debug, Clone)]
pub struct Plan {
    pub windows: Vec<Window>,
    pub batch_size: usize,
    pub sample_rate: u32,
}

impl Plan {
    /// Windows grouped the way they will be sent to the model.
    pub fn batches(&self) -> std::slice::Chunks<'_, Window> {
        self.windows.chunks(self.batch_size.max(1))
    }

    pub fn batch_count(&self) -> usize {
        self.windows.len().div_ceil(self.batch_size.max(1))
    }
}

/// Long-form transcription over a [`ChunkTranscriber`].
pub struct ChunkedPipeline {
    transcriber: Arc<dyn ChunkTranscriber>,
    config: PipelineConfig,
    scheduler: BatchScheduler,
}

impl std::fmt::Debug for ChunkedPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedPipeline")
            .field("model", &self.transcriber.model_name())
            .field("config", &self.config)
            .finish()
    }
}

impl ChunkedPipeline {
    /// Creates a pipeline.
    ///
    /// # Errors
    /// Returns `LongscribeError::InvalidConfiguration` if any parameter is out of range.
    pub fn new(transcriber: Arc<dyn ChunkTranscriber>, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let scheduler = BatchScheduler::new(config.batch_size)?;
        Ok(Self {
            transcriber,
            config,
            scheduler,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Windows and batches for `waveform`, without calling the model.
    pub fn plan(&self, waveform: &Waveform) -> Result<Plan> {
        let segmenter = Segmenter::new(self.config.segmenter, waveform.sample_rate())?;
        Ok(Plan {
            windows: segmenter.segment(waveform)?,
            batch_size: self.scheduler.batch_size(),
            sample_rate: waveform.sample_rate(),
        })
    }

    /// Transcribes the whole waveform.
    ///
    /// Batches run one after another; windows inside a batch run concurrently.
    /// A failing window aborts the request with the error of the lowest
    /// failing window in its batch; later batches are never started.
    pub async fn transcribe(&self, waveform: &Waveform) -> Result<Transcript> {
        let duration_s = waveform.duration_s();
        let return_timestamps = self.config.return_timestamps;

        // Validate the layout for this sample rate even when there is nothing to do.
        let segmenter = Segmenter::new(self.config.segmenter, waveform.sample_rate())?;
        if waveform.is_empty() {
            tracing::debug!("empty waveform, nothing to transcribe");
            return Ok(Transcript::empty(duration_s, return_timestamps));
        }

        let windows = segmenter.segment(waveform)?;
        let batch_count = self.scheduler.batch_count(windows.len());
        tracing::info!(
            duration_s,
            windows = windows.len(),
            batches = batch_count,
            batch_size = self.scheduler.batch_size(),
            model = self.transcriber.model_name(),
            "starting chunked transcription"
        );

        let started = Instant::now();
        let mut results: Vec<ChunkResult> = Vec::with_capacity(windows.len());
        for (batch_idx, batch) in self.scheduler.batches(&windows).enumerate() {
            let batch_started = Instant::now();
            let batch_results =
                transcribe_batch(self.transcriber.clone(), waveform, batch, self.config.retry)
                    .await?;
            tracing::debug!(
                batch = batch_idx,
                windows = batch.len(),
                elapsed_ms = batch_started.elapsed().as_millis() as u64,
                "batch transcribed"
            );
            results.extend(batch_results);
        }

        let stitcher = Stitcher::with_config(self.config.stitcher.clone(), waveform.sample_rate());
        let transcript = stitcher.stitch(&results, return_timestamps, duration_s);

        let elapsed = started.elapsed().as_secs_f64();
        tracing::info!(
            words = transcript.word_count(),
            elapsed_s = elapsed,
            realtime_factor = if duration_s > 0.0 { elapsed / duration_s } else { 0.0 },
            "transcription complete"
        );
        Ok(transcript)
    }
}
