use crate::chunking::SegmenterConfig;
use crate::defaults;
use crate::error::{LongscribeError, Result};
use crate::output::OutputFormat;
use crate::pipeline::{PipelineConfig, RetryPolicy, StitcherConfig};
use crate::stt::WhisperConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub chunking: ChunkingConfig,
    pub stitching: StitcherConfig,
    pub stt: SttConfig,
    pub output: OutputConfig,
}

/// Window layout and batch execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_length_s: f64,
    pub overlap_s: f64,
    pub batch_size: usize,
    pub retry: RetryPolicy,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    /// Path to a ggml Whisper model
    pub model: String,
    pub language: String,
    /// Threads per window; unset uses the whisper.cpp default
    pub threads: Option<usize>,
    pub word_timestamps: bool,
    pub use_gpu: bool,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub timestamps: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_length_s: defaults::CHUNK_LENGTH_S,
            overlap_s: defaults::OVERLAP_S,
            batch_size: defaults::BATCH_SIZE,
            retry: RetryPolicy::default(),
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: defaults::DEFAULT_MODEL.to_string(),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            threads: None,
            word_timestamps: true,
            use_gpu: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound) =>
            {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - LONGSCRIBE_MODEL → stt.model
    /// - LONGSCRIBE_LANGUAGE → stt.language
    /// - LONGSCRIBE_BATCH_SIZE → chunking.batch_size (ignored unless a positive integer)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("LONGSCRIBE_MODEL")
            && !model.is_empty()
        {
            self.stt.model = model;
        }

        if let Ok(language) = std::env::var("LONGSCRIBE_LANGUAGE")
            && !language.is_empty()
        {
            self.stt.language = language;
        }

        if let Ok(batch_size) = std::env::var("LONGSCRIBE_BATCH_SIZE") {
            match batch_size.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.chunking.batch_size = n,
                _ if batch_size.is_empty() => {}
                _ => tracing::warn!(value = %batch_size, "ignoring invalid LONGSCRIBE_BATCH_SIZE"),
            }
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/longscribe/config.toml on Linux, or `None` when the
    /// platform has no config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("longscribe").join("config.toml"))
    }

    /// Checks every value the pipeline depends on.
    pub fn validate(&self) -> Result<()> {
        self.pipeline_config().validate()?;
        if self.stt.model.trim().is_empty() {
            return Err(LongscribeError::invalid("stt.model", "must not be empty"));
        }
        if self.stt.threads == Some(0) {
            return Err(LongscribeError::invalid("stt.threads", "must be at least 1"));
        }
        if self.output.format.needs_timestamps() && !self.output.timestamps {
            return Err(LongscribeError::invalid(
                "output.format",
                "srt output requires output.timestamps = true",
            ));
        }
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            segmenter: SegmenterConfig::new(self.chunking.chunk_length_s, self.chunking.overlap_s),
            batch_size: self.chunking.batch_size,
            return_timestamps: self.output.timestamps,
            retry: self.chunking.retry,
            stitcher: self.stitching.clone(),
        }
    }

    pub fn whisper_config(&self) -> WhisperConfig {
        WhisperConfig {
            model_path: PathBuf::from(&self.stt.model),
            language: self.stt.language.clone(),
            threads: self.stt.threads,
            word_timestamps: self.stt.word_timestamps,
            use_gpu: self.stt.use_gpu,
        }
    }
}
