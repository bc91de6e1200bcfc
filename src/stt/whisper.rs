//! Whisper-based speech-to-text transcription.
//!
//! This module provides a Whisper implementation of the ChunkTranscriber
//! trait using whisper-rs.
//!
//! # Feature Gate
//!
//! This module requires the `whisper` feature to be enabled and cmake to be installed.
//! To build with Whisper support:
//!
//! ```bash
//! cargo build --features whisper
//! ```

use crate::defaults;
use crate::error::{LongscribeError, Result};
use crate::stt::transcriber::{ChunkOutput, ChunkTranscriber};
use std::path::PathBuf;

#[cfg(feature = "whisper")]
use crate::stt::transcriber::TimedText;
#[cfg(feature = "whisper")]
use std::sync::Once;
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Configuration for Whisper transcriber.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Path to the Whisper model file
    pub model_path: PathBuf,
    /// Language code (e.g., "en", "es", "fr")
    pub language: String,
    /// Number of threads per inference call (None = whisper.cpp default)
    pub threads: Option<usize>,
    /// Emit one timed span per word instead of one per segment
    pub word_timestamps: bool,
    /// Offload inference to the GPU when the build has a GPU backend
    pub use_gpu: bool,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(defaults::DEFAULT_MODEL),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            threads: None,
            word_timestamps: true,
            use_gpu: true,
        }
    }
}

/// Whisper-based transcriber implementation.
///
/// The context is shared; each call creates its own inference state, so
/// windows of one batch can be decoded concurrently.
///
/// # Feature Gate
///
/// This type is only available when the `whisper` feature is enabled.
#[cfg(feature = "whisper")]
pub struct WhisperTranscriber {
    context: WhisperContext,
    config: WhisperConfig,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperTranscriber")
            .field("config", &self.config)
            .field("model_name", &self.model_name)
            .field("context", &"<WhisperContext>")
            .finish()
    }
}

/// Whisper-based transcriber placeholder (without whisper feature).
///
/// This is a stub implementation that returns errors when used.
/// Enable the `whisper` feature to use real transcription.
#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperTranscriber {
    config: WhisperConfig,
    model_name: String,
}

fn model_name_from_path(config: &WhisperConfig) -> String {
    config
        .model_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(feature = "whisper")]
impl WhisperTranscriber {
    /// Create a new Whisper transcriber.
    ///
    /// # Errors
    /// Returns `LongscribeError::ModelNotFound` if the model file doesn't exist
    /// Returns `LongscribeError::ModelLoad` if model loading fails
    pub fn new(config: WhisperConfig) -> Result<Self> {
        // Route whisper.cpp output away from stdout (only once)
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        if !config.model_path.exists() {
            return Err(LongscribeError::ModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }

        let model_name = model_name_from_path(&config);

        let mut context_params = WhisperContextParameters::default();
        context_params.use_gpu(config.use_gpu);
        let context = WhisperContext::new_with_params(
            config
                .model_path
                .to_str()
                .ok_or_else(|| LongscribeError::ModelLoad {
                    message: "Invalid UTF-8 in model path".to_string(),
                })?,
            context_params,
        )
        .map_err(|e| LongscribeError::ModelLoad {
            message: format!("Failed to load Whisper model: {}", e),
        })?;

        tracing::info!(model = %model_name, backend = defaults::gpu_backend(), "whisper model loaded");

        Ok(Self {
            context,
            config,
            model_name,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(not(feature = "whisper"))]
impl WhisperTranscriber {
    /// Create a new Whisper transcriber (stub implementation).
    ///
    /// Only checks that the model file exists.
    pub fn new(config: WhisperConfig) -> Result<Self> {
        if !config.model_path.exists() {
            return Err(LongscribeError::ModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }

        let model_name = model_name_from_path(&config);
        Ok(Self { config, model_name })
    }

    /// Get the configuration
    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(feature = "whisper")]
impl ChunkTranscriber for WhisperTranscriber {
    fn transcribe_chunk(&self, samples: &[f32], sample_rate: u32) -> Result<ChunkOutput> {
        if sample_rate != defaults::SAMPLE_RATE {
            return Err(LongscribeError::Inference {
                message: format!(
                    "Whisper expects {}Hz audio, got {}Hz",
                    defaults::SAMPLE_RATE,
                    sample_rate
                ),
            });
        }

        let mut state =
            self.context
                .create_state()
                .map_err(|e| LongscribeError::Inference {
                    message: format!("Failed to create Whisper state: {}", e),
                })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        if self.config.language == defaults::AUTO_LANGUAGE {
            params.set_language(None);
        } else {
            params.set_language(Some(&self.config.language));
        }

        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }

        // Each window is decoded on its own; never condition on earlier text.
        params.set_no_context(true);

        if self.config.word_timestamps {
            params.set_token_timestamps(true);
            params.set_split_on_word(true);
            params.set_max_len(1);
        }

        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, samples)
            .map_err(|e| LongscribeError::Inference {
                message: format!("Whisper inference failed: {}", e),
            })?;

        // Segment timestamps are in centiseconds relative to the window.
        let spans: Vec<TimedText> = state
            .as_iter()
            .filter_map(|segment| {
                let text = segment.to_string();
                let text = text.trim();
                if text.is_empty() {
                    return None;
                }
                Some(TimedText::new(
                    segment.start_timestamp() as f64 / 100.0,
                    segment.end_timestamp() as f64 / 100.0,
                    text,
                ))
            })
            .collect();

        Ok(ChunkOutput::from_timestamps(spans))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(not(feature = "whisper"))]
impl ChunkTranscriber for WhisperTranscriber {
    fn transcribe_chunk(&self, _samples: &[f32], _sample_rate: u32) -> Result<ChunkOutput> {
        Err(LongscribeError::Inference {
            message: concat!(
                "Whisper feature not enabled. This binary was built without speech recognition.\n",
                "To fix: cargo build --release (whisper is enabled by default)\n",
                "If build fails with cmake errors, install: sudo apt install cmake"
            )
            .to_string(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        false
    }
}
