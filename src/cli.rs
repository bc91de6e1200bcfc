//! Command-line interface for longscribe
//!
//! Provides argument parsing using clap derive macros.

use crate::config::Config;
use crate::output::OutputFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Transcribe long recordings with a chunked Whisper pipeline
#[derive(Parser, Debug)]
#[command(
    name = "longscribe",
    version,
    about = "Transcribe long recordings with a chunked Whisper pipeline"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe a WAV file (use "-" to read from stdin)
    Transcribe(TranscribeArgs),

    /// Show how a WAV file would be split into windows and batches
    Plan {
        /// WAV file, or "-" for stdin
        #[arg(value_name = "WAV")]
        input: PathBuf,

        #[command(flatten)]
        chunking: ChunkingArgs,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the default configuration file path
    Path,
}

/// Window layout overrides shared by `transcribe` and `plan`
#[derive(Args, Debug, Clone, Default)]
pub struct ChunkingArgs {
    /// Window length in seconds (default: 30)
    #[arg(long, value_name = "SECONDS")]
    pub chunk_length: Option<f64>,

    /// Audio shared by adjacent windows, in seconds (default: chunk length / 6)
    #[arg(long, value_name = "SECONDS")]
    pub overlap: Option<f64>,

    /// Windows transcribed concurrently (default: 4)
    #[arg(long, short = 'b', value_name = "N")]
    pub batch_size: Option<usize>,
}

impl ChunkingArgs {
    /// Overrides the matching config values.
    pub fn apply(&self, config: &mut Config) {
        if let Some(chunk_length) = self.chunk_length {
            config.chunking.chunk_length_s = chunk_length;
            if self.overlap.is_none() {
                config.chunking.overlap_s = chunk_length * crate::defaults::OVERLAP_FRACTION;
            }
        }
        if let Some(overlap) = self.overlap {
            config.chunking.overlap_s = overlap;
        }
        if let Some(batch_size) = self.batch_size {
            config.chunking.batch_size = batch_size;
        }
    }
}

/// Arguments for `transcribe`
#[derive(Args, Debug, Clone)]
pub struct TranscribeArgs {
    /// WAV file, or "-" for stdin
    #[arg(value_name = "WAV")]
    pub input: PathBuf,

    /// Path to a ggml Whisper model
    #[arg(long, short = 'm', value_name = "PATH")]
    pub model: Option<String>,

    /// Language code for transcription (default: auto-detect). Examples: auto, en, de, es, fr
    #[arg(long, short = 'l', value_name = "LANG")]
    pub language: Option<String>,

    #[command(flatten)]
    pub chunking: ChunkingArgs,

    /// Emit timestamp records in the source timeline
    #[arg(long, short = 't')]
    pub timestamps: bool,

    /// Output format
    #[arg(long, short = 'f', value_enum, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Write the result to a file instead of stdout
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Extra attempts for a failing window before giving up
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Pause between attempts. Examples: 250ms, 2s
    #[arg(long, value_name = "DURATION", value_parser = parse_backoff)]
    pub retry_backoff: Option<Duration>,

    /// Concatenate windows without removing repeated boundary words
    #[arg(long)]
    pub no_dedup: bool,

    /// Number of CPU threads per window (default: auto)
    #[arg(long, value_name = "THREADS")]
    pub threads: Option<usize>,
}

impl TranscribeArgs {
    /// Overrides the matching config values.
    pub fn apply(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.stt.model = model.clone();
        }
        if let Some(language) = &self.language {
            config.stt.language = language.clone();
        }
        if let Some(threads) = self.threads {
            config.stt.threads = Some(threads);
        }
        self.chunking.apply(config);
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if self.timestamps || config.output.format.needs_timestamps() {
            config.output.timestamps = true;
        }
        if let Some(retries) = self.retries {
            config.chunking.retry.max_attempts = retries.saturating_add(1);
        }
        if let Some(backoff) = self.retry_backoff {
            config.chunking.retry.backoff = backoff;
        }
        if self.no_dedup {
            config.stitching.deduplicate_boundaries = false;
        }
    }
}

/// Whether `input` names standard input.
pub fn is_stdin(input: &std::path::Path) -> bool {
    input.as_os_str() == "-"
}

/// Parse a backoff duration.
///
/// Supports any duration format accepted by `humantime`; bare numbers are
/// milliseconds.
fn parse_backoff(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(ms) = s.parse::<u64>() {
        return Ok(Duration::from_millis(ms));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}
