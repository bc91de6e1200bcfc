//! Rendering of a finished [`Transcript`] for the terminal or a file.

use crate::error::{LongscribeError, Result};
use crate::pipeline::Transcript;
use crate::stt::TimedText;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Output format for a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain transcript text
    #[default]
    Text,
    /// The transcript as JSON, including timestamps when requested
    Json,
    /// SubRip subtitles built from timestamp records
    Srt,
}

impl OutputFormat {
    /// Whether the format can only be produced from timestamp records.
    pub fn needs_timestamps(self) -> bool {
        matches!(self, OutputFormat::Srt)
    }
}

/// Renders `transcript` in `format`. The result always ends with a newline
/// unless it is empty.
///
/// # Errors
/// Returns `LongscribeError::Output` for SRT without timestamps.
pub fn render(transcript: &Transcript, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => {
            if transcript.text.is_empty() {
                Ok(String::new())
            } else {
                Ok(format!("{}\n", transcript.text))
            }
        }
        OutputFormat::Json => serde_json::to_string_pretty(transcript)
            .map(|json| json + "\n")
            .map_err(|e| LongscribeError::Output {
                message: format!("JSON serialization failed: {}", e),
            }),
        OutputFormat::Srt => {
            let records = transcript
                .timestamps
                .as_deref()
                .ok_or_else(|| LongscribeError::Output {
                    message: "SRT output requires timestamps (pass --timestamps)".to_string(),
                })?;
            Ok(render_srt(records))
        }
    }
}

fn render_srt(records: &[TimedText]) -> String {
    let mut out = String::new();
    for (n, record) in records.iter().filter(|r| !r.text.trim().is_empty()).enumerate() {
        // writing to a String cannot fail
        let _ = writeln!(
            out,
            "{}\n{} --> {}\n{}\n",
            n + 1,
            srt_timestamp(record.start_s),
            srt_timestamp(record.end_s),
            record.text.trim()
        );
    }
    out
}

/// `HH:MM:SS,mmm`, clamped at zero.
fn srt_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_s = total_ms / 1000;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        total_s / 3600,
        (total_s / 60) % 60,
        total_s % 60,
        ms
    )
}
