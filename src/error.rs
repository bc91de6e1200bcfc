//! Error types for longscribe.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LongscribeError {
    // Configuration errors
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfiguration { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio errors
    #[error("Failed to decode audio: {message}")]
    AudioDecode { message: String },

    // Model errors
    #[error("Transcription model not found at {path}")]
    ModelNotFound { path: String },

    #[error("Failed to load transcription model: {message}")]
    ModelLoad { message: String },

    /// Raised by a model backend for a single call. The pipeline wraps it
    /// into [`LongscribeError::ChunkTranscription`] with the window index.
    #[error("Transcription inference failed: {message}")]
    Inference { message: String },

    #[error(
        "Transcription failed for chunk {index} ({start_s:.2}s-{end_s:.2}s) after {attempts} attempt(s): {message}"
    )]
    ChunkTranscription {
        index: usize,
        start_s: f64,
        end_s: f64,
        attempts: u32,
        message: String,
    },

    /// A window stopped because a lower window of its batch already failed.
    /// Never returned from a pipeline run.
    #[error("Transcription of chunk {index} cancelled after an earlier chunk failed")]
    Cancelled { index: usize },

    // Output errors
    #[error("Cannot render output: {message}")]
    Output { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LongscribeError {
    /// Shorthand for an [`LongscribeError::InvalidConfiguration`].
    pub fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Window index of a failed chunk, if this error came from one.
    pub fn chunk_index(&self) -> Option<usize> {
        match self {
            Self::ChunkTranscription { index, .. } => Some(*index),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LongscribeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_invalid_configuration_display() {
        let error = LongscribeError::invalid("overlap_s", "must be smaller than chunk_length_s");
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for overlap_s: must be smaller than chunk_length_s"
        );
    }

    #[test]
    fn test_chunk_transcription_display_names_window() {
        let error = LongscribeError::ChunkTranscription {
            index: 4,
            start_s: 100.0,
            end_s: 130.0,
            attempts: 2,
            message: "out of memory".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Transcription failed for chunk 4 (100.00s-130.00s) after 2 attempt(s): out of memory"
        );
        assert_eq!(error.chunk_index(), Some(4));
    }

    #[test]
    fn test_chunk_index_absent_for_other_errors() {
        let error = LongscribeError::Inference {
            message: "boom".to_string(),
        };
        assert_eq!(error.chunk_index(), None);
    }

    #[test]
    fn test_cancelled_display() {
        let error = LongscribeError::Cancelled { index: 7 };
        assert_eq!(
            error.to_string(),
            "Transcription of chunk 7 cancelled after an earlier chunk failed"
        );
        assert_eq!(error.chunk_index(), None);
    }

    #[test]
    fn test_model_not_found_display() {
        let error = LongscribeError::ModelNotFound {
            path: "/models/ggml-base.bin".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Transcription model not found at /models/ggml-base.bin"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: LongscribeError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error_keeps_source() {
        let toml_error = toml::from_str::<toml::Value>("key = 'unclosed").unwrap_err();
        let error: LongscribeError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));

        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<LongscribeError>();
        assert_sync::<LongscribeError>();
    }
}
