use crate::error::{LongscribeError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A span of text with its position in time, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedText {
    pub start_s: f64,
    pub end_s: f64,
    pub text: String,
}

impl TimedText {
    pub fn new(start_s: f64, end_s: f64, text: impl Into<String>) -> Self {
        Self {
            start_s,
            end_s,
            text: text.into(),
        }
    }
}

/// What a model returns for one window of audio.
///
/// Timestamps, when present, are relative to the start of the window.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChunkOutput {
    pub text: String,
    pub timestamps: Option<Vec<TimedText>>,
}

impl ChunkOutput {
    /// Output without timing information.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timestamps: None,
        }
    }

    /// Output built from timed spans; the text is the spans joined by spaces.
    pub fn from_timestamps(timestamps: Vec<TimedText>) -> Self {
        let text = timestamps
            .iter()
            .map(|t| t.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            text,
            timestamps: Some(timestamps),
        }
    }
}

/// Speech-to-text capability for one window of audio.
///
/// Implementations may be called concurrently for different windows and must
/// not carry state from one call to the next: the output for a window depends
/// only on its samples.
pub trait ChunkTranscriber: Send + Sync {
    /// Transcribe mono f32 samples recorded at `sample_rate` Hz.
    fn transcribe_chunk(&self, samples: &[f32], sample_rate: u32) -> Result<ChunkOutput>;

    /// Get the name of the loaded model
    fn model_name(&self) -> &str;

    /// Check if the transcriber is ready
    fn is_ready(&self) -> bool;
}

/// Implement ChunkTranscriber for Arc<T> to allow sharing across workers.
impl<T: ChunkTranscriber + ?Sized> ChunkTranscriber for Arc<T> {
    fn transcribe_chunk(&self, samples: &[f32], sample_rate: u32) -> Result<ChunkOutput> {
        (**self).transcribe_chunk(samples, sample_rate)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Mock transcriber for testing
#[derive(Debug, Clone)]
pub struct MockTranscriber {
    model_name: String,
    output: ChunkOutput,
    should_fail: bool,
}

impl MockTranscriber {
    /// Create a new mock transcriber with default settings
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            output: ChunkOutput::from_text("mock transcription"),
            should_fail: false,
        }
    }

    /// Configure the mock to return a specific response
    pub fn with_response(mut self, response: &str) -> Self {
        self.output = ChunkOutput::from_text(response);
        self
    }

    /// Configure the mock to return timed spans
    pub fn with_timestamps(mut self, timestamps: Vec<TimedText>) -> Self {
        self.output = ChunkOutput::from_timestamps(timestamps);
        self
    }

    /// Configure the mock to fail on transcribe
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

impl ChunkTranscriber for MockTranscriber {
    fn transcribe_chunk(&self, _samples: &[f32], _sample_rate: u32) -> Result<ChunkOutput> {
        if self.should_fail {
            Err(LongscribeError::Inference {
                message: "mock transcription failure".to_string(),
            })
        } else {
            Ok(self.output.clone())
        }
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        !self.should_fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_transcriber_returns_response() {
        let transcriber = MockTranscriber::new("test-model").with_response("Hello, this is a test");

        let output = transcriber.transcribe_chunk(&[0.0; 1000], 16000).unwrap();

        assert_eq!(output.text, "Hello, this is a test");
        assert_eq!(output.timestamps, None);
    }

    #[test]
    fn test_mock_transcriber_returns_error_when_configured() {
        let transcriber = MockTranscriber::new("test-model").with_failure();

        match transcriber.transcribe_chunk(&[0.0; 1000], 16000) {
            Err(LongscribeError::Inference { message }) => {
                assert_eq!(message, "mock transcription failure");
            }
            other => panic!("Expected Inference error, got {:?}", other),
        }
    }

    #[test]
    fn test_mock_transcriber_with_timestamps_joins_text() {
        let transcriber = MockTranscriber::new("test-model").with_timestamps(vec![
            TimedText::new(0.0, 0.4, "Hello"),
            TimedText::new(0.4, 0.9, " world "),
        ]);

        let output = transcriber.transcribe_chunk(&[], 16000).unwrap();

        assert_eq!(output.text, "Hello world");
        assert_eq!(output.timestamps.map(|t| t.len()), Some(2));
    }

    #[test]
    fn test_mock_transcriber_is_ready() {
        assert!(MockTranscriber::new("test-model").is_ready());
        assert!(!MockTranscriber::new("test-model").with_failure().is_ready());
    }

    #[test]
    fn test_transcriber_trait_is_object_safe() {
        let transcriber: Arc<dyn ChunkTranscriber> =
            Arc::new(MockTranscriber::new("test-model").with_response("shared test"));

        assert_eq!(transcriber.model_name(), "test-model");
        assert!(transcriber.is_ready());

        let output = transcriber.transcribe_chunk(&[0.0; 100], 16000).unwrap();
        assert_eq!(output.text, "shared test");
    }

    #[test]
    fn test_from_timestamps_skips_blank_spans() {
        let output = ChunkOutput::from_timestamps(vec![
            TimedText::new(0.0, 1.0, "one"),
            TimedText::new(1.0, 2.0, "  "),
            TimedText::new(2.0, 3.0, "two"),
        ]);
        assert_eq!(output.text, "one two");
    }
}
