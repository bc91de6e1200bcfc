//! Runs the transcriber over one batch of windows.
//!
//! Inference is blocking, so every window of a batch runs on tokio's blocking
//! pool. Results are keyed by window index; completion order never matters.
//!
//! Blocking tasks cannot be aborted once running. A failing window instead
//! raises a shared [`BatchCancel`] that the other windows check before every
//! model call and while backing off, and the batch waits for all of them to
//! wind down before returning.

use crate::audio::Waveform;
use crate::chunking::Window;
use crate::error::{LongscribeError, Result};
use crate::pipeline::transcript::ChunkResult;
use crate::stt::{ChunkOutput, ChunkTranscriber};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// How often a backing-off window checks for cancellation.
const CANCEL_POLL: Duration = Duration::from_millis(10);

/// How often a failing window is retried before the run is aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per window, including the first one.
    pub max_attempts: u32,
    /// Pause between attempts.
    #[serde(rename = "backoff_ms", with = "duration_ms")]
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::defaults::MAX_ATTEMPTS,
            backoff: Duration::from_millis(crate::defaults::RETRY_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(LongscribeError::invalid("max_attempts", "must be at least 1"));
        }
        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Stop signal shared by the windows of one batch.
///
/// Tracks the lowest failing window. Windows above it stop before their next
/// model call; windows below it run on, so the failure a batch reports is
/// always its lowest failing window.
#[derive(Debug, Clone)]
pub struct BatchCancel {
    /// First window index that must stop.
    cutoff: Arc<AtomicUsize>,
}

impl Default for BatchCancel {
    fn default() -> Self {
        Self {
            cutoff: Arc::new(AtomicUsize::new(usize::MAX)),
        }
    }
}

impl BatchCancel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that window `index` failed.
    pub fn fail(&self, index: usize) {
        self.cutoff.fetch_min(index.saturating_add(1), Ordering::SeqCst);
    }

    /// Stops every window.
    pub fn cancel_all(&self) {
        self.cutoff.store(0, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self, index: usize) -> bool {
        index >= self.cutoff.load(Ordering::SeqCst)
    }

    /// Sleeps for `backoff`, returning early once `index` is cancelled.
    fn pause(&self, index: usize, backoff: Duration) {
        let deadline = Instant::now() + backoff;
        while !self.is_cancelled(index) {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            std::thread::sleep(left.min(CANCEL_POLL));
        }
    }
}

/// Transcribes one window, retrying per `policy`.
///
/// Errors and panics from the transcriber are reported as
/// [`LongscribeError::ChunkTranscription`] naming the window. Once `cancel`
/// covers this window no further model call is made and
/// [`LongscribeError::Cancelled`] is returned.
pub fn transcribe_window(
    transcriber: &dyn ChunkTranscriber,
    waveform: &Waveform,
    window: Window,
    policy: RetryPolicy,
    cancel: &BatchCancel,
) -> Result<ChunkOutput> {
    let sample_rate = waveform.sample_rate();
    let samples = window.samples(waveform);
    let attempts = policy.max_attempts.max(1);
    let mut last_message = String::new();

    for attempt in 1..=attempts {
        if cancel.is_cancelled(window.index) {
            tracing::debug!(chunk = window.index, attempt, "chunk cancelled");
            return Err(LongscribeError::Cancelled {
                index: window.index,
            });
        }
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            transcriber.transcribe_chunk(samples, sample_rate)
        }));
        match outcome {
            Ok(Ok(output)) => {
                tracing::trace!(
                    chunk = window.index,
                    attempt,
                    chars = output.text.len(),
                    "chunk transcribed"
                );
                return Ok(output);
            }
            Ok(Err(e)) => last_message = e.to_string(),
            Err(payload) => {
                last_message = format!("transcriber panicked: {}", panic_message(payload.as_ref()))
            }
        }

        if attempt < attempts {
            tracing::warn!(
                chunk = window.index,
                attempt,
                error = %last_message,
                "chunk transcription failed, retrying"
            );
            if !policy.backoff.is_zero() {
                cancel.pause(window.index, policy.backoff);
            }
        }
    }

    Err(LongscribeError::ChunkTranscription {
        index: window.index,
        start_s: window.start_s(sample_rate),
        end_s: window.end_s(sample_rate),
        attempts,
        message: last_message,
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Transcribes every window of `batch` concurrently.
///
/// Returns results sorted by window index. When windows fail, the rest of the
/// batch is cancelled and the error of the lowest failing window is returned.
/// No model call is running or started once this returns.
pub async fn transcribe_batch(
    transcriber: Arc<dyn ChunkTranscriber>,
    waveform: &Waveform,
    batch: &[Window],
    policy: RetryPolicy,
) -> Result<Vec<ChunkResult>> {
    let cancel = BatchCancel::new();
    let mut tasks = JoinSet::new();
    for &window in batch {
        let transcriber = transcriber.clone();
        let waveform = waveform.clone();
        let cancel = cancel.clone();
        tasks.spawn_blocking(move || {
            let output =
                transcribe_window(transcriber.as_ref(), &waveform, window, policy, &cancel);
            (window, output)
        });
    }

    let mut results = BTreeMap::new();
    let mut failure: Option<LongscribeError> = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((window, Ok(output))) => {
                results.insert(window.index, ChunkResult::new(window, output));
            }
            Ok((_, Err(LongscribeError::Cancelled { .. }))) => {}
            Ok((window, Err(e))) => {
                cancel.fail(window.index);
                let lowest = failure
                    .as_ref()
                    .and_then(LongscribeError::chunk_index)
                    .is_none_or(|current| window.index < current);
                if lowest {
                    failure = Some(e);
                }
            }
            Err(e) => {
                cancel.cancel_all();
                failure.get_or_insert(LongscribeError::Inference {
                    message: format!("Transcription task failed: {}", e),
                });
            }
        }
    }

    match failure {
        Some(e) => {
            tracing::debug!(error = %e, "batch cancelled");
            Err(e)
        }
        None => Ok(results.into_values().collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::{Segmenter, SegmenterConfig};
    use crate::stt::MockTranscriber;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn waveform(seconds: usize) -> Waveform {
        Waveform::new(vec![0.0f32; seconds * 100], 100).unwrap()
    }

    fn windows(wave: &Waveform) -> Vec<Window> {
        Segmenter::new(SegmenterConfig::new(10.0, 2.0), 100)
            .unwrap()
            .segment(wave)
            .unwrap()
    }

    /// Fails the first `failures` calls, then succeeds.
    struct FlakyTranscriber {
        calls: AtomicU32,
        failures: u32,
    }

    impl ChunkTranscriber for FlakyTranscriber {
        fn transcribe_chunk(&self, _samples: &[f32], _sample_rate: u32) -> Result<ChunkOutput> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(LongscribeError::Inference {
                    message: format!("flaky failure {}", call),
                })
            } else {
                Ok(ChunkOutput::from_text("recovered"))
            }
        }

        fn model_name(&self) -> &str {
            "flaky"
        }

        fn is_ready(&self) -> bool {
            true
        }
    }

    struct PanickingTranscriber;

    impl ChunkTranscriber for PanickingTranscriber {
        fn transcribe_chunk(&self, _samples: &[f32], _sample_rate: u32) -> Result<ChunkOutput> {
            panic!("model exploded");
        }

        fn model_name(&self) -> &str {
            "panicky"
        }

        fn is_ready(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.backoff, Duration::from_millis(250));
        assert!(RetryPolicy { max_attempts: 0, ..policy }.validate().is_err());
    }

    #[test]
    fn test_transcribe_window_wraps_error_with_window() {
        let wave = waveform(25);
        let window = windows(&wave)[1];
        let transcriber = MockTranscriber::new("m").with_failure();

        match transcribe_window(&transcriber, &wave, window, RetryPolicy::none(), &BatchCancel::new()) {
            Err(LongscribeError::ChunkTranscription {
                index,
                start_s,
                end_s,
                attempts,
                message,
            }) => {
                assert_eq!(index, 1);
                assert_eq!(start_s, 8.0);
                assert_eq!(end_s, 18.0);
                assert_eq!(attempts, 1);
                assert!(message.contains("mock transcription failure"));
            }
            other => panic!("Expected ChunkTranscription error, got {:?}", other),
        }
    }

    #[test]
    fn test_transcribe_window_retries_until_success() {
        let wave = waveform(5);
        let window = windows(&wave)[0];
        let transcriber = FlakyTranscriber {
            calls: AtomicU32::new(0),
            failures: 2,
        };
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::ZERO,
        };

        let output = transcribe_window(&transcriber, &wave, window, policy, &BatchCancel::new()).unwrap();

        assert_eq!(output.text, "recovered");
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_transcribe_window_gives_up_after_max_attempts() {
        let wave = waveform(5);
        let window = windows(&wave)[0];
        let transcriber = FlakyTranscriber {
            calls: AtomicU32::new(0),
            failures: 5,
        };
        let policy = RetryPolicy {
            max_attempts: 2,
            backoff: Duration::ZERO,
        };

        let err = transcribe_window(&transcriber, &wave, window, policy, &BatchCancel::new()).unwrap_err();

        assert_eq!(err.chunk_index(), Some(0));
        assert!(err.to_string().contains("after 2 attempt(s)"));
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_transcribe_window_reports_panic() {
        let wave = waveform(5);
        let window = windows(&wave)[0];

        let err = transcribe_window(
            &PanickingTranscriber,
            &wave,
            window,
            RetryPolicy::none(),
            &BatchCancel::new(),
        )
        .unwrap_err();

        assert_eq!(err.chunk_index(), Some(0));
        assert!(err.to_string().contains("model exploded"));
    }

    #[test]
    fn test_batch_cancel_stops_only_higher_windows() {
        let cancel = BatchCancel::new();
        assert!(!cancel.is_cancelled(0));
        assert!(!cancel.is_cancelled(usize::MAX - 1));

        cancel.fail(3);
        assert!(!cancel.is_cancelled(2));
        assert!(!cancel.is_cancelled(3));
        assert!(cancel.is_cancelled(4));

        // a later, higher failure never lifts the cutoff
        cancel.fail(5);
        assert!(cancel.is_cancelled(4));

        cancel.fail(1);
        assert!(cancel.is_cancelled(2));

        cancel.cancel_all();
        assert!(cancel.is_cancelled(0));
    }

    #[test]
    fn test_cancelled_window_never_calls_model() {
        let wave = waveform(25);
        let window = windows(&wave)[2];
        let transcriber = FlakyTranscriber {
            calls: AtomicU32::new(0),
            failures: 0,
        };
        let cancel = BatchCancel::new();
        cancel.fail(0);

        let err = transcribe_window(&transcriber, &wave, window, RetryPolicy::none(), &cancel)
            .unwrap_err();

        assert!(matches!(err, LongscribeError::Cancelled { index: 2 }));
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_interrupts_backoff() {
        let wave = waveform(25);
        let window = windows(&wave)[1];
        let transcriber = FlakyTranscriber {
            calls: AtomicU32::new(0),
            failures: u32::MAX,
        };
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff: Duration::from_secs(30),
        };
        let cancel = BatchCancel::new();

        let canceller = {
            let cancel = cancel.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                cancel.fail(0);
            })
        };
        let started = Instant::now();
        let err = transcribe_window(&transcriber, &wave, window, policy, &cancel).unwrap_err();
        canceller.join().unwrap();

        assert!(matches!(err, LongscribeError::Cancelled { index: 1 }));
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_transcribe_batch_reports_lowest_failing_window() {
        // Fails windows 1 and 3; window 1 fails last.
        struct TwoFailures;

        impl ChunkTranscriber for TwoFailures {
            fn transcribe_chunk(&self, samples: &[f32], _sample_rate: u32) -> Result<ChunkOutput> {
                match samples.first().map(|s| *s as u32) {
                    Some(8) => {
                        std::thread::sleep(Duration::from_millis(100));
                        Err(LongscribeError::Inference {
                            message: "slow failure".to_string(),
                        })
                    }
                    Some(24) => Err(LongscribeError::Inference {
                        message: "fast failure".to_string(),
                    }),
                    _ => Ok(ChunkOutput::from_text("ok")),
                }
            }

            fn model_name(&self) -> &str {
                "two-failures"
            }

            fn is_ready(&self) -> bool {
                true
            }
        }

        // sample value = second, so windows start at 0, 8, 16, 24
        let samples: Vec<f32> = (0..40)
            .flat_map(|k| std::iter::repeat_n(k as f32, 100))
            .collect();
        let wave = Waveform::new(samples, 100).unwrap();
        let all = windows(&wave);
        assert_eq!(all[1].start_sample, 800);
        assert_eq!(all[3].start_sample, 2400);

        for _ in 0..3 {
            let err = transcribe_batch(Arc::new(TwoFailures), &wave, &all[..4], RetryPolicy::none())
                .await
                .unwrap_err();
            assert_eq!(err.chunk_index(), Some(1));
            assert!(err.to_string().contains("slow failure"));
        }
    }

    #[tokio::test]
    async fn test_transcribe_batch_returns_sorted_results() {
        let wave = waveform(40);
        let all = windows(&wave);
        let transcriber: Arc<dyn ChunkTranscriber> =
            Arc::new(MockTranscriber::new("m").with_response("hi"));

        let results = transcribe_batch(transcriber, &wave, &all, RetryPolicy::none())
            .await
            .unwrap();

        let indices: Vec<usize> = results.iter().map(|r| r.index()).collect();
        assert_eq!(indices, (0..all.len()).collect::<Vec<_>>());
        assert!(results.iter().all(|r| r.output.text == "hi"));
    }

    #[tokio::test]
    async fn test_transcribe_batch_propagates_failure() {
        let wave = waveform(20);
        let all = windows(&wave);
        let transcriber: Arc<dyn ChunkTranscriber> =
            Arc::new(MockTranscriber::new("m").with_failure());

        let err = transcribe_batch(transcriber, &wave, &all, RetryPolicy::none())
            .await
            .unwrap_err();

        assert!(matches!(err, LongscribeError::ChunkTranscription { .. }));
    }

    #[tokio::test]
    async fn test_transcribe_batch_runs_windows_concurrently() {
        // Transcriber that tracks concurrent executions
        struct SlowTranscriber {
            concurrent: Arc<AtomicU32>,
            max_concurrent: Arc<AtomicU32>,
        }

        impl ChunkTranscriber for SlowTranscriber {
            fn transcribe_chunk(&self, _samples: &[f32], _sample_rate: u32) -> Result<ChunkOutput> {
                let current = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_concurrent.fetch_max(current, Ordering::SeqCst);

                std::thread::sleep(Duration::from_millis(50));

                self.concurrent.fetch_sub(1, Ordering::SeqCst);
                Ok(ChunkOutput::from_text("result"))
            }

            fn model_name(&self) -> &str {
                "slow-mock"
            }

            fn is_ready(&self) -> bool {
                true
            }
        }

        let concurrent = Arc::new(AtomicU32::new(0));
        let max_concurrent = Arc::new(AtomicU32::new(0));
        let transcriber: Arc<dyn ChunkTranscriber> = Arc::new(SlowTranscriber {
            concurrent: concurrent.clone(),
            max_concurrent: max_concurrent.clone(),
        });

        let wave = waveform(30);
        let all = windows(&wave);
        let batch = &all[..3];

        let results = transcribe_batch(transcriber, &wave, batch, RetryPolicy::none())
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        let max = max_concurrent.load(Ordering::SeqCst);
        assert!(max <= 3, "Max concurrent was {} (should be <= 3)", max);
        assert_eq!(concurrent.load(Ordering::SeqCst), 0);
    }
}
