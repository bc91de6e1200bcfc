//! Default configuration constants for longscribe.
//!
//! Shared by the config file, the CLI and the library builders so that all
//! entry points agree on the same values.

/// Model input sample rate in Hz.
///
/// Whisper-family models are trained on 16kHz mono audio; WAV input at any
/// other rate is resampled to this.
pub const SAMPLE_RATE: u32 = 16000;

/// Default window length in seconds.
///
/// Matches the 30s input window Whisper models are trained on.
pub const CHUNK_LENGTH_S: f64 = 30.0;

/// Default overlap between adjacent windows, as a fraction of the window length.
///
/// One sixth of the window (5s for 30s windows) gives the stitcher several
/// words of shared context on each boundary.
pub const OVERLAP_FRACTION: f64 = 1.0 / 6.0;

/// Default overlap in seconds for [`CHUNK_LENGTH_S`].
pub const OVERLAP_S: f64 = CHUNK_LENGTH_S * OVERLAP_FRACTION;

/// Default number of windows transcribed concurrently.
pub const BATCH_SIZE: usize = 4;

/// Default number of attempts per window (1 = no retry).
pub const MAX_ATTEMPTS: u32 = 1;

/// Default pause between attempts on the same window, in milliseconds.
pub const RETRY_BACKOFF_MS: u64 = 250;

/// Default Whisper model path.
pub const DEFAULT_MODEL: &str = "models/ggml-base.bin";

/// Default language code for transcription.
///
/// "auto" lets Whisper detect the spoken language automatically.
pub const DEFAULT_LANGUAGE: &str = "auto";

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";

/// Minimum token length for a single-token boundary match. Shorter words
/// ("the", "and", "of") recur too often to anchor a split on their own.
pub const MIN_WORD_LENGTH: usize = 4;

/// Minimum number of tokens searched on each side of a boundary when the
/// backend reports no timestamps.
pub const MIN_CANDIDATE_TOKENS: usize = 8;

/// Report the GPU backend compiled into this build.
///
/// Returns a human-readable name based on the compile-time feature flags.
/// Only one GPU backend can be active at a time; if none is enabled, returns "CPU".
pub fn gpu_backend() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA"
    } else if cfg!(feature = "vulkan") {
        "Vulkan"
    } else if cfg!(feature = "hipblas") {
        "HipBLAS (AMD)"
    } else if cfg!(feature = "openblas") {
        "OpenBLAS"
    } else {
        "CPU"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_overlap_is_a_sixth_of_the_window() {
        assert!((OVERLAP_S - 5.0).abs() < 1e-9);
        assert!(OVERLAP_S < CHUNK_LENGTH_S);
    }

    #[test]
    fn gpu_backend_defaults_to_cpu_without_gpu_features() {
        if !cfg!(any(
            feature = "cuda",
            feature = "vulkan",
            feature = "hipblas",
            feature = "openblas"
        )) {
            assert_eq!(gpu_backend(), "CPU");
        }
    }
}
