//! Audio input: the immutable [`Waveform`] and WAV decoding into it.

pub mod wav;
pub mod waveform;

pub use wav::{read_wav, read_wav_file, read_wav_stdin};
pub use waveform::Waveform;
