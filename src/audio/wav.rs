//! WAV decoding into a mono [`Waveform`] at the model's sample rate.
//!
//! Accepts integer PCM (8–32 bit) and 32-bit float files with any channel
//! count and sample rate. Channels are averaged to mono and the result is
//! resampled to the requested rate.

use crate::audio::waveform::Waveform;
use crate::error::{LongscribeError, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Decode WAV data from any reader.
pub fn read_wav<R: Read>(reader: R, target_rate: u32) -> Result<Waveform> {
    let mut wav_reader =
        hound::WavReader::new(reader).map_err(|e| LongscribeError::AudioDecode {
            message: format!("Failed to parse WAV file: {}", e),
        })?;

    let spec = wav_reader.spec();
    if spec.channels == 0 {
        return Err(LongscribeError::AudioDecode {
            message: "WAV file declares zero channels".to_string(),
        });
    }
    if spec.sample_rate == 0 {
        return Err(LongscribeError::AudioDecode {
            message: "WAV file declares a sample rate of 0 Hz".to_string(),
        });
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => wav_reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>(),
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            wav_reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()
        }
    }
    .map_err(|e| LongscribeError::AudioDecode {
        message: format!("Failed to read WAV samples: {}", e),
    })?;

    let mono = downmix(&interleaved, spec.channels as usize);
    let samples = resample(&mono, spec.sample_rate, target_rate);

    tracing::debug!(
        source_rate = spec.sample_rate,
        channels = spec.channels,
        bits = spec.bits_per_sample,
        samples = samples.len(),
        "decoded WAV input"
    );

    Waveform::new(samples, target_rate)
}

/// Decode a WAV file from disk.
pub fn read_wav_file(path: &Path, target_rate: u32) -> Result<Waveform> {
    let file = File::open(path)?;
    read_wav(BufReader::new(file), target_rate)
}

/// Decode WAV data piped on stdin.
pub fn read_wav_stdin(target_rate: u32) -> Result<Waveform> {
    use std::io::Cursor;

    // Read everything first; hound needs to seek past the header chunks.
    let mut buffer = Vec::new();
    std::io::stdin()
        .lock()
        .read_to_end(&mut buffer)
        .map_err(|e| LongscribeError::AudioDecode {
            message: format!("Failed to read from stdin: {}", e),
        })?;

    read_wav(Cursor::new(buffer), target_rate)
}

/// Average interleaved frames down to one channel.
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Simple linear interpolation resampling.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = (source_pos - source_idx as f64) as f32;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx];
                let right = samples[source_idx + 1];
                left + (right - left) * fraction
            }
        })
        .collect()
}
