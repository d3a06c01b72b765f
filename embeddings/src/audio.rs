//! Decoding WAV audio into mono clips for extraction.

use std::io::{Cursor, Read};
use std::path::Path;

use hound::{SampleFormat, WavReader};
use tracing::debug;

use crate::error::{ExtractionError, Result};

/// Peak amplitude below which a clip counts as silence.
const SILENCE_FLOOR: f32 = 1e-4;

/// Decoded mono audio, samples normalized to [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    /// Mono samples.
    pub samples: Vec<f32>,

    /// Samples per second.
    pub sample_rate: u32,
}

impl AudioClip {
    /// Create a clip from mono samples.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Length of the clip in seconds.
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }

    /// Whether the clip has no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Reject clips no model can embed: empty, zero rate, or silent.
    pub fn ensure_audible(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ExtractionError::UnsupportedFormat(
                "sample rate is zero".to_string(),
            ));
        }
        if self.samples.is_empty() {
            return Err(ExtractionError::EmptyAudio);
        }
        let peak = self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        if !peak.is_finite() {
            return Err(ExtractionError::Decode(
                "non-finite sample values".to_string(),
            ));
        }
        if peak < SILENCE_FLOOR {
            return Err(ExtractionError::Silence);
        }
        Ok(())
    }
}

/// Decode a WAV file from disk.
pub fn decode_wav_file(path: impl AsRef<Path>) -> Result<AudioClip> {
    let path = path.as_ref();
    let reader = WavReader::open(path)?;
    let clip = decode(reader)?;
    debug!(
        "Decoded {} ({:.2}s at {} Hz)",
        path.display(),
        clip.duration_seconds(),
        clip.sample_rate
    );
    Ok(clip)
}

/// Decode a WAV file held in memory.
pub fn decode_wav_bytes(bytes: &[u8]) -> Result<AudioClip> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    decode(reader)
}

fn decode<R: Read>(reader: WavReader<R>) -> Result<AudioClip> {
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(ExtractionError::UnsupportedFormat(
            "wav declares zero channels".to_string(),
        ));
    }

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(ExtractionError::UnsupportedFormat(format!(
                    "{} bits per sample",
                    spec.bits_per_sample
                )));
            }
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let channels = usize::from(spec.channels);
    let mono = if channels > 1 {
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    } else {
        samples
    };

    Ok(AudioClip::new(mono, spec.sample_rate))
}
