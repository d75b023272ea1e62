/// PCM wire codec
///
/// Outbound microphone blocks are clamped, scaled to signed 16-bit
/// little-endian PCM and base64 encoded. Inbound model audio arrives as
/// the same representation and is decoded back into playable f32 buffers.

use crate::audio::error::DecodeError;
use crate::network::messages::MediaBlob;
use base64::{engine::general_purpose::STANDARD, Engine};

/// Sample rate of microphone audio sent to the endpoint
pub const INPUT_SAMPLE_RATE: u32 = 16000;

/// Sample rate of model audio received from the endpoint
pub const OUTPUT_SAMPLE_RATE: u32 = 24000;

const PCM_SCALE: f32 = 32768.0;

/// One block of captured microphone audio, mono, in [-1.0, 1.0]
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioFrame {
    /// Wrap a block of mono samples captured at `sample_rate`
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Samples of this block
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples in the block
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the block holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A decoded, playable mono buffer
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a buffer from mono samples at `sample_rate`
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Samples of the buffer
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Consume the buffer and return its samples
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// MIME descriptor for raw PCM at the given rate
pub fn pcm_mime_type(sample_rate: u32) -> String {
    format!("audio/pcm;rate={}", sample_rate)
}

/// Encode one microphone block into a wire payload
///
/// # Example
/// ```
/// use recyclens_lib::audio::codec::{encode, AudioFrame};
///
/// let frame = AudioFrame::new(vec![0.0, 0.5, -0.5], 16000);
/// let blob = encode(&frame);
/// assert_eq!(blob.mime_type, "audio/pcm;rate=16000");
/// ```
pub fn encode(frame: &AudioFrame) -> MediaBlob {
    let pcm = f32_to_i16_pcm(frame.samples());
    MediaBlob::new(
        pcm_mime_type(frame.sample_rate()),
        STANDARD.encode(i16_to_bytes(&pcm)),
    )
}

/// Decode a base64 payload of 16-bit little-endian PCM into a playable buffer
///
/// # Errors
/// Returns `DecodeError` if the payload is not base64, is empty, or ends
/// in the middle of a sample.
pub fn decode(payload: &str, sample_rate: u32) -> Result<AudioBuffer, DecodeError> {
    let bytes = STANDARD.decode(payload.trim())?;

    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::Truncated { len: bytes.len() });
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / PCM_SCALE)
        .collect();

    Ok(AudioBuffer::new(samples, sample_rate))
}

/// Convert f32 samples (range: -1.0 to 1.0) to i16 PCM
fn f32_to_i16_pcm(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&sample| {
            let clamped = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
            (clamped * PCM_SCALE).clamp(i16::MIN as f32, i16::MAX as f32) as i16
        })
        .collect()
}

/// Convert i16 samples to little-endian bytes
fn i16_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}
