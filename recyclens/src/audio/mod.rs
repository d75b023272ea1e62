/// Lock-free sample queue feeding the speaker
pub mod buffer;

/// Microphone capture
pub mod capture;

/// PCM wire codec
pub mod codec;

/// Audio device enumeration
pub mod device;

/// Audio-related error types
pub mod error;

/// Loudness metering
pub mod meter;

/// cpal speaker output
pub mod output;

/// Microphone block pipeline
pub mod pipeline;

/// Gapless playback scheduling
pub mod playback;

/// Audio resampling
pub mod resampler;

// Re-export commonly used types
pub use capture::{CaptureHandle, CpalMicrophone, Microphone};
pub use codec::{
    decode, encode, pcm_mime_type, AudioBuffer, AudioFrame, INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE,
};
pub use device::{list_input_devices, list_output_devices, AudioDevice, DeviceKind};
pub use error::{AudioError, AudioResult, DecodeError};
pub use meter::{display_level, rms, strided_rms, OUTPUT_METER_POINTS};
pub use output::CpalSpeaker;
pub use pipeline::InputPipeline;
pub use playback::{AudioOutput, PlaybackScheduler, Speaker};
pub use resampler::AudioResampler;
