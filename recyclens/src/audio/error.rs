use thiserror::Error;

/// Audio-related errors
#[derive(Error, Debug)]
pub enum AudioError {
    /// No audio device found
    #[error("No audio device found")]
    DeviceNotFound,

    /// Resampling failed
    #[error("Resampling failed: {0}")]
    ResampleFailed(String),

    /// Device name is invalid
    #[error("Device name is invalid UTF-8")]
    InvalidDeviceName,

    /// cpal error
    #[error("cpal error: {0}")]
    CpalError(#[from] cpal::DevicesError),

    /// Default config error
    #[error("Default config error: {0}")]
    DefaultConfigError(#[from] cpal::DefaultStreamConfigError),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;

/// Errors raised while decoding an inbound PCM chunk
///
/// A decode failure only affects the chunk it came from; the caller
/// logs it and keeps playing from the current cursor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload is not valid base64
    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(String),

    /// Payload ended in the middle of a 16-bit sample
    #[error("Truncated PCM payload: {len} bytes is not a whole number of samples")]
    Truncated { len: usize },

    /// Payload decoded to zero samples
    #[error("Empty PCM payload")]
    Empty,
}

impl From<base64::DecodeError> for DecodeError {
    fn from(err: base64::DecodeError) -> Self {
        DecodeError::InvalidBase64(err.to_string())
    }
}
