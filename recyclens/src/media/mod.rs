//! Camera-side media and device access errors

/// Media access error types
pub mod error;

/// Periodic frame capture and JPEG compression
pub mod sampler;

/// Video source abstraction and built-in sources
pub mod video;

// Re-export commonly used types
pub use error::MediaAccessError;
pub use sampler::{compress_frame, scaled_size, FrameSampler, SamplerSettings, VideoFrame};
pub use video::{SharedVideoSource, StillImageSource, VideoSource, VideoStatus};
