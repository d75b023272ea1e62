/// Live video sources read by the frame sampler
///
/// The camera itself is owned by the caller. The session only asks a
/// `VideoSource` for its status, its native resolution and the frame
/// currently on display.

use arc_swap::ArcSwapOption;
use image::RgbImage;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::info;

/// Playback status of a video source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoStatus {
    /// Frames are flowing
    Ready,
    /// Source is paused; the last frame is stale
    Paused,
    /// Source has ended and will not produce frames again
    Ended,
    /// No frame has been produced yet
    NotReady,
}

impl VideoStatus {
    fn to_u8(self) -> u8 {
        match self {
            Self::Ready => 0,
            Self::Paused => 1,
            Self::Ended => 2,
            Self::NotReady => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Ready,
            1 => Self::Paused,
            2 => Self::Ended,
            _ => Self::NotReady,
        }
    }
}

/// A continuously updating visual frame source
pub trait VideoSource: Send + Sync + 'static {
    /// Current status
    fn status(&self) -> VideoStatus;

    /// Native (width, height) of the frames in pixels
    fn native_resolution(&self) -> (u32, u32);

    /// Frame currently on display, if any
    fn current_frame(&self) -> Option<RgbImage>;
}

/// Video source fed by an external camera provider
///
/// The provider pushes each new frame with `publish`; readers always see
/// the most recent one without blocking the provider.
///
/// # Example
/// ```
/// use recyclens_lib::media::{SharedVideoSource, VideoSource, VideoStatus};
/// use image::RgbImage;
///
/// let source = SharedVideoSource::new();
/// assert_eq!(source.status(), VideoStatus::NotReady);
///
/// source.publish(RgbImage::new(640, 480));
/// assert_eq!(source.status(), VideoStatus::Ready);
/// assert_eq!(source.native_resolution(), (640, 480));
/// ```
pub struct SharedVideoSource {
    frame: ArcSwapOption<RgbImage>,
    status: AtomicU8,
}

impl SharedVideoSource {
    /// Create an empty source in the `NotReady` state
    pub fn new() -> Self {
        Self {
            frame: ArcSwapOption::empty(),
            status: AtomicU8::new(VideoStatus::NotReady.to_u8()),
        }
    }

    /// Replace the current frame and mark the source ready
    pub fn publish(&self, frame: RgbImage) {
        self.frame.store(Some(Arc::new(frame)));
        self.status.store(VideoStatus::Ready.to_u8(), Ordering::Release);
    }

    /// Set the status without touching the frame
    pub fn set_status(&self, status: VideoStatus) {
        self.status.store(status.to_u8(), Ordering::Release);
    }
}

impl Default for SharedVideoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoSource for SharedVideoSource {
    fn status(&self) -> VideoStatus {
        VideoStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn native_resolution(&self) -> (u32, u32) {
        self.frame
            .load()
            .as_deref()
            .map_or((0, 0), RgbImage::dimensions)
    }

    fn current_frame(&self) -> Option<RgbImage> {
        self.frame.load_full().map(|frame| frame.as_ref().clone())
    }
}

/// A single still image presented as an always-ready source
pub struct StillImageSource {
    frame: RgbImage,
}

impl StillImageSource {
    /// Wrap an already decoded image
    pub fn new(frame: RgbImage) -> Self {
        Self { frame }
    }

    /// Load an image file from disk
    ///
    /// # Errors
    /// Returns `image::ImageError` if the file cannot be read or decoded.
    pub fn open(path: impl AsRef<Path>) -> image::ImageResult<Self> {
        let path = path.as_ref();
        let frame = image::open(path)?.to_rgb8();
        info!(
            "Loaded still image {} ({}x{})",
            path.display(),
            frame.width(),
            frame.height()
        );
        Ok(Self::new(frame))
    }
}

impl VideoSource for StillImageSource {
    fn status(&self) -> VideoStatus {
        VideoStatus::Ready
    }

    fn native_resolution(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    fn current_frame(&self) -> Option<RgbImage> {
        Some(self.frame.clone())
    }
}
