/// Periodic camera frame sampling
///
/// Every period the sampler checks the video source, grabs the frame on
/// display, scales it down from the source's native resolution and
/// compresses it to JPEG. Compression runs on the blocking pool so the
/// timer keeps ticking on schedule.

use crate::media::video::{VideoSource, VideoStatus};
use crate::network::messages::MediaBlob;
use base64::{engine::general_purpose::STANDARD, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// MIME type of sampled frames
pub const FRAME_MIME_TYPE: &str = "image/jpeg";

/// One compressed camera snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// JPEG bytes
    pub jpeg: Vec<u8>,
    /// Width of the encoded image
    pub width: u32,
    /// Height of the encoded image
    pub height: u32,
}

impl VideoFrame {
    /// Wire payload for this frame
    pub fn to_blob(&self) -> MediaBlob {
        MediaBlob::new(FRAME_MIME_TYPE, STANDARD.encode(&self.jpeg))
    }
}

/// Frame sampler settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerSettings {
    /// Time between capture decisions
    pub interval: Duration,
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
    /// Each native dimension is divided by this
    pub scale_divisor: u32,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            jpeg_quality: 60,
            scale_divisor: 2,
        }
    }
}

/// Clears the in-flight flag when the capture finishes, even on panic
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Periodic sampler bound to one video source
pub struct FrameSampler {
    source: Arc<dyn VideoSource>,
    settings: SamplerSettings,
    in_flight: Arc<AtomicBool>,
}

impl FrameSampler {
    /// Create a sampler for `source`
    pub fn new(source: Arc<dyn VideoSource>, settings: SamplerSettings) -> Self {
        Self {
            source,
            settings,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run the sampler on the current runtime until the handle is aborted
    ///
    /// `on_frame` is called from the blocking pool once per compressed frame.
    pub fn spawn<F>(self, on_frame: F) -> JoinHandle<()>
    where
        F: Fn(VideoFrame) + Send + Sync + 'static,
    {
        tokio::spawn(self.run(Arc::new(on_frame)))
    }

    async fn run<F>(self, on_frame: Arc<F>)
    where
        F: Fn(VideoFrame) + Send + Sync + 'static,
    {
        info!(
            "Frame sampler started: every {}ms, quality {}",
            self.settings.interval.as_millis(),
            self.settings.jpeg_quality
        );

        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick of an interval completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.tick(&on_frame);
        }
    }

    fn tick<F>(&self, on_frame: &Arc<F>)
    where
        F: Fn(VideoFrame) + Send + Sync + 'static,
    {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("Previous frame still compressing, skipping tick");
            return;
        }
        let guard = InFlight(Arc::clone(&self.in_flight));

        match self.source.status() {
            VideoStatus::Ready => {}
            status => {
                debug!("Video source not ready ({:?}), skipping tick", status);
                return;
            }
        }

        let source = Arc::clone(&self.source);
        let settings = self.settings;
        let on_frame = Arc::clone(on_frame);

        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let Some(frame) = source.current_frame() else {
                debug!("Video source returned no frame");
                return;
            };
            let native = match source.native_resolution() {
                (0, _) | (_, 0) => frame.dimensions(),
                native => native,
            };
            let size = scaled_size(native, settings.scale_divisor);
            match compress_frame(&frame, size, settings.jpeg_quality) {
                Ok(video_frame) => {
                    debug!(
                        "Captured frame {}x{} ({} bytes)",
                        video_frame.width,
                        video_frame.height,
                        video_frame.jpeg.len()
                    );
                    on_frame(video_frame);
                }
                Err(e) => warn!("Failed to compress video frame: {}", e),
            }
        });
    }
}

/// Native resolution divided by `scale_divisor`, never below 1x1
pub fn scaled_size(native: (u32, u32), scale_divisor: u32) -> (u32, u32) {
    let divisor = scale_divisor.max(1);
    ((native.0 / divisor).max(1), (native.1 / divisor).max(1))
}

/// Resize `frame` to `size` and encode it as JPEG
///
/// # Errors
/// Returns `image::ImageError` if the encoder fails.
pub fn compress_frame(
    frame: &RgbImage,
    size: (u32, u32),
    quality: u8,
) -> image::ImageResult<VideoFrame> {
    let (width, height) = (size.0.max(1), size.1.max(1));

    let scaled = if (width, height) == frame.dimensions() {
        frame.clone()
    } else {
        imageops::resize(frame, width, height, FilterType::Triangle)
    };

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100)).encode_image(&scaled)?;

    Ok(VideoFrame {
        jpeg,
        width,
        height,
    })
}
