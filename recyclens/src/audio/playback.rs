/// Gapless playback scheduling
///
/// Decoded model audio is queued back-to-back on an output clock. The
/// scheduler owns the single cursor (`next_start_time`) that decides where
/// the next buffer begins.

use crate::audio::codec::AudioBuffer;
use crate::media::MediaAccessError;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// An opened audio output context
///
/// The clock starts at 0.0 when the context is opened and advances in
/// seconds while the context renders.
pub trait AudioOutput: Send + Sync {
    /// Current position of the output clock in seconds
    fn current_time(&self) -> f64;

    /// Begin playing `buffer` when the clock reaches `at`
    fn start_at(&self, buffer: AudioBuffer, at: f64);

    /// Stop rendering and release the device. Must be idempotent.
    fn close(&self);
}

/// Factory for audio output contexts
pub trait Speaker: Send + Sync + 'static {
    /// Open an output context that plays buffers at `sample_rate`
    ///
    /// # Errors
    /// Returns `MediaAccessError` if no output device can be opened.
    fn open(&self, sample_rate: u32) -> Result<Arc<dyn AudioOutput>, MediaAccessError>;
}

/// Queues buffers on an `AudioOutput` so they play without gaps or overlap
///
/// # Example
/// ```no_run
/// use recyclens_lib::audio::playback::{AudioOutput, PlaybackScheduler};
/// use recyclens_lib::audio::codec::AudioBuffer;
///
/// fn play(output: &dyn AudioOutput, scheduler: &PlaybackScheduler) {
///     let start = scheduler.schedule(output, AudioBuffer::new(vec![0.0; 2400], 24000));
///     println!("buffer starts at {start:.3}s");
/// }
/// ```
#[derive(Debug, Default)]
pub struct PlaybackScheduler {
    next_start_time: Mutex<f64>,
}

impl PlaybackScheduler {
    /// Create a scheduler with its cursor at the clock's zero reference
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `buffer` right after everything queued before it
    ///
    /// The start time is `max(next_start_time, output.current_time())`.
    /// The cursor is held locked across the whole decision, so buffers
    /// arriving from several producers still play in call order.
    ///
    /// # Returns
    /// The clock time at which the buffer was scheduled to start.
    pub fn schedule(&self, output: &dyn AudioOutput, buffer: AudioBuffer) -> f64 {
        let mut next_start_time = self
            .next_start_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let start_time = next_start_time.max(output.current_time());
        let duration = buffer.duration();

        output.start_at(buffer, start_time);
        *next_start_time = start_time + duration;

        debug!(
            "Scheduled {:.3}s of audio at {:.3}s (next: {:.3}s)",
            duration, start_time, *next_start_time
        );

        start_time
    }

    /// Where the next buffer will start if the clock has not overtaken it
    pub fn next_start_time(&self) -> f64 {
        *self
            .next_start_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the cursor back to the clock's zero reference
    pub fn reset(&self) {
        *self
            .next_start_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = 0.0;
    }
}
