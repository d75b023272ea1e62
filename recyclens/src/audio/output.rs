use crate::audio::buffer::{AudioBufferConsumer, AudioBufferProducer, AudioRingBuffer};
use crate::audio::codec::AudioBuffer;
use crate::audio::device::find_output_device;
use crate::audio::error::{AudioError, AudioResult};
use crate::audio::playback::{AudioOutput, Speaker};
use crate::audio::AudioResampler;
use crate::media::MediaAccessError;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

const SPEAKER: &str = "speaker";

/// Seconds of queued model speech the output can hold ahead of the clock
const QUEUE_SECONDS: u32 = 30;

/// Speaker backed by a cpal output device
///
/// Prefers a device configuration at the requested rate; otherwise the
/// device's default rate is used and buffers are resampled on the way in.
#[derive(Debug, Clone, Default)]
pub struct CpalSpeaker {
    device_id: Option<String>,
}

impl CpalSpeaker {
    /// Use a specific output device by name, or the default device if `None`
    pub fn new(device_id: Option<String>) -> Self {
        Self { device_id }
    }
}

impl Speaker for CpalSpeaker {
    fn open(&self, sample_rate: u32) -> Result<Arc<dyn AudioOutput>, MediaAccessError> {
        let device_id = self.device_id.clone();
        let clock = Arc::new(OutputClock::default());
        let thread_clock = Arc::clone(&clock);
        let (ready_tx, ready_rx) = std_mpsc::sync_channel(1);
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("recyclens-speaker".to_string())
            .spawn(move || {
                let stream =
                    match start_output_stream(device_id.as_deref(), sample_rate, thread_clock) {
                        Ok((stream, device_rate, producer)) => {
                            let _ = ready_tx.send(Ok((device_rate, producer)));
                            stream
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };

                let _ = stop_rx.recv();
                drop(stream);
                debug!("Speaker stream released");
            })
            .map_err(|e| MediaAccessError::StreamFailed(e.to_string()))?;

        let (device_rate, producer) = match ready_rx.recv() {
            Ok(Ok(ready)) => ready,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(MediaAccessError::StreamFailed(
                    "speaker thread exited before the stream started".to_string(),
                ));
            }
        };

        let feed = Feed::new(producer, sample_rate, device_rate)
            .map_err(|e| MediaAccessError::StreamFailed(e.to_string()))?;

        info!(
            "Speaker opened: {} Hz device, {} Hz buffers",
            device_rate, sample_rate
        );

        Ok(Arc::new(CpalOutput {
            clock,
            device_rate,
            feed: Mutex::new(feed),
            stop_tx: Mutex::new(Some(stop_tx)),
            thread: Mutex::new(Some(thread)),
        }))
    }
}

/// Frames rendered by the device callback since the stream opened
#[derive(Debug, Default)]
struct OutputClock {
    rendered: AtomicU64,
    closed: AtomicBool,
}

/// Writer-side state, shared by every `start_at` call
///
/// Buffers that follow each other on the playback timeline go through the
/// resampler as one continuous stream. Silence is only inserted for real
/// gaps, and the timeline is re-anchored to the device clock after an
/// underrun.
struct Feed {
    producer: AudioBufferProducer,
    source_rate: u32,
    device_rate: u32,
    /// Device frame index one past the last sample pushed into the ring
    written: u64,
    /// Playback time, in seconds, where the last queued buffer ends
    source_end: f64,
    resampler: Option<AudioResampler>,
    resample_buffer: Vec<f32>,
}

impl Feed {
    fn new(producer: AudioBufferProducer, source_rate: u32, device_rate: u32) -> AudioResult<Self> {
        let resampler = if source_rate == device_rate {
            None
        } else {
            Some(AudioResampler::new(source_rate, device_rate)?)
        };

        Ok(Self {
            producer,
            source_rate,
            device_rate,
            written: 0,
            source_end: 0.0,
            resampler,
            resample_buffer: Vec::new(),
        })
    }

    /// Queue `samples` to start at playback time `at`
    ///
    /// `rendered` is the number of frames the device has consumed so far.
    fn queue(&mut self, samples: Vec<f32>, at: f64, rendered: u64) {
        let at = at.max(0.0);
        let underrun = rendered > self.written;
        self.written = self.written.max(rendered);

        // Half a source sample absorbs float error in the scheduler's sums
        let tolerance = 0.5 / self.source_rate as f64;
        let gap = at - self.source_end;
        let start = if gap > tolerance {
            if underrun {
                self.restart_at(at);
            } else {
                let max_gap = (QUEUE_SECONDS * self.source_rate) as usize;
                let count = ((gap * self.source_rate as f64).round() as usize).min(max_gap);
                self.push(vec![0.0; count]);
            }
            at
        } else {
            self.source_end
        };

        let duration = samples.len() as f64 / self.source_rate as f64;
        self.push(samples);
        self.source_end = start + duration;
    }

    /// Drop the resampler's history and line the ring up with `at`
    fn restart_at(&mut self, at: f64) {
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
        self.resample_buffer.clear();

        let target = (at * self.device_rate as f64).round() as u64;
        if target > self.written {
            self.written += self.producer.push_silence((target - self.written) as usize) as u64;
        }
    }

    fn push(&mut self, samples: Vec<f32>) {
        let samples = match self.resampler.as_mut() {
            Some(resampler) => {
                match resampler.process_buffered(&samples, &mut self.resample_buffer) {
                    Ok(samples) => samples,
                    Err(e) => {
                        error!("Playback resampling failed: {}", e);
                        return;
                    }
                }
            }
            None => samples,
        };

        let pushed = self.producer.push_slice(&samples);
        self.written += pushed as u64;
        if pushed < samples.len() {
            warn!(
                "Playback queue full, dropped {} samples",
                samples.len() - pushed
            );
        }
    }
}

/// An open cpal output stream
struct CpalOutput {
    clock: Arc<OutputClock>,
    device_rate: u32,
    feed: Mutex<Feed>,
    stop_tx: Mutex<Option<std_mpsc::Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl AudioOutput for CpalOutput {
    fn current_time(&self) -> f64 {
        self.clock.rendered.load(Ordering::Acquire) as f64 / self.device_rate as f64
    }

    fn start_at(&self, buffer: AudioBuffer, at: f64) {
        if self.clock.closed.load(Ordering::Acquire) {
            return;
        }

        let rendered = self.clock.rendered.load(Ordering::Acquire);
        self.feed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .queue(buffer.into_samples(), at, rendered);
    }

    fn close(&self) {
        self.clock.closed.store(true, Ordering::Release);

        if let Some(stop_tx) = self
            .stop_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            info!("Closing speaker");
            let _ = stop_tx.send(());
        }

        let thread = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                warn!("Speaker thread panicked");
            }
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.close();
    }
}

fn start_output_stream(
    device_id: Option<&str>,
    sample_rate: u32,
    clock: Arc<OutputClock>,
) -> Result<(Stream, u32, AudioBufferProducer), MediaAccessError> {
    let host = cpal::default_host();
    let device = find_output_device(&host, device_id).map_err(media_error)?;

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    info!("Using audio output device: {}", device_name);

    let (config, sample_format) = choose_output_config(&device, sample_rate)?;
    let device_rate = config.sample_rate.0;

    debug!(
        "Output config: {} Hz, {} channels, {:?}",
        device_rate, config.channels, sample_format
    );

    let (producer, consumer) = AudioRingBuffer::with_duration(device_rate, QUEUE_SECONDS);

    let stream = match sample_format {
        SampleFormat::F32 => build_output::<f32>(&device, &config, consumer, clock),
        SampleFormat::I16 => build_output::<i16>(&device, &config, consumer, clock),
        SampleFormat::U16 => build_output::<u16>(&device, &config, consumer, clock),
        SampleFormat::I32 => build_output::<i32>(&device, &config, consumer, clock),
        other => {
            return Err(MediaAccessError::StreamFailed(format!(
                "unsupported output sample format {:?}",
                other
            )));
        }
    }
    .map_err(|e| match e {
        cpal::BuildStreamError::DeviceNotAvailable => MediaAccessError::DeviceUnavailable(SPEAKER),
        other => MediaAccessError::StreamFailed(other.to_string()),
    })?;

    stream
        .play()
        .map_err(|e| MediaAccessError::StreamFailed(e.to_string()))?;

    Ok((stream, device_rate, producer))
}

/// Pick a configuration running at `sample_rate` if the device has one
fn choose_output_config(
    device: &Device,
    sample_rate: u32,
) -> Result<(StreamConfig, SampleFormat), MediaAccessError> {
    let exact = device.supported_output_configs().ok().and_then(|mut configs| {
        configs.find(|c| {
            c.min_sample_rate().0 <= sample_rate && c.max_sample_rate().0 >= sample_rate
        })
    });

    if let Some(range) = exact {
        let supported = range.with_sample_rate(cpal::SampleRate(sample_rate));
        return Ok((supported.config(), supported.sample_format()));
    }

    let supported = device
        .default_output_config()
        .map_err(|e| media_error(AudioError::DefaultConfigError(e)))?;
    Ok((supported.config(), supported.sample_format()))
}

fn build_output<T>(
    device: &Device,
    config: &StreamConfig,
    mut consumer: AudioBufferConsumer,
    clock: Arc<OutputClock>,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels.max(1) as usize;
    let mut mono = Vec::<f32>::new();

    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let frames = data.len() / channels;
            mono.clear();
            mono.resize(frames, 0.0);

            if !clock.closed.load(Ordering::Acquire) {
                consumer.pop_slice(&mut mono);
            }

            for (frame, &sample) in data.chunks_exact_mut(channels).zip(mono.iter()) {
                let value = sample.to_sample::<T>();
                frame.iter_mut().for_each(|s| *s = value);
            }

            clock.rendered.fetch_add(frames as u64, Ordering::AcqRel);
        },
        move |err| {
            error!("Audio output stream error: {}", err);
        },
        None,
    )
}

fn media_error(err: AudioError) -> MediaAccessError {
    match err {
        AudioError::DeviceNotFound => MediaAccessError::DeviceNotFound(SPEAKER),
        other => MediaAccessError::StreamFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_speaker_open_close() {
        let output = match CpalSpeaker::default().open(24000) {
            Ok(output) => output,
            Err(e) => {
                eprintln!("Warning: No audio output available for testing: {}", e);
                return;
            }
        };

        let start = output.current_time();
        output.start_at(AudioBuffer::new(vec![0.0; 2400], 24000), start);
        std::thread::sleep(Duration::from_millis(200));
        assert!(output.current_time() >= start);

        output.close();
        // Closing twice is harmless
        output.close();
    }

    /// Queue 24kHz buffers into a 48kHz ring and drain everything written
    fn feed_48k() -> (Feed, AudioBufferConsumer) {
        let (producer, consumer) = AudioRingBuffer::with_duration(48000, QUEUE_SECONDS);
        (Feed::new(producer, 24000, 48000).unwrap(), consumer)
    }

    fn drain(consumer: &mut AudioBufferConsumer) -> Vec<f32> {
        let mut out = vec![0.0f32; 48000 * 4];
        let n = consumer.pop_slice(&mut out);
        out.truncate(n);
        out
    }

    #[test]
    fn test_back_to_back_buffers_stay_continuous() {
        println!("\n=== Playback Feed Test: contiguous chunks ===");

        let (mut feed, mut consumer) = feed_48k();

        // Five 1/3 s chunks; 8000 is not a multiple of the 240-sample chunk
        for i in 0..5 {
            let at = (i * 8000) as f64 / 24000.0;
            feed.queue(vec![0.5; 8000], at, 0);
        }

        let out = drain(&mut consumer);
        println!("  Device samples written: {}", out.len());

        assert_eq!(feed.written, out.len() as u64);
        assert!(out.len() > 79000 && out.len() <= 80000);

        let settled = &out[1000..out.len() - 500];
        let quietest = settled.iter().copied().fold(f32::MAX, f32::min);
        println!("  Quietest settled sample: {:.4}", quietest);
        assert!(quietest > 0.3, "dropout inside continuous speech");
        println!("  ✓ No silence at chunk boundaries");
    }

    #[test]
    fn test_gap_is_filled_with_silence() {
        println!("\n=== Playback Feed Test: scheduled gap ===");

        let (mut feed, mut consumer) = feed_48k();

        feed.queue(vec![0.5; 4800], 0.0, 0);
        feed.queue(vec![0.5; 2400], 0.4, 0);
        assert!((feed.source_end - 0.5).abs() < 1e-9);

        let out = drain(&mut consumer);
        println!("  Device samples written: {}", out.len());
        assert!(out.len() > 23500 && out.len() <= 24000);

        // 0.2s..0.4s of the timeline is the gap
        let gap = &out[10500..18500];
        assert!(gap.iter().all(|s| s.abs() < 0.01), "gap should be silent");
        assert!(out[20000..23000].iter().all(|&s| s > 0.3));
        println!("  ✓ Gap rendered as silence, speech resumes after it");
    }

    #[test]
    fn test_underrun_reanchors_to_device_clock() {
        println!("\n=== Playback Feed Test: underrun ===");

        let (mut feed, mut consumer) = feed_48k();

        // The device has rendered a full second of silence past our cursor
        feed.queue(vec![0.5; 4800], 1.1, 48000);

        let out = drain(&mut consumer);
        println!("  Written cursor: {}", feed.written);
        assert_eq!(feed.written, 48000 + out.len() as u64);
        assert!(feed.written > 52800 + 9000 && feed.written <= 52800 + 9600);
        assert!(out[..4800].iter().all(|&s| s == 0.0));
        assert!((feed.source_end - 1.3).abs() < 1e-9);
        println!("  ✓ Buffer lands at its scheduled device frame");
    }

    #[test]
    fn test_matching_rates_pass_through() {
        let (producer, mut consumer) = AudioRingBuffer::with_duration(24000, 1);
        let mut feed = Feed::new(producer, 24000, 24000).unwrap();

        feed.queue(vec![0.5; 2400], 0.0, 0);
        feed.queue(vec![0.5; 2400], 0.1, 0);
        feed.queue(vec![0.5; 2400], 0.3, 0);
        assert_eq!(feed.written, 9600);

        let out = drain(&mut consumer);
        assert_eq!(out.len(), 9600);
        assert!(out[..4800].iter().all(|&s| s == 0.5));
        assert!(out[4800..7200].iter().all(|&s| s == 0.0));
        assert!(out[7200..].iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_speaker_with_unknown_device() {
        let result = CpalSpeaker::new(Some("NonExistentDevice".to_string())).open(24000);

        assert!(matches!(
            result,
            Err(MediaAccessError::DeviceNotFound(_)) | Err(MediaAccessError::StreamFailed(_))
        ));
    }
}
