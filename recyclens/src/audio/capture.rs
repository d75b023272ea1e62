use crate::audio::device::find_input_device;
use crate::audio::error::AudioError;
use crate::media::MediaAccessError;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const MICROPHONE: &str = "microphone";

/// A running microphone stream
///
/// Raw samples are delivered through the channel passed to
/// `Microphone::open`, interleaved at the device's native rate.
pub trait CaptureHandle: Send {
    /// Native sample rate of the delivered samples
    fn sample_rate(&self) -> u32;

    /// Number of interleaved channels
    fn channels(&self) -> u16;

    /// Stop the stream and release the device. Must be idempotent.
    fn stop(&mut self);
}

/// Source of live microphone audio
pub trait Microphone: Send + Sync + 'static {
    /// Open the microphone and start delivering samples to `sender`
    ///
    /// # Errors
    /// Returns `MediaAccessError` if permission is denied or no device exists.
    fn open(
        &self,
        sender: mpsc::Sender<Vec<f32>>,
    ) -> Result<Box<dyn CaptureHandle>, MediaAccessError>;
}

/// Microphone backed by a cpal input device
///
/// cpal streams cannot move between threads, so each opened stream lives
/// on its own capture thread until it is stopped.
///
/// # Example
/// ```no_run
/// use recyclens_lib::audio::capture::{CpalMicrophone, Microphone};
/// use tokio::sync::mpsc;
///
/// #[tokio::main]
/// async fn main() {
///     let (tx, mut rx) = mpsc::channel(100);
///     let mut handle = CpalMicrophone::default().open(tx).unwrap();
///
///     if let Some(data) = rx.recv().await {
///         println!("Received {} samples @ {} Hz", data.len(), handle.sample_rate());
///     }
///     handle.stop();
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct CpalMicrophone {
    device_id: Option<String>,
}

impl CpalMicrophone {
    /// Use a specific input device by name, or the default device if `None`
    pub fn new(device_id: Option<String>) -> Self {
        Self { device_id }
    }
}

impl Microphone for CpalMicrophone {
    fn open(
        &self,
        sender: mpsc::Sender<Vec<f32>>,
    ) -> Result<Box<dyn CaptureHandle>, MediaAccessError> {
        let device_id = self.device_id.clone();
        let (ready_tx, ready_rx) = std_mpsc::sync_channel(1);
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("recyclens-mic".to_string())
            .spawn(move || {
                let stream = match start_input_stream(device_id.as_deref(), sender) {
                    Ok((stream, sample_rate, channels)) => {
                        let _ = ready_tx.send(Ok((sample_rate, channels)));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Park until stopped; a dropped sender also ends the wait
                let _ = stop_rx.recv();
                drop(stream);
                debug!("Microphone stream released");
            })
            .map_err(|e| MediaAccessError::StreamFailed(e.to_string()))?;

        let (sample_rate, channels) = match ready_rx.recv() {
            Ok(Ok(format)) => format,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(MediaAccessError::StreamFailed(
                    "capture thread exited before the stream started".to_string(),
                ));
            }
        };

        info!("Microphone opened: {} Hz, {} channels", sample_rate, channels);

        Ok(Box::new(CpalCaptureHandle {
            sample_rate,
            channels,
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        }))
    }
}

/// Handle to a cpal input stream running on its capture thread
struct CpalCaptureHandle {
    sample_rate: u32,
    channels: u16,
    stop_tx: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureHandle for CpalCaptureHandle {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            info!("Stopping microphone capture");
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Microphone thread panicked");
            }
        }
    }
}

impl Drop for CpalCaptureHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn start_input_stream(
    device_id: Option<&str>,
    sender: mpsc::Sender<Vec<f32>>,
) -> Result<(Stream, u32, u16), MediaAccessError> {
    let host = cpal::default_host();
    let device = find_input_device(&host, device_id).map_err(media_error)?;

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    info!("Using audio input device: {}", device_name);

    let supported = device
        .default_input_config()
        .map_err(|e| media_error(AudioError::DefaultConfigError(e)))?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.config();

    debug!(
        "Input config: {} Hz, {} channels, {:?}",
        config.sample_rate.0, config.channels, sample_format
    );

    let stream = match sample_format {
        SampleFormat::F32 => build_input::<f32>(&device, &config, sender),
        SampleFormat::I16 => build_input::<i16>(&device, &config, sender),
        SampleFormat::U16 => build_input::<u16>(&device, &config, sender),
        SampleFormat::I32 => build_input::<i32>(&device, &config, sender),
        other => {
            return Err(MediaAccessError::StreamFailed(format!(
                "unsupported input sample format {:?}",
                other
            )));
        }
    }
    .map_err(|e| match e {
        cpal::BuildStreamError::DeviceNotAvailable => {
            MediaAccessError::DeviceUnavailable(MICROPHONE)
        }
        other => MediaAccessError::StreamFailed(other.to_string()),
    })?;

    stream
        .play()
        .map_err(|e| MediaAccessError::StreamFailed(e.to_string()))?;

    Ok((stream, config.sample_rate.0, config.channels))
}

fn build_input<T>(
    device: &Device,
    config: &StreamConfig,
    sender: mpsc::Sender<Vec<f32>>,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: cpal::FromSample<T>,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let samples: Vec<f32> = data.iter().map(|s| s.to_sample::<f32>()).collect();
            // Never block the audio thread; a full channel drops this batch
            let _ = sender.try_send(samples);
        },
        move |err| {
            error!("Audio input stream error: {}", err);
        },
        None,
    )
}

fn media_error(err: AudioError) -> MediaAccessError {
    match err {
        AudioError::DeviceNotFound => MediaAccessError::DeviceNotFound(MICROPHONE),
        other => MediaAccessError::StreamFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_microphone_open_stop() {
        let (tx, mut rx) = mpsc::channel(100);

        let mut handle = match CpalMicrophone::default().open(tx) {
            Ok(handle) => handle,
            Err(e) => {
                eprintln!("Warning: No audio input available for testing: {}", e);
                return;
            }
        };

        assert!(handle.sample_rate() >= 8000 && handle.sample_rate() <= 192000);
        assert!(handle.channels() > 0);

        match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Some(data)) => println!("Received {} samples", data.len()),
            Ok(None) => eprintln!("Warning: Channel closed unexpectedly"),
            Err(_) => eprintln!("Warning: Timeout waiting for audio data"),
        }

        handle.stop();
        // Should be safe to call stop again
        handle.stop();
    }

    #[test]
    fn test_microphone_with_unknown_device() {
        let (tx, _rx) = mpsc::channel(1);
        let result = CpalMicrophone::new(Some("NonExistentDevice".to_string())).open(tx);

        assert!(matches!(
            result,
            Err(MediaAccessError::DeviceNotFound(_)) | Err(MediaAccessError::StreamFailed(_))
        ));
    }
}
