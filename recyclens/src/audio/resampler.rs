use crate::audio::error::{AudioError, AudioResult};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::{debug, info};

/// Mono sample-rate converter
///
/// Wraps a rubato Sinc resampler that consumes fixed 10ms chunks. Used
/// twice per session: microphone audio from the device rate down to the
/// 16kHz wire rate, and model audio from 24kHz up to the speaker rate.
pub struct AudioResampler {
    resampler: SincFixedIn<f32>,
    input_buffer: Vec<Vec<f32>>,
    output_buffer: Vec<Vec<f32>>,
    chunk_size: usize,
}

impl AudioResampler {
    /// Create a new mono resampler
    ///
    /// # Errors
    /// Returns `AudioError::ResampleFailed` if either rate is zero or the
    /// resampler cannot be created.
    ///
    /// # Example
    /// ```no_run
    /// use recyclens_lib::audio::resampler::AudioResampler;
    ///
    /// // Microphone at 48kHz down to the 16kHz wire rate
    /// let resampler = AudioResampler::new(48000, 16000).unwrap();
    /// assert_eq!(resampler.chunk_size(), 480);
    /// ```
    pub fn new(input_rate: u32, output_rate: u32) -> AudioResult<Self> {
        if input_rate == 0 || output_rate == 0 {
            return Err(AudioError::ResampleFailed(format!(
                "Invalid rates: {} Hz -> {} Hz",
                input_rate, output_rate
            )));
        }

        info!("Creating resampler: {} Hz -> {} Hz", input_rate, output_rate);

        let ratio = output_rate as f64 / input_rate as f64;
        debug!("Resample ratio: {:.6}", ratio);

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        // 10ms worth of input samples per chunk
        let chunk_size = ((input_rate / 100) as usize).max(1);

        let resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, 1)
            .map_err(|e| AudioError::ResampleFailed(format!("Failed to create resampler: {}", e)))?;

        let input_buffer = resampler.input_buffer_allocate(true);
        let output_buffer = resampler.output_buffer_allocate(true);

        Ok(Self {
            resampler,
            input_buffer,
            output_buffer,
            chunk_size,
        })
    }

    /// Resample exactly one chunk of `chunk_size` samples
    ///
    /// # Errors
    /// Returns `AudioError::ResampleFailed` on a size mismatch or if rubato fails.
    pub fn process(&mut self, input: &[f32]) -> AudioResult<Vec<f32>> {
        if input.len() != self.chunk_size {
            return Err(AudioError::ResampleFailed(format!(
                "Input size mismatch: expected {} samples, got {}",
                self.chunk_size,
                input.len()
            )));
        }

        self.input_buffer[0].copy_from_slice(input);

        let (_input_frames_used, output_frames_generated) = self
            .resampler
            .process_into_buffer(&self.input_buffer, &mut self.output_buffer, None)
            .map_err(|e| AudioError::ResampleFailed(format!("Resampling failed: {}", e)))?;

        Ok(self.output_buffer[0][..output_frames_generated].to_vec())
    }

    /// Resample an input of any length
    ///
    /// Samples that do not fill a whole chunk stay in `buffer` and are
    /// picked up by the next call.
    pub fn process_buffered(
        &mut self,
        input: &[f32],
        buffer: &mut Vec<f32>,
    ) -> AudioResult<Vec<f32>> {
        buffer.extend_from_slice(input);

        let mut output = Vec::new();
        while buffer.len() >= self.chunk_size {
            let chunk: Vec<f32> = buffer.drain(..self.chunk_size).collect();
            output.extend(self.process(&chunk)?);
        }

        Ok(output)
    }

    /// Clear the filter state so the next chunk starts a fresh stream
    pub fn reset(&mut self) {
        debug!("Resetting resampler");
        self.resampler.reset();
    }

    /// Number of input samples per `process` call
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}
