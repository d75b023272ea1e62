use crate::audio::codec::AudioFrame;
use crate::audio::error::AudioResult;
use crate::audio::AudioResampler;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Turns raw microphone batches into fixed-size mono blocks
///
/// This pipeline:
/// 1. Downmixes interleaved device samples to mono
/// 2. Resamples to the target rate (via AudioResampler) when the rates differ
/// 3. Accumulates exactly `block_size` samples per block
///
/// # Example
/// ```
/// use recyclens_lib::audio::InputPipeline;
///
/// let mut pipeline = InputPipeline::new(16000, 1, 16000, 4).unwrap();
/// let blocks = pipeline.process(&[0.1, 0.2, 0.3, 0.4, 0.5]).unwrap();
///
/// assert_eq!(blocks.len(), 1);
/// assert_eq!(blocks[0].samples(), &[0.1, 0.2, 0.3, 0.4]);
/// ```
pub struct InputPipeline {
    channels: usize,
    resampler: Option<AudioResampler>,
    resample_buffer: Vec<f32>,
    pending: Vec<f32>,
    block_size: usize,
    output_rate: u32,
}

impl InputPipeline {
    /// Create a pipeline for a device delivering `channels` interleaved
    /// channels at `input_rate`
    ///
    /// # Errors
    /// Returns error if the resampler cannot be created.
    pub fn new(
        input_rate: u32,
        channels: u16,
        output_rate: u32,
        block_size: usize,
    ) -> AudioResult<Self> {
        let resampler = if input_rate == output_rate {
            None
        } else {
            Some(AudioResampler::new(input_rate, output_rate)?)
        };

        info!(
            "Input pipeline: {} Hz x{} -> {} Hz mono, {} samples per block",
            input_rate, channels, output_rate, block_size
        );

        Ok(Self {
            channels: channels.max(1) as usize,
            resampler,
            resample_buffer: Vec::new(),
            pending: Vec::with_capacity(block_size * 2),
            block_size: block_size.max(1),
            output_rate,
        })
    }

    /// Feed one raw batch and return every block it completed
    pub fn process(&mut self, raw: &[f32]) -> AudioResult<Vec<AudioFrame>> {
        let mono = Self::downmix(raw, self.channels);

        let resampled = match self.resampler.as_mut() {
            Some(resampler) => resampler.process_buffered(&mono, &mut self.resample_buffer)?,
            None => mono,
        };
        self.pending.extend(resampled);

        let mut blocks = Vec::new();
        while self.pending.len() >= self.block_size {
            let block: Vec<f32> = self.pending.drain(..self.block_size).collect();
            blocks.push(AudioFrame::new(block, self.output_rate));
        }

        Ok(blocks)
    }

    /// Drive the pipeline from a channel of raw batches
    ///
    /// Calls `on_block` for each completed block and returns when the input
    /// channel closes or `on_block` returns `false`.
    pub async fn run<F>(mut self, mut input_rx: mpsc::Receiver<Vec<f32>>, mut on_block: F)
    where
        F: FnMut(AudioFrame) -> bool,
    {
        info!("Input pipeline started");
        let mut block_count = 0u64;

        while let Some(raw) = input_rx.recv().await {
            let blocks = match self.process(&raw) {
                Ok(blocks) => blocks,
                Err(e) => {
                    error!("Resampling error: {}", e);
                    continue;
                }
            };

            for block in blocks {
                block_count += 1;
                debug!("Input block #{} ready ({} samples)", block_count, block.len());
                if !on_block(block) {
                    info!("Input pipeline stopped by consumer after {} blocks", block_count);
                    return;
                }
            }
        }

        info!("Input pipeline finished: {} blocks, input channel closed", block_count);
    }

    /// Average interleaved channels into a mono signal
    fn downmix(raw: &[f32], channels: usize) -> Vec<f32> {
        if channels == 1 {
            return raw.to_vec();
        }
        raw.chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    }
}
