/// Loudness metering for the input and output activity indicators

/// Maximum number of points visited when metering a decoded output buffer
pub const OUTPUT_METER_POINTS: usize = 100;

/// Gain applied by `display_level` before clamping
const DISPLAY_GAIN: f32 = 5.0;

/// Root-mean-square level of a whole block
///
/// Returns 0.0 for an empty block. The result is not clamped; a block of
/// constant amplitude `a` yields `|a|`.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Root-mean-square level over at most `max_points` evenly strided samples
///
/// Used for decoded output buffers where the indicator only needs a rough
/// level and the full buffer can be tens of thousands of samples.
pub fn strided_rms(samples: &[f32], max_points: usize) -> f32 {
    if samples.is_empty() || max_points == 0 {
        return 0.0;
    }

    let step = (samples.len() / max_points).max(1);
    let mut sum = 0.0f32;
    let mut count = 0usize;

    for sample in samples.iter().step_by(step) {
        sum += sample * sample;
        count += 1;
    }

    (sum / count as f32).sqrt()
}

/// Scale a raw level into [0.0, 1.0] for meter rendering
pub fn display_level(level: f32) -> f32 {
    (level * DISPLAY_GAIN).clamp(0.0, 1.0)
}
