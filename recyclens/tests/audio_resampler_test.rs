/// Integration tests for the mono resampler
///
/// Covers both directions the session uses: microphone audio down to the
/// 16kHz wire rate and model audio from 24kHz up to a typical speaker rate.

use recyclens_lib::audio::{AudioResampler, INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE};
use std::f32::consts::PI;

fn sine(frequency: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
    let total = (seconds * sample_rate as f32) as usize;
    (0..total)
        .map(|i| (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
        .collect()
}

fn resample_all(resampler: &mut AudioResampler, input: &[f32]) -> Vec<f32> {
    input
        .chunks_exact(resampler.chunk_size())
        .flat_map(|chunk| resampler.process(chunk).unwrap())
        .collect()
}

fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|v| v.abs()).fold(0.0f32, f32::max)
}

#[test]
fn test_microphone_48khz_to_wire_rate() {
    println!("\n=== Resampler Test: 48kHz -> 16kHz ===");

    let mut resampler = AudioResampler::new(48000, INPUT_SAMPLE_RATE).unwrap();
    println!("  Chunk size: {} samples", resampler.chunk_size());
    assert_eq!(resampler.chunk_size(), 480);

    let output = resample_all(&mut resampler, &sine(440.0, 48000, 1.0));
    println!("  Output samples: {}", output.len());
    println!("  Max amplitude: {:.4}", peak(&output));

    assert!(
        (output.len() as i32 - 16000).abs() < 1000,
        "Expected ~16000 output samples, got {}",
        output.len()
    );
    assert!(peak(&output) > 0.5 && peak(&output) <= 1.01);
}

#[test]
fn test_microphone_44khz_to_wire_rate() {
    println!("\n=== Resampler Test: 44.1kHz -> 16kHz ===");

    let mut resampler = AudioResampler::new(44100, INPUT_SAMPLE_RATE).unwrap();
    assert_eq!(resampler.chunk_size(), 441);

    let output = resample_all(&mut resampler, &sine(440.0, 44100, 1.0));
    println!("  Output samples: {}", output.len());

    assert!((output.len() as i32 - 16000).abs() < 1000);
}

#[test]
fn test_model_audio_to_speaker_rate() {
    println!("\n=== Resampler Test: 24kHz -> 48kHz ===");

    let mut resampler = AudioResampler::new(OUTPUT_SAMPLE_RATE, 48000).unwrap();

    let output = resample_all(&mut resampler, &sine(220.0, OUTPUT_SAMPLE_RATE, 1.0));
    println!("  Output samples: {}", output.len());
    println!("  Max amplitude: {:.4}", peak(&output));

    assert!((output.len() as i32 - 48000).abs() < 2000);
    assert!(peak(&output) > 0.5);
}

#[test]
fn test_buffered_stream_of_odd_batches() {
    println!("\n=== Resampler Buffered Stream Test ===");

    let mut resampler = AudioResampler::new(48000, INPUT_SAMPLE_RATE).unwrap();
    let mut pending = Vec::new();
    let input = sine(440.0, 48000, 1.0);

    // cpal callbacks rarely line up with the 10ms chunk size
    let mut output = Vec::new();
    for batch in input.chunks(777) {
        output.extend(resampler.process_buffered(batch, &mut pending).unwrap());
        assert!(pending.len() < resampler.chunk_size());
    }

    println!("  Output samples: {}, leftover: {}", output.len(), pending.len());
    assert!((output.len() as i32 - 16000).abs() < 1000);
}

#[test]
fn test_reset_between_sessions() {
    println!("\n=== Resampler Reset Test ===");

    let mut resampler = AudioResampler::new(48000, INPUT_SAMPLE_RATE).unwrap();
    let chunk = vec![0.5f32; resampler.chunk_size()];

    let first = resampler.process(&chunk).unwrap();
    resampler.reset();
    let second = resampler.process(&chunk).unwrap();

    println!("  First: {} samples, after reset: {} samples", first.len(), second.len());
    assert_eq!(first.len(), second.len());
}

#[test]
fn test_invalid_rates_rejected() {
    assert!(AudioResampler::new(0, INPUT_SAMPLE_RATE).is_err());
    assert!(AudioResampler::new(48000, 0).is_err());
}
