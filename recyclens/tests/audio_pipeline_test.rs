/// Integration tests for the microphone block pipeline
///
/// Runs the pipeline the way the session does: raw interleaved batches in,
/// fixed-size 16kHz blocks out, each encoded to a PCM wire payload.

use base64::{engine::general_purpose::STANDARD, Engine};
use recyclens_lib::audio::{encode, rms, AudioFrame, InputPipeline, INPUT_SAMPLE_RATE};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

const BLOCK: usize = 4096;

#[tokio::test]
async fn test_pipeline_produces_encoded_blocks() {
    println!("\n=== Pipeline Output Test ===");

    let (raw_tx, raw_rx) = mpsc::channel(64);
    let pipeline = InputPipeline::new(48000, 2, INPUT_SAMPLE_RATE, BLOCK).unwrap();

    // Two seconds of stereo input in 10ms callbacks
    let producer = tokio::spawn(async move {
        for _ in 0..200 {
            raw_tx.send(vec![0.25f32; 960]).await.unwrap();
        }
    });

    let mut blobs = Vec::new();
    timeout(
        Duration::from_secs(10),
        pipeline.run(raw_rx, |block| {
            blobs.push(encode(&block));
            true
        }),
    )
    .await
    .expect("pipeline should finish once the producer is done");
    producer.await.unwrap();

    println!("Blocks produced: {}", blobs.len());
    // ~32000 resampled samples make 7 full blocks
    assert!(blobs.len() >= 6 && blobs.len() <= 8, "got {}", blobs.len());

    for (i, blob) in blobs.iter().enumerate() {
        let pcm = STANDARD.decode(&blob.data).unwrap();
        println!("  Block {}: {} ({} bytes)", i + 1, blob.mime_type, pcm.len());

        assert_eq!(blob.mime_type, "audio/pcm;rate=16000");
        assert_eq!(pcm.len(), BLOCK * 2, "16-bit samples");
    }
    println!("✓ Every block is exactly {} samples", BLOCK);
}

#[tokio::test]
async fn test_block_level_follows_input() {
    println!("\n=== Pipeline Level Test ===");

    let (raw_tx, raw_rx) = mpsc::channel(8);
    let pipeline = InputPipeline::new(INPUT_SAMPLE_RATE, 1, INPUT_SAMPLE_RATE, 1600).unwrap();

    raw_tx.send(vec![0.5f32; 1600]).await.unwrap();
    raw_tx.send(vec![0.0f32; 1600]).await.unwrap();
    drop(raw_tx);

    let mut levels = Vec::new();
    pipeline
        .run(raw_rx, |block: AudioFrame| {
            levels.push(rms(block.samples()));
            true
        })
        .await;

    println!("Levels: {:?}", levels);
    assert_eq!(levels.len(), 2);
    assert!((levels[0] - 0.5).abs() < 1e-6);
    assert_eq!(levels[1], 0.0);
}

#[tokio::test]
async fn test_partial_block_is_not_sent() {
    println!("\n=== Pipeline Partial Block Test ===");

    let (raw_tx, raw_rx) = mpsc::channel(8);
    let pipeline = InputPipeline::new(INPUT_SAMPLE_RATE, 1, INPUT_SAMPLE_RATE, BLOCK).unwrap();

    raw_tx.send(vec![0.1f32; BLOCK - 1]).await.unwrap();
    drop(raw_tx);

    let mut blocks = 0;
    pipeline
        .run(raw_rx, |_| {
            blocks += 1;
            true
        })
        .await;

    assert_eq!(blocks, 0, "Leftover samples are discarded on close");
    println!("✓ No short block emitted");
}

#[test]
fn test_mono_passthrough_keeps_samples() {
    let mut pipeline = InputPipeline::new(INPUT_SAMPLE_RATE, 1, INPUT_SAMPLE_RATE, 4).unwrap();

    let blocks = pipeline.process(&[0.1, -0.2, 0.3, -0.4, 0.5]).unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].samples(), &[0.1, -0.2, 0.3, -0.4]);

    let blocks = pipeline.process(&[0.6, 0.7, 0.8]).unwrap();
    assert_eq!(blocks[0].samples(), &[0.5, 0.6, 0.7, 0.8]);
}
