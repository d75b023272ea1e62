/// Integration tests for microphone capture
///
/// These tests open the real default input device. Machines without audio
/// hardware print a warning and skip.

use recyclens_lib::audio::{CaptureHandle, CpalMicrophone, Microphone};
use std::time::Duration;
use tokio::sync::mpsc;

fn open_default(tx: mpsc::Sender<Vec<f32>>) -> Option<Box<dyn CaptureHandle>> {
    match CpalMicrophone::default().open(tx) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("Warning: Could not open microphone: {}", e);
            eprintln!("This may be expected in CI environments without audio hardware");
            None
        }
    }
}

#[tokio::test]
async fn test_microphone_delivers_samples() {
    let (tx, mut rx) = mpsc::channel(100);
    let Some(mut handle) = open_default(tx) else {
        return;
    };

    println!("\n=== Microphone Capture Test ===");
    println!("Sample rate: {} Hz", handle.sample_rate());
    println!("Channels: {}", handle.channels());
    assert!(handle.sample_rate() > 0);
    assert!(handle.channels() > 0);

    let mut batches = 0;
    let mut total_samples = 0;
    while batches < 10 {
        match tokio::time::timeout(Duration::from_millis(500), rx.recv()).await {
            Ok(Some(data)) => {
                batches += 1;
                total_samples += data.len();
                let peak = data.iter().map(|v| v.abs()).fold(0.0f32, f32::max);
                println!("Batch {}: {} samples, peak {:.4}", batches, data.len(), peak);
                assert!(!data.is_empty());
                assert!(peak <= 1.0, "Samples should be normalized");
            }
            Ok(None) => break,
            Err(_) => {
                println!("Timeout waiting for data");
                break;
            }
        }
    }

    println!("Received {} batches, {} samples", batches, total_samples);
    handle.stop();
    assert!(batches > 0, "Should have received at least some audio data");
    println!("✓ Microphone stopped");
}

#[tokio::test]
async fn test_microphone_survives_full_channel() {
    // Small channel the test does not drain
    let (tx, mut rx) = mpsc::channel(5);
    let Some(mut handle) = open_default(tx) else {
        return;
    };

    println!("\n=== Microphone Channel Overflow Test ===");
    tokio::time::sleep(Duration::from_millis(500)).await;

    let mut count = 0;
    while let Ok(Some(_)) = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
        count += 1;
        if count >= 5 {
            break;
        }
    }
    println!("Received {} batches after overflow", count);
    assert!(count > 0, "Capture should keep delivering after overflow");

    handle.stop();
}

#[tokio::test]
async fn test_stop_is_idempotent_and_closes_channel() {
    let (tx, mut rx) = mpsc::channel(10);
    let Some(mut handle) = open_default(tx) else {
        return;
    };

    println!("\n=== Microphone Stop Test ===");
    handle.stop();
    handle.stop();

    // The capture thread owned the only sender
    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        while rx.recv().await.is_some() {}
    })
    .await;
    assert!(closed.is_ok(), "Channel should close after stop");
    println!("✓ Stop released the device and the channel");
}

#[tokio::test]
async fn test_reopen_after_stop() {
    println!("\n=== Microphone Reopen Test ===");

    for i in 1..=3 {
        let (tx, mut rx) = mpsc::channel(10);
        let Some(mut handle) = open_default(tx) else {
            return;
        };

        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await;
        println!("Iteration {}: data received = {}", i, matches!(received, Ok(Some(_))));

        handle.stop();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    println!("✓ All iterations completed");
}

#[test]
fn test_unknown_device_is_reported() {
    let (tx, _rx) = mpsc::channel(1);
    let result = CpalMicrophone::new(Some("NonExistentDevice_12345".to_string())).open(tx);

    assert!(result.is_err(), "Unknown device should not open");
    if let Err(e) = result {
        println!("Expected error: {}", e);
    }
}
