//! 播放缓冲区模块
//!
//! 在异步会话任务与扬声器回调线程之间传递样本的无锁环形缓冲区
//!
//! # 使用示例
//!
//! ```
//! use recyclens_lib::audio::buffer::AudioRingBuffer;
//!
//! // 0.5 秒 @ 48kHz
//! let (mut producer, mut consumer) = AudioRingBuffer::new(24000);
//!
//! producer.push_slice(&[0.5f32; 480]);
//!
//! let mut output = vec![0.0f32; 480];
//! assert_eq!(consumer.pop_slice(&mut output), 480);
//! ```

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapRb,
};

/// 音频环形缓冲区
pub struct AudioRingBuffer;

/// 写入端，由播放调度所在的任务持有
pub struct AudioBufferProducer {
    producer: ringbuf::HeapProd<f32>,
}

/// 读取端，由设备回调持有
pub struct AudioBufferConsumer {
    consumer: ringbuf::HeapCons<f32>,
}

impl AudioRingBuffer {
    /// 创建新的环形缓冲区
    ///
    /// # Returns
    ///
    /// 返回 (生产者, 消费者) 元组
    pub fn new(capacity: usize) -> (AudioBufferProducer, AudioBufferConsumer) {
        let rb = HeapRb::<f32>::new(capacity.max(1));
        let (producer, consumer) = rb.split();

        (
            AudioBufferProducer { producer },
            AudioBufferConsumer { consumer },
        )
    }

    /// 按时长创建缓冲区
    pub fn with_duration(sample_rate: u32, seconds: u32) -> (AudioBufferProducer, AudioBufferConsumer) {
        Self::new(sample_rate as usize * seconds as usize)
    }
}

impl AudioBufferProducer {
    /// 批量写入样本，返回实际写入的样本数
    pub fn push_slice(&mut self, samples: &[f32]) -> usize {
        self.producer.push_slice(samples)
    }

    /// 写入 `count` 个静音样本，返回实际写入数
    pub fn push_silence(&mut self, count: usize) -> usize {
        let count = count.min(self.available_space());
        let mut remaining = count;
        let zeros = [0.0f32; 256];
        while remaining > 0 {
            let n = remaining.min(zeros.len());
            self.producer.push_slice(&zeros[..n]);
            remaining -= n;
        }
        count
    }

    /// 获取可用写入空间
    pub fn available_space(&self) -> usize {
        self.producer.vacant_len()
    }
}

impl AudioBufferConsumer {
    /// 批量读取样本到切片，返回实际读取数
    pub fn pop_slice(&mut self, output: &mut [f32]) -> usize {
        self.consumer.pop_slice(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_creation() {
        let (producer, mut consumer) = AudioRingBuffer::new(1024);
        assert_eq!(producer.available_space(), 1024);

        let mut output = [0.0f32; 8];
        assert_eq!(consumer.pop_slice(&mut output), 0);
    }

    #[test]
    fn test_ring_buffer_slice_operations() {
        let (mut producer, mut consumer) = AudioRingBuffer::new(1024);

        let input: Vec<f32> = (0..100).map(|i| i as f32 * 0.01).collect();
        assert_eq!(producer.push_slice(&input), 100);

        let mut output = vec![0.0f32; 50];
        assert_eq!(consumer.pop_slice(&mut output), 50);

        for (i, sample) in output.iter().enumerate() {
            assert!((sample - i as f32 * 0.01).abs() < 0.0001);
        }
    }

    #[test]
    fn test_push_silence() {
        let (mut producer, mut consumer) = AudioRingBuffer::new(1000);

        producer.push_slice(&[0.5; 10]);
        assert_eq!(producer.push_silence(600), 600);
        assert_eq!(producer.available_space(), 390);

        let mut output = vec![1.0f32; 700];
        assert_eq!(consumer.pop_slice(&mut output), 610);
        let output = &output[..610];
        assert!(output[..10].iter().all(|&s| s == 0.5));
        assert!(output[10..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_push_silence_limited_by_space() {
        let (mut producer, _consumer) = AudioRingBuffer::new(100);

        assert_eq!(producer.push_silence(250), 100);
        assert_eq!(producer.available_space(), 0);
    }

    #[test]
    fn test_with_duration() {
        let (producer, _) = AudioRingBuffer::with_duration(48000, 2);
        assert_eq!(producer.available_space(), 96000);
    }

    #[test]
    fn test_space_recovered_after_pop() {
        let (mut producer, mut consumer) = AudioRingBuffer::new(100);

        producer.push_slice(&[0.5f32; 100]);
        assert_eq!(producer.available_space(), 0);

        let mut output = vec![0.0f32; 40];
        consumer.pop_slice(&mut output);

        assert_eq!(producer.available_space(), 40);
        assert_eq!(producer.push_slice(&[0.25f32; 60]), 40);
    }
}
