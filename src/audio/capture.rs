use anyhow::Result;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::mpsc;

use super::pcm::{CAPTURE_BLOCK_SIZE, CAPTURE_SAMPLE_RATE};

/// A block of captured float samples, mono, in [-1, 1].
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    /// Raw float32 samples
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Configuration for a capture source
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Sample rate the source must deliver (the live model expects 16kHz)
    pub sample_rate: u32,
    /// Processing block size in samples
    pub block_size: usize,
    /// Channel capacity for the frame queue
    pub queue_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: CAPTURE_SAMPLE_RATE,
            block_size: CAPTURE_BLOCK_SIZE,
            queue_capacity: 64,
        }
    }
}

/// Audio capture source trait
///
/// Implementations:
/// - `PushSource`: frames pushed in by the HTTP layer (browser microphone)
/// - `ToneSource`: synthetic sine tone (demos, tests)
#[async_trait::async_trait]
pub trait CaptureSource: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive capture frames.
    /// Acquisition failure here aborts session start; there is no retry.
    async fn start(&mut self) -> Result<mpsc::Receiver<CaptureFrame>>;

    /// Stop capturing audio
    async fn stop(&mut self) -> Result<()>;

    /// Check if the source is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get source name for logging
    fn name(&self) -> &str;
}

/// Accumulates incoming samples and cuts them into fixed-size blocks.
///
/// The live model is fed whole blocks only; a trailing partial block stays
/// buffered until more samples arrive.
#[derive(Debug)]
pub struct BlockChunker {
    block_size: usize,
    pending: Vec<f32>,
}

impl BlockChunker {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            pending: Vec::with_capacity(block_size),
        }
    }

    /// Feed samples in, get zero or more complete blocks back.
    pub fn push(&mut self, samples: &[f32]) -> Vec<Vec<f32>> {
        self.pending.extend_from_slice(samples);

        let mut blocks = Vec::new();
        while self.pending.len() >= self.block_size {
            let rest = self.pending.split_off(self.block_size);
            blocks.push(std::mem::replace(&mut self.pending, rest));
        }

        blocks
    }

    /// Number of buffered samples not yet forming a full block.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Input loudness meter, shareable across tasks.
///
/// Stores a normalized loudness value (roughly 0 to 2) in an atomic so the
/// HTTP layer can poll it without locking the capture path.
#[derive(Debug, Default)]
pub struct LevelMeter {
    level_bits: AtomicU32,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the meter from a block of float samples.
    pub fn update(&self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }

        let mean_abs: f32 =
            samples.iter().map(|s| s.abs()).sum::<f32>() / samples.len() as f32;
        // Speech averages well below full scale; scale up so normal speaking
        // volume lands near 1.0, capped at 2.0.
        let level = (mean_abs * 4.0).min(2.0);

        self.level_bits.store(level.to_bits(), Ordering::Relaxed);
    }

    /// Current normalized loudness (0 to ~2).
    pub fn level(&self) -> f32 {
        f32::from_bits(self.level_bits.load(Ordering::Relaxed))
    }

    /// Reset to silence.
    pub fn reset(&self) {
        self.level_bits.store(0f32.to_bits(), Ordering::Relaxed);
    }
}

/// Capture source fed externally, one frame at a time.
///
/// `PushSource::new` hands back the source plus a `PushFeeder`; whoever holds
/// the feeder (the HTTP audio-push handler) delivers microphone blocks into
/// the session. Dropping the feeder ends the stream.
pub struct PushSource {
    config: CaptureConfig,
    frame_rx: Option<mpsc::Receiver<CaptureFrame>>,
    capturing: bool,
}

/// Sending half of a [`PushSource`].
#[derive(Clone)]
pub struct PushFeeder {
    frame_tx: mpsc::Sender<CaptureFrame>,
    sample_rate: u32,
    started_at: std::time::Instant,
}

impl PushSource {
    pub fn new(config: CaptureConfig) -> (Self, PushFeeder) {
        let (frame_tx, frame_rx) = mpsc::channel(config.queue_capacity);

        let feeder = PushFeeder {
            frame_tx,
            sample_rate: config.sample_rate,
            started_at: std::time::Instant::now(),
        };

        let source = Self {
            config,
            frame_rx: Some(frame_rx),
            capturing: false,
        };

        (source, feeder)
    }
}

impl PushFeeder {
    /// Deliver one block of float samples into the session.
    ///
    /// Returns an error once the session side has stopped consuming.
    pub async fn push(&self, samples: Vec<f32>) -> Result<()> {
        let frame = CaptureFrame {
            samples,
            sample_rate: self.sample_rate,
            timestamp_ms: self.started_at.elapsed().as_millis() as u64,
        };

        self.frame_tx
            .send(frame)
            .await
            .map_err(|_| anyhow::anyhow!("capture stream closed"))
    }
}

#[async_trait::async_trait]
impl CaptureSource for PushSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<CaptureFrame>> {
        let rx = self
            .frame_rx
            .take()
            .ok_or_else(|| anyhow::anyhow!("push source already started"))?;

        self.capturing = true;
        tracing::info!("Push capture source started ({}Hz)", self.config.sample_rate);

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "push"
    }
}

/// Synthetic sine-tone source for demos and tests.
pub struct ToneSource {
    config: CaptureConfig,
    /// Tone frequency in Hz
    pub frequency: f32,
    /// Total number of blocks to emit before ending the stream
    pub blocks: usize,
    task: Option<tokio::task::JoinHandle<()>>,
    capturing: bool,
}

impl ToneSource {
    pub fn new(config: CaptureConfig, frequency: f32, blocks: usize) -> Self {
        Self {
            config,
            frequency,
            blocks,
            task: None,
            capturing: false,
        }
    }
}

#[async_trait::async_trait]
impl CaptureSource for ToneSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<CaptureFrame>> {
        let (tx, rx) = mpsc::channel(self.config.queue_capacity);

        let sample_rate = self.config.sample_rate;
        let block_size = self.config.block_size;
        let frequency = self.frequency;
        let blocks = self.blocks;

        let task = tokio::spawn(async move {
            let block_duration =
                std::time::Duration::from_secs_f64(block_size as f64 / sample_rate as f64);

            for i in 0..blocks {
                let offset = i * block_size;
                let samples: Vec<f32> = (0..block_size)
                    .map(|n| {
                        let t = (offset + n) as f32 / sample_rate as f32;
                        (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.5
                    })
                    .collect();

                let frame = CaptureFrame {
                    samples,
                    sample_rate,
                    timestamp_ms: (offset as u64 * 1000) / sample_rate as u64,
                };

                if tx.send(frame).await.is_err() {
                    break;
                }

                tokio::time::sleep(block_duration).await;
            }
        });

        self.task = Some(task);
        self.capturing = true;

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing = false;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "tone"
    }
}
