use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{debug, warn};

use super::pcm;

/// Identifier for a scheduled playback source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

/// A decoded, playable audio buffer (mono float samples).
#[derive(Debug, Clone)]
pub struct PlaybackBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl PlaybackBuffer {
    /// Decode raw PCM16 mono bytes at the given sample rate.
    pub fn from_pcm16_bytes(bytes: &[u8], sample_rate: u32) -> Result<Self> {
        let pcm = pcm::bytes_to_pcm16(bytes).context("Failed to decode playback fragment")?;

        Ok(Self {
            samples: pcm::pcm16_to_f32(&pcm),
            sample_rate,
        })
    }

    pub fn duration_secs(&self) -> f64 {
        pcm::duration_secs(self.samples.len(), self.sample_rate)
    }
}

/// Monotonic next-start cursor on the output clock.
///
/// Invariant: each buffer is scheduled at max(cursor, now) and the cursor
/// advances by the buffer's duration, so scheduled buffers are sequential
/// and gap-free absent interruption.
#[derive(Debug, Default)]
pub struct PlaybackClock {
    cursor: f64,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a slot for a buffer of `duration` seconds, given the current
    /// output time. Returns the start time.
    pub fn schedule(&mut self, now: f64, duration: f64) -> f64 {
        let start = self.cursor.max(now);
        self.cursor = start + duration;
        start
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn reset(&mut self) {
        self.cursor = 0.0;
    }
}

/// A buffer that has been scheduled but not yet reported finished.
#[derive(Debug, Clone)]
pub struct ScheduledSource {
    pub start_time: f64,
    pub duration: f64,
}

/// The set of scheduled-but-unfinished playback sources.
///
/// Exists only so an interruption can cancel everything still pending;
/// sources remove themselves on completion.
#[derive(Debug, Default)]
pub struct ActiveSourceSet {
    next_id: u64,
    sources: HashMap<SourceId, ScheduledSource>,
}

impl ActiveSourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: ScheduledSource) -> SourceId {
        let id = SourceId(self.next_id);
        self.next_id += 1;
        self.sources.insert(id, source);
        id
    }

    /// Remove a finished source. Returns false if it was already gone
    /// (e.g. cleared by an interruption).
    pub fn complete(&mut self, id: SourceId) -> bool {
        self.sources.remove(&id).is_some()
    }

    /// Remove and return everything still pending.
    pub fn drain(&mut self) -> Vec<ScheduledSource> {
        self.sources.drain().map(|(_, s)| s).collect()
    }

    /// Drop sources whose scheduled window has fully elapsed.
    pub fn reap(&mut self, now: f64) -> usize {
        let before = self.sources.len();
        self.sources
            .retain(|_, s| s.start_time + s.duration > now);
        before - self.sources.len()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Output destination for scheduled buffers.
#[async_trait::async_trait]
pub trait PlaybackSink: Send + Sync {
    /// Deliver one buffer with its scheduled start time.
    async fn play(&mut self, buffer: &PlaybackBuffer, start_time: f64) -> Result<()>;

    /// Abandon anything not yet played.
    async fn cancel_all(&mut self) -> Result<()>;
}

/// Playback pipeline: decode fragments, schedule them on the clock, track
/// pending sources, and support mid-stream interruption.
pub struct PlaybackPipeline {
    clock: PlaybackClock,
    sources: ActiveSourceSet,
    sink: Option<Box<dyn PlaybackSink>>,
    sample_rate: u32,
}

impl PlaybackPipeline {
    pub fn new(sample_rate: u32, sink: Option<Box<dyn PlaybackSink>>) -> Self {
        Self {
            clock: PlaybackClock::new(),
            sources: ActiveSourceSet::new(),
            sink,
            sample_rate,
        }
    }

    /// Decode one PCM16 fragment and schedule it at the clock cursor.
    ///
    /// `now` is the current output time in seconds since session start.
    /// Fragments play back in arrival order, strictly sequentially.
    pub async fn enqueue(&mut self, pcm_bytes: &[u8], now: f64) -> Result<SourceId> {
        let buffer = PlaybackBuffer::from_pcm16_bytes(pcm_bytes, self.sample_rate)?;
        let duration = buffer.duration_secs();
        let start_time = self.clock.schedule(now, duration);

        let id = self.sources.insert(ScheduledSource {
            start_time,
            duration,
        });

        debug!(
            "Scheduled playback fragment: start={:.3}s dur={:.3}s pending={}",
            start_time,
            duration,
            self.sources.len()
        );

        if let Some(sink) = &mut self.sink {
            sink.play(&buffer, start_time)
                .await
                .context("Playback sink rejected buffer")?;
        }

        Ok(id)
    }

    /// Mark one source as finished playing.
    pub fn complete(&mut self, id: SourceId) {
        self.sources.complete(id);
    }

    /// Auto-removal: drop sources whose playback window has elapsed.
    pub fn reap(&mut self, now: f64) -> usize {
        self.sources.reap(now)
    }

    /// Interruption: stop and discard every pending source and reset the
    /// clock to zero, as one logical step.
    pub async fn interrupt(&mut self) {
        let dropped = self.sources.drain();
        self.clock.reset();

        if let Some(sink) = &mut self.sink {
            if let Err(e) = sink.cancel_all().await {
                warn!("Playback sink cancel failed: {}", e);
            }
        }

        if !dropped.is_empty() {
            debug!("Interrupted playback, dropped {} pending sources", dropped.len());
        }
    }

    pub fn cursor(&self) -> f64 {
        self.clock.cursor()
    }

    pub fn pending(&self) -> usize {
        self.sources.len()
    }
}

/// Writes scheduled buffers to a mono WAV file.
///
/// Fragments are appended back-to-back in arrival order; the file is an
/// archive of tutor speech, not a timeline reconstruction.
pub struct WavFileSink {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    path: PathBuf,
}

impl WavFileSink {
    pub fn create(path: PathBuf, sample_rate: u32) -> Result<Self> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", path))?;

        Ok(Self {
            writer: Some(writer),
            path,
        })
    }
}

#[async_trait::async_trait]
impl PlaybackSink for WavFileSink {
    async fn play(&mut self, buffer: &PlaybackBuffer, _start_time: f64) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            for &sample in &pcm::f32_to_pcm16(&buffer.samples) {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }
        }

        Ok(())
    }

    async fn cancel_all(&mut self) -> Result<()> {
        // Already-written audio stays in the archive; nothing is buffered.
        Ok(())
    }
}

impl Drop for WavFileSink {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize WAV sink {:?}: {}", self.path, e);
            }
        }
    }
}
