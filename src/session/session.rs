use super::config::SessionConfig;
use super::stats::SessionStats;
use super::transcript::{greeting_for, ChatSessionLog, Message, TranscriptAggregator};
use crate::audio::capture::{BlockChunker, CaptureSource, LevelMeter};
use crate::audio::playback::{PlaybackPipeline, PlaybackSink, WavFileSink};
use crate::audio::pcm;
use crate::live::{ClientFrame, LiveChannel, ServerEvent, SessionSetup};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Session lifecycle state.
///
/// Transitions are one-way: Idle -> Connecting -> Active -> Closed. Only the
/// Idle -> Connecting edge can begin a session; a start request while
/// connecting or active is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Closed,
}

impl SessionState {
    fn as_u8(self) -> u8 {
        match self {
            SessionState::Idle => 0,
            SessionState::Connecting => 1,
            SessionState::Active => 2,
            SessionState::Closed => 3,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionState::Idle,
            1 => SessionState::Connecting,
            2 => SessionState::Active,
            _ => SessionState::Closed,
        }
    }
}

/// A live tutoring session: capture forwarding, the bidirectional model
/// channel, playback scheduling, and transcript aggregation.
///
/// Cheap to clone; all clones share the same session.
#[derive(Clone)]
pub struct LiveSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    /// Session configuration
    config: SessionConfig,

    /// Channel to the live model endpoint
    channel: Arc<dyn LiveChannel>,

    /// Lifecycle state (SessionState as u8)
    state: AtomicU8,

    /// Generation counter, incremented on teardown. Spawned tasks capture
    /// the epoch at spawn and drop any late effect once it has moved on.
    epoch: AtomicU64,

    /// When the session started
    started_at: chrono::DateTime<chrono::Utc>,

    /// Output-clock origin for playback scheduling
    clock_origin: Instant,

    /// Accumulating transcript
    transcript: Mutex<TranscriptAggregator>,

    /// Playback scheduling and pending-source tracking
    playback: Mutex<PlaybackPipeline>,

    /// Shared history list receiving the snapshot at teardown
    history: Arc<Mutex<Vec<ChatSessionLog>>>,

    /// Input loudness meter
    meter: LevelMeter,

    /// Number of audio frames forwarded to the model
    frames_sent: AtomicUsize,

    /// Wakes the worker tasks at teardown
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,

    /// Handle for the capture-forwarding task
    capture_task: Mutex<Option<JoinHandle<()>>>,

    /// Handle for the event-consuming task
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl LiveSession {
    /// Create a new session around an already-connected channel.
    ///
    /// `history` is shared with the owner; the session pushes its transcript
    /// snapshot there at teardown.
    pub fn new(
        config: SessionConfig,
        channel: Arc<dyn LiveChannel>,
        history: Arc<Mutex<Vec<ChatSessionLog>>>,
    ) -> Result<Self> {
        let sink: Option<Box<dyn PlaybackSink>> = match &config.tutor_audio_path {
            Some(path) => Some(Box::new(
                WavFileSink::create(path.clone(), config.playback_sample_rate)
                    .context("Failed to open tutor-audio sink")?,
            )),
            None => None,
        };

        let playback = PlaybackPipeline::new(config.playback_sample_rate, sink);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            inner: Arc::new(SessionInner {
                config,
                channel,
                state: AtomicU8::new(SessionState::Idle.as_u8()),
                epoch: AtomicU64::new(0),
                started_at: Utc::now(),
                clock_origin: Instant::now(),
                transcript: Mutex::new(TranscriptAggregator::new()),
                playback: Mutex::new(playback),
                history,
                meter: LevelMeter::new(),
                frames_sent: AtomicUsize::new(0),
                shutdown_tx,
                shutdown_rx,
                capture_task: Mutex::new(None),
                event_task: Mutex::new(None),
            }),
        })
    }

    pub fn state(&self) -> SessionState {
        self.inner.state_now()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn input_level(&self) -> f32 {
        self.inner.meter.level()
    }

    /// Start the session: configure the channel, seed the greeting, and
    /// spawn the capture and event tasks.
    ///
    /// No-op if the session is already connecting or active. A capture
    /// acquisition or channel failure aborts the start (no retry) and
    /// leaves the session closed.
    pub async fn start(&self, mut source: Box<dyn CaptureSource>) -> Result<()> {
        let inner = &self.inner;

        if inner
            .state
            .compare_exchange(
                SessionState::Idle.as_u8(),
                SessionState::Connecting.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            warn!("Session {} already started", inner.config.session_id);
            return Ok(());
        }

        info!(
            "Starting live session {} (language={})",
            inner.config.session_id, inner.config.language
        );

        let setup = SessionSetup {
            session_id: inner.config.session_id.clone(),
            language: inner.config.language.clone(),
            voice: inner.config.voice.clone(),
            system_instruction: inner.config.system_instruction(),
            response_modality: "audio".to_string(),
            input_transcription: true,
            output_transcription: true,
        };

        if let Err(e) = inner.channel.send_setup(&setup).await {
            inner.mark_closed();
            return Err(e).context("Failed to configure live channel");
        }

        let events = match inner.channel.subscribe_events().await {
            Ok(rx) => rx,
            Err(e) => {
                inner.mark_closed();
                return Err(e).context("Failed to subscribe to live events");
            }
        };

        let frame_rx = match source.start().await {
            Ok(rx) => rx,
            Err(e) => {
                inner.mark_closed();
                return Err(e).context("Failed to acquire capture source");
            }
        };

        // Channel open: seed the greeting and go live.
        {
            let mut transcript = inner.transcript.lock().await;
            *transcript =
                TranscriptAggregator::with_greeting(greeting_for(&inner.config.language));
        }
        inner
            .state
            .store(SessionState::Active.as_u8(), Ordering::SeqCst);

        let epoch_at_start = inner.epoch.load(Ordering::SeqCst);

        // Capture-forwarding task: chunk, meter, PCM16-encode, send.
        let capture_inner = Arc::clone(inner);
        let mut shutdown = inner.shutdown_rx.clone();

        let capture_task = tokio::spawn(async move {
            info!("Capture task started");

            let mut frame_rx = frame_rx;
            let mut chunker = BlockChunker::new(capture_inner.config.block_size);
            let mut sequence: u32 = 0;

            loop {
                let frame = tokio::select! {
                    _ = shutdown.changed() => break,
                    maybe = frame_rx.recv() => match maybe {
                        Some(frame) => frame,
                        None => break,
                    },
                };

                if !capture_inner.epoch_is(epoch_at_start) {
                    break;
                }

                for block in chunker.push(&frame.samples) {
                    capture_inner.meter.update(&block);

                    let pcm_bytes = pcm::pcm16_to_bytes(&pcm::f32_to_pcm16(&block));
                    let client_frame = ClientFrame {
                        session_id: capture_inner.config.session_id.clone(),
                        sequence,
                        audio: pcm::encode_base64(&pcm_bytes),
                        sample_rate: capture_inner.config.capture_sample_rate,
                        channels: capture_inner.config.channels,
                        timestamp: Utc::now().to_rfc3339(),
                        final_frame: false,
                    };
                    sequence += 1;

                    if let Err(e) = capture_inner.channel.send_frame(&client_frame).await {
                        error!("Failed to forward audio frame: {}", e);
                        continue;
                    }

                    capture_inner.frames_sent.fetch_add(1, Ordering::SeqCst);
                }
            }

            info!("Capture task stopped");

            // Final frame marks end of input; best-effort if the channel
            // is already gone.
            let final_frame = ClientFrame {
                session_id: capture_inner.config.session_id.clone(),
                sequence,
                audio: String::new(),
                sample_rate: capture_inner.config.capture_sample_rate,
                channels: capture_inner.config.channels,
                timestamp: Utc::now().to_rfc3339(),
                final_frame: true,
            };
            if let Err(e) = capture_inner.channel.send_frame(&final_frame).await {
                debug!("Could not send final frame: {}", e);
            }

            if let Err(e) = source.stop().await {
                warn!("Failed to stop capture source: {}", e);
            }
        });

        {
            let mut handle = inner.capture_task.lock().await;
            *handle = Some(capture_task);
        }

        // Event-consuming task: playback, transcripts, turn commits,
        // interruptions. Remote close tears the session down.
        let event_inner = Arc::clone(inner);
        let mut shutdown = inner.shutdown_rx.clone();

        let event_task = tokio::spawn(async move {
            info!("Event task started");

            let mut events = events;
            let mut remote_close = false;

            loop {
                let event = tokio::select! {
                    _ = shutdown.changed() => break,
                    maybe = events.recv() => match maybe {
                        Some(event) => event,
                        None => {
                            remote_close = true;
                            break;
                        }
                    },
                };

                if !event_inner.epoch_is(epoch_at_start) {
                    break;
                }

                event_inner.handle_event(event, epoch_at_start).await;
            }

            info!("Event task stopped");

            if remote_close {
                info!("Live channel closed remotely");
                event_inner.teardown().await;
            }
        });

        {
            let mut handle = inner.event_task.lock().await;
            *handle = Some(event_task);
        }

        info!("Live session {} active", inner.config.session_id);

        Ok(())
    }

    /// Stop the session and wait for its tasks to finish.
    pub async fn stop(&self) -> SessionStats {
        if self.state() == SessionState::Closed {
            warn!("Session {} already closed", self.inner.config.session_id);
        } else {
            self.inner.teardown().await;
        }

        {
            let mut handle = self.inner.capture_task.lock().await;
            if let Some(task) = handle.take() {
                if let Err(e) = task.await {
                    error!("Capture task panicked: {}", e);
                }
            }
        }

        {
            let mut handle = self.inner.event_task.lock().await;
            if let Some(task) = handle.take() {
                if let Err(e) = task.await {
                    error!("Event task panicked: {}", e);
                }
            }
        }

        self.get_stats().await
    }

    /// Current session statistics
    pub async fn get_stats(&self) -> SessionStats {
        self.inner.get_stats().await
    }

    /// Committed transcript messages
    pub async fn transcript(&self) -> Vec<Message> {
        self.inner.transcript.lock().await.messages().to_vec()
    }

    /// Attach a translation to a committed message (at most once).
    pub async fn set_translation(&self, index: usize, translation: String) -> Result<()> {
        self.inner
            .transcript
            .lock()
            .await
            .set_translation(index, translation)
    }
}

impl SessionInner {
    fn state_now(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn mark_closed(&self) {
        self.state
            .store(SessionState::Closed.as_u8(), Ordering::SeqCst);
    }

    fn epoch_is(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    /// Apply one server event.
    ///
    /// The epoch is re-checked under each lock: teardown bumps the epoch
    /// before clearing playback and snapshotting the transcript, so a stale
    /// event can never mutate state after teardown has reset it.
    async fn handle_event(&self, event: ServerEvent, epoch: u64) {
        match event {
            ServerEvent::Audio { data } => match pcm::decode_base64(&data) {
                Ok(bytes) => {
                    let now = self.clock_origin.elapsed().as_secs_f64();
                    let mut playback = self.playback.lock().await;
                    if !self.epoch_is(epoch) {
                        return;
                    }
                    playback.reap(now);
                    if let Err(e) = playback.enqueue(&bytes, now).await {
                        warn!("Failed to schedule playback fragment: {}", e);
                    }
                }
                Err(e) => warn!("Malformed audio fragment: {}", e),
            },
            ServerEvent::InputTranscript { text } => {
                let mut transcript = self.transcript.lock().await;
                if self.epoch_is(epoch) {
                    transcript.push_input(&text);
                }
            }
            ServerEvent::OutputTranscript { text } => {
                let mut transcript = self.transcript.lock().await;
                if self.epoch_is(epoch) {
                    transcript.push_output(&text);
                }
            }
            ServerEvent::TurnComplete => {
                let mut transcript = self.transcript.lock().await;
                if self.epoch_is(epoch) {
                    let appended = transcript.commit_turn();
                    debug!("Turn complete, {} messages committed", appended);
                }
            }
            ServerEvent::Interrupted => {
                let mut playback = self.playback.lock().await;
                if self.epoch_is(epoch) {
                    playback.interrupt().await;
                }
            }
        }
    }

    /// Release everything. Idempotent; every step is best-effort and
    /// independently guarded, so teardown never fails its caller.
    ///
    /// Runs on explicit stop, remote close, and channel error alike.
    async fn teardown(&self) {
        let prev = self
            .state
            .swap(SessionState::Closed.as_u8(), Ordering::SeqCst);
        if prev == SessionState::Closed.as_u8() {
            return;
        }

        info!("Tearing down session {}", self.config.session_id);

        // Invalidate in-flight callbacks before touching shared state.
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(true);

        {
            let transcript = self.transcript.lock().await;
            if let Some(log) = transcript.snapshot(
                self.config.session_id.clone(),
                self.config.language.clone(),
            ) {
                let count = log.messages.len();
                self.history.lock().await.push(log);
                info!("Session log saved ({} messages)", count);
            }
        }

        if let Err(e) = self.channel.close().await {
            warn!("Failed to close live channel: {}", e);
        }

        self.playback.lock().await.interrupt().await;
        self.meter.reset();

        info!("Session {} closed", self.config.session_id);
    }

    async fn get_stats(&self) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);

        let messages = self.transcript.lock().await.len();
        let pending_playback = {
            let mut playback = self.playback.lock().await;
            playback.reap(self.clock_origin.elapsed().as_secs_f64());
            playback.pending()
        };

        SessionStats {
            state: self.state_now(),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            frames_sent: self.frames_sent.load(Ordering::SeqCst),
            messages,
            pending_playback,
            input_level: self.meter.level(),
        }
    }
}
