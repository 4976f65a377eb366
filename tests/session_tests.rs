// Integration tests for the live session: lifecycle transitions, transcript
// commits driven by channel events, interruption, idempotent teardown, and
// the history snapshot.

use anyhow::Result;
use async_trait::async_trait;
use lingua_live::audio::capture::{CaptureConfig, CaptureSource, PushSource};
use lingua_live::audio::pcm;
use lingua_live::live::{ClientFrame, LiveChannel, ServerEvent, SessionSetup};
use lingua_live::session::{
    ChatSessionLog, LiveSession, MessageRole, SessionConfig, SessionState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// In-process double for the live model channel.
#[derive(Default)]
struct MockChannel {
    setups: StdMutex<Vec<SessionSetup>>,
    frames: StdMutex<Vec<ClientFrame>>,
    event_tx: StdMutex<Option<mpsc::Sender<ServerEvent>>>,
    closes: AtomicUsize,
}

impl MockChannel {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn push_event(&self, event: ServerEvent) {
        let tx = self.event_tx.lock().unwrap().clone();
        if let Some(tx) = tx {
            let _ = tx.send(event).await;
        }
    }

    /// Simulate the remote side closing the stream.
    fn drop_events(&self) {
        self.event_tx.lock().unwrap().take();
    }

    fn frames_sent(&self) -> Vec<ClientFrame> {
        self.frames.lock().unwrap().clone()
    }

    fn setups_sent(&self) -> usize {
        self.setups.lock().unwrap().len()
    }

    fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LiveChannel for MockChannel {
    async fn send_setup(&self, setup: &SessionSetup) -> Result<()> {
        self.setups.lock().unwrap().push(setup.clone());
        Ok(())
    }

    async fn send_frame(&self, frame: &ClientFrame) -> Result<()> {
        self.frames.lock().unwrap().push(frame.clone());
        Ok(())
    }

    async fn subscribe_events(&self) -> Result<mpsc::Receiver<ServerEvent>> {
        let (tx, rx) = mpsc::channel(64);
        *self.event_tx.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.event_tx.lock().unwrap().take();
        Ok(())
    }
}

/// Capture source whose acquisition always fails.
struct FailingSource;

#[async_trait]
impl CaptureSource for FailingSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<lingua_live::CaptureFrame>> {
        anyhow::bail!("microphone permission denied")
    }

    async fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "failing"
    }
}

fn test_config() -> SessionConfig {
    SessionConfig {
        session_id: "test-session".to_string(),
        language: "spanish".to_string(),
        block_size: 8,
        ..SessionConfig::default()
    }
}

type History = Arc<Mutex<Vec<ChatSessionLog>>>;

fn build_session(
    channel: Arc<MockChannel>,
) -> (Arc<LiveSession>, Arc<MockChannel>, History) {
    let history: History = Arc::new(Mutex::new(Vec::new()));
    let session = Arc::new(
        LiveSession::new(test_config(), channel.clone(), Arc::clone(&history)).unwrap(),
    );
    (session, channel, history)
}

fn push_source() -> (PushSource, lingua_live::PushFeeder) {
    PushSource::new(CaptureConfig {
        block_size: 8,
        ..CaptureConfig::default()
    })
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_start_seeds_greeting_and_goes_active() {
    let (session, channel, _history) = build_session(MockChannel::new());
    let (source, _feeder) = push_source();

    session.start(Box::new(source)).await.unwrap();

    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(channel.setups_sent(), 1);

    let transcript = session.transcript().await;
    assert_eq!(transcript.len(), 1, "Greeting should seed the transcript");
    assert_eq!(transcript[0].role, MessageRole::Tutor);

    session.stop().await;
}

#[tokio::test]
async fn test_start_while_active_is_a_noop() {
    let (session, channel, _history) = build_session(MockChannel::new());
    let (source, _feeder) = push_source();
    session.start(Box::new(source)).await.unwrap();

    let (second_source, _second_feeder) = push_source();
    session.start(Box::new(second_source)).await.unwrap();

    assert_eq!(session.state(), SessionState::Active);
    assert_eq!(channel.setups_sent(), 1, "Setup must not be sent twice");

    session.stop().await;
}

#[tokio::test]
async fn test_failed_capture_acquisition_aborts_start() {
    let (session, channel, _history) = build_session(MockChannel::new());

    let result = session.start(Box::new(FailingSource)).await;

    assert!(result.is_err());
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(channel.setups_sent(), 1);
}

#[tokio::test]
async fn test_turn_complete_commits_user_then_tutor() {
    let (session, channel, _history) = build_session(MockChannel::new());
    let (source, _feeder) = push_source();
    session.start(Box::new(source)).await.unwrap();

    channel
        .push_event(ServerEvent::InputTranscript {
            text: "Hello".to_string(),
        })
        .await;
    channel
        .push_event(ServerEvent::OutputTranscript {
            text: "¡Hola!".to_string(),
        })
        .await;
    channel.push_event(ServerEvent::TurnComplete).await;
    settle().await;

    let transcript = session.transcript().await;
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[1].role, MessageRole::User);
    assert_eq!(transcript[1].text, "Hello");
    assert_eq!(transcript[2].role, MessageRole::Tutor);
    assert_eq!(transcript[2].text, "¡Hola!");

    session.stop().await;
}

#[tokio::test]
async fn test_turn_complete_without_fragments_commits_nothing() {
    let (session, channel, _history) = build_session(MockChannel::new());
    let (source, _feeder) = push_source();
    session.start(Box::new(source)).await.unwrap();

    channel.push_event(ServerEvent::TurnComplete).await;
    settle().await;

    assert_eq!(session.transcript().await.len(), 1, "Only the greeting");

    session.stop().await;
}

#[tokio::test]
async fn test_capture_blocks_are_forwarded_as_frames() {
    let (session, channel, _history) = build_session(MockChannel::new());
    let (source, feeder) = push_source();
    session.start(Box::new(source)).await.unwrap();

    // Two blocks' worth of samples at block_size 8
    feeder.push(vec![0.25f32; 16]).await.unwrap();
    settle().await;

    let frames = channel.frames_sent();
    assert_eq!(frames.len(), 2);
    assert!(!frames[0].audio.is_empty());
    assert!(!frames[0].final_frame);
    assert_eq!(frames[0].sample_rate, pcm::CAPTURE_SAMPLE_RATE);
    assert_eq!(frames[0].sequence, 0);
    assert_eq!(frames[1].sequence, 1);

    assert!(session.input_level() > 0.0, "Meter should see the audio");

    session.stop().await;

    let frames = channel.frames_sent();
    let last = frames.last().unwrap();
    assert!(last.final_frame, "Stop must flush a final frame");
    assert!(last.audio.is_empty());
}

#[tokio::test]
async fn test_audio_events_schedule_playback_and_interrupt_clears_it() {
    let (session, channel, _history) = build_session(MockChannel::new());
    let (source, _feeder) = push_source();
    session.start(Box::new(source)).await.unwrap();

    // Two one-second fragments at 24kHz, long enough not to elapse mid-test
    let fragment = pcm::encode_base64(&pcm::pcm16_to_bytes(&vec![500i16; 24000]));
    for _ in 0..2 {
        channel
            .push_event(ServerEvent::Audio {
                data: fragment.clone(),
            })
            .await;
    }
    settle().await;

    assert_eq!(session.get_stats().await.pending_playback, 2);

    channel.push_event(ServerEvent::Interrupted).await;
    settle().await;

    assert_eq!(session.get_stats().await.pending_playback, 0);

    session.stop().await;
}

#[tokio::test]
async fn test_audio_arriving_during_stop_leaves_no_pending_playback() {
    // Race audio events against stop across many iterations; however the
    // interleaving falls, a fragment must never stay scheduled after
    // teardown has cleared the playback pipeline.
    for _ in 0..25 {
        let (session, channel, _history) = build_session(MockChannel::new());
        let (source, _feeder) = push_source();
        session.start(Box::new(source)).await.unwrap();

        // One-second fragments so lazy reaping cannot mask a stale enqueue
        let fragment = pcm::encode_base64(&pcm::pcm16_to_bytes(&vec![500i16; 24000]));
        let pusher = {
            let channel = Arc::clone(&channel);
            let fragment = fragment.clone();
            tokio::spawn(async move {
                for _ in 0..8 {
                    channel
                        .push_event(ServerEvent::Audio {
                            data: fragment.clone(),
                        })
                        .await;
                }
            })
        };

        let stats = session.stop().await;
        pusher.await.unwrap();

        assert_eq!(stats.state, SessionState::Closed);
        assert_eq!(
            session.get_stats().await.pending_playback,
            0,
            "No fragment may outlive teardown"
        );
    }
}

#[tokio::test]
async fn test_stop_snapshots_history_once() {
    let (session, channel, history) = build_session(MockChannel::new());
    let (source, _feeder) = push_source();
    session.start(Box::new(source)).await.unwrap();

    channel
        .push_event(ServerEvent::InputTranscript {
            text: "Buenos días".to_string(),
        })
        .await;
    channel.push_event(ServerEvent::TurnComplete).await;
    settle().await;

    let stats = session.stop().await;
    assert_eq!(stats.state, SessionState::Closed);

    let logs = history.lock().await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].language, "spanish");
    assert_eq!(logs[0].messages.len(), 2);
}

#[tokio::test]
async fn test_double_stop_has_no_extra_side_effects() {
    let (session, channel, history) = build_session(MockChannel::new());
    let (source, _feeder) = push_source();
    session.start(Box::new(source)).await.unwrap();

    channel
        .push_event(ServerEvent::InputTranscript {
            text: "Hola".to_string(),
        })
        .await;
    channel.push_event(ServerEvent::TurnComplete).await;
    settle().await;

    session.stop().await;
    let stats = session.stop().await;

    assert_eq!(stats.state, SessionState::Closed);
    assert_eq!(stats.pending_playback, 0);
    assert_eq!(channel.close_count(), 1, "Channel must be closed exactly once");
    assert_eq!(history.lock().await.len(), 1, "Only one snapshot");
}

#[tokio::test]
async fn test_greeting_only_session_saves_no_log() {
    let (session, _channel, history) = build_session(MockChannel::new());
    let (source, _feeder) = push_source();
    session.start(Box::new(source)).await.unwrap();

    session.stop().await;

    assert!(history.lock().await.is_empty());
}

#[tokio::test]
async fn test_remote_close_tears_down() {
    let (session, channel, history) = build_session(MockChannel::new());
    let (source, _feeder) = push_source();
    session.start(Box::new(source)).await.unwrap();

    channel
        .push_event(ServerEvent::InputTranscript {
            text: "Adiós".to_string(),
        })
        .await;
    channel.push_event(ServerEvent::TurnComplete).await;
    settle().await;

    channel.drop_events();
    settle().await;

    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(history.lock().await.len(), 1);

    // Explicit stop afterwards stays safe
    session.stop().await;
    assert_eq!(history.lock().await.len(), 1);
}

#[tokio::test]
async fn test_events_after_stop_leave_transcript_untouched() {
    let (session, channel, _history) = build_session(MockChannel::new());
    let (source, _feeder) = push_source();
    session.start(Box::new(source)).await.unwrap();

    session.stop().await;
    let before = session.transcript().await.len();

    channel
        .push_event(ServerEvent::InputTranscript {
            text: "late arrival".to_string(),
        })
        .await;
    channel.push_event(ServerEvent::TurnComplete).await;
    settle().await;

    assert_eq!(session.transcript().await.len(), before);
}

#[tokio::test]
async fn test_set_translation_once() {
    let (session, channel, _history) = build_session(MockChannel::new());
    let (source, _feeder) = push_source();
    session.start(Box::new(source)).await.unwrap();

    channel
        .push_event(ServerEvent::OutputTranscript {
            text: "Hasta luego".to_string(),
        })
        .await;
    channel.push_event(ServerEvent::TurnComplete).await;
    settle().await;

    session
        .set_translation(1, "See you later".to_string())
        .await
        .unwrap();
    assert!(session
        .set_translation(1, "Goodbye".to_string())
        .await
        .is_err());

    let transcript = session.transcript().await;
    assert_eq!(transcript[1].translation.as_deref(), Some("See you later"));

    session.stop().await;
}
