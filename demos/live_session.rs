// Run a live tutoring session end to end against a local NATS server,
// feeding a synthetic tone as microphone input.
//
// Usage: cargo run --example live_session
//
// Requires NATS at nats://localhost:4222 and a model gateway consuming
// tutor.audio.session-* subjects (events simply won't arrive without one,
// but capture forwarding and teardown can still be observed in the logs).

use anyhow::Result;
use lingua_live::audio::capture::{CaptureConfig, ToneSource};
use lingua_live::live::NatsLiveChannel;
use lingua_live::session::{LiveSession, SessionConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = SessionConfig {
        language: "french".to_string(),
        ..SessionConfig::default()
    };

    info!("Opening live channel for session {}", config.session_id);
    let channel = Arc::new(
        NatsLiveChannel::connect("nats://localhost:4222", config.session_id.clone()).await?,
    );

    let history = Arc::new(Mutex::new(Vec::new()));
    let session = Arc::new(LiveSession::new(config, channel, Arc::clone(&history))?);

    // 440Hz tone, forty blocks (~10s of audio at 16kHz/4096)
    let source = ToneSource::new(CaptureConfig::default(), 440.0, 40);
    session.start(Box::new(source)).await?;

    for _ in 0..10 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let stats = session.get_stats().await;
        info!(
            "state={:?} frames_sent={} messages={} level={:.2}",
            stats.state, stats.frames_sent, stats.messages, stats.input_level
        );
    }

    let stats = session.stop().await;
    info!("Session finished after {:.1}s", stats.duration_secs);

    for message in session.transcript().await {
        info!("{:?}: {}", message.role, message.text);
    }

    let history = history.lock().await;
    info!("{} session log(s) saved", history.len());

    Ok(())
}
