use anyhow::{Context, Result};
use async_nats::Client;
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::events::{ClientFrame, ServerEvent, SessionSetup};

/// Bidirectional event channel to the live model endpoint.
///
/// One channel per session: send setup then audio frames, receive streamed
/// server events. The concrete transport is behind this trait so the session
/// core can be exercised against an in-process double.
#[async_trait::async_trait]
pub trait LiveChannel: Send + Sync {
    /// Send the one-time session configuration.
    async fn send_setup(&self, setup: &SessionSetup) -> Result<()>;

    /// Forward one capture frame to the model.
    async fn send_frame(&self, frame: &ClientFrame) -> Result<()>;

    /// Subscribe to server events. Called once per session; the receiver
    /// ends when the channel closes.
    async fn subscribe_events(&self) -> Result<mpsc::Receiver<ServerEvent>>;

    /// Close the channel. Best-effort and idempotent.
    async fn close(&self) -> Result<()>;
}

/// Live channel carried over the message bus.
///
/// The model gateway consumes `tutor.audio.session-{id}` and publishes
/// events on `tutor.event.{id}.>`.
pub struct NatsLiveChannel {
    client: Client,
    session_id: String,
    event_capacity: usize,
}

impl NatsLiveChannel {
    /// Connect to the bus for one session.
    pub async fn connect(url: &str, session_id: String) -> Result<Self> {
        info!("Connecting live channel via NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Live channel connected for session {}", session_id);

        Ok(Self {
            client,
            session_id,
            event_capacity: 256,
        })
    }

    fn audio_subject(&self) -> String {
        format!("tutor.audio.session-{}", self.session_id)
    }

    fn setup_subject(&self) -> String {
        format!("tutor.session.{}.setup", self.session_id)
    }

    fn event_subject(&self) -> String {
        format!("tutor.event.{}.>", self.session_id)
    }
}

#[async_trait::async_trait]
impl LiveChannel for NatsLiveChannel {
    async fn send_setup(&self, setup: &SessionSetup) -> Result<()> {
        let payload = serde_json::to_vec(setup)?;

        self.client
            .publish(self.setup_subject(), payload.into())
            .await
            .context("Failed to publish session setup")?;

        info!(
            "Sent session setup (language={}, voice={})",
            setup.language, setup.voice
        );

        Ok(())
    }

    async fn send_frame(&self, frame: &ClientFrame) -> Result<()> {
        let payload = serde_json::to_vec(frame)?;

        self.client
            .publish(self.audio_subject(), payload.into())
            .await
            .context("Failed to publish audio frame")?;

        Ok(())
    }

    async fn subscribe_events(&self) -> Result<mpsc::Receiver<ServerEvent>> {
        let subject = self.event_subject();
        info!("Subscribing to live events on {}", subject);

        let mut subscriber = self
            .client
            .subscribe(subject)
            .await
            .context("Failed to subscribe to live events")?;

        let (tx, rx) = mpsc::channel(self.event_capacity);

        tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                match serde_json::from_slice::<ServerEvent>(&msg.payload) {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            // Session side released; stop forwarding.
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to parse live event: {}", e);
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn close(&self) -> Result<()> {
        info!("Closing live channel for session {}", self.session_id);
        self.client
            .flush()
            .await
            .context("Failed to flush live channel")?;
        Ok(())
    }
}
