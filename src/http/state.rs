use crate::account::AccountStore;
use crate::audio::PushFeeder;
use crate::config::{AudioConfig, Config};
use crate::model::{InflightGuard, ModelClient};
use crate::session::{ChatSessionLog, LiveSession, SessionState};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// The one live session plus the feeder pushing capture audio into it.
pub struct ActiveSession {
    pub session: Arc<LiveSession>,
    pub feeder: PushFeeder,
}

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Single live-session slot (only one session may be open at a time)
    pub active: Arc<RwLock<Option<ActiveSession>>>,

    /// Finished-session history, shared with each session for its snapshot
    pub history: Arc<Mutex<Vec<ChatSessionLog>>>,

    /// Stateless model operations
    pub model: Arc<dyn ModelClient>,

    /// Per-operation in-flight dedup
    pub guard: InflightGuard,

    /// Message-bus URL for live channels
    pub nats_url: String,

    /// Audio settings applied to new sessions
    pub audio: AudioConfig,

    /// Usage/plan row store, if configured
    pub account: Option<Arc<dyn AccountStore>>,

    /// Row owner for usage bumps
    pub account_user: Option<String>,
}

impl AppState {
    pub fn new(
        config: &Config,
        model: Arc<dyn ModelClient>,
        account: Option<Arc<dyn AccountStore>>,
    ) -> Self {
        Self {
            active: Arc::new(RwLock::new(None)),
            history: Arc::new(Mutex::new(Vec::new())),
            model,
            guard: InflightGuard::new(),
            nats_url: config.live.nats_url.clone(),
            audio: config.audio.clone(),
            account,
            account_user: config.account.user_id.clone(),
        }
    }

    /// Claim the single-session slot for a freshly started session.
    ///
    /// The occupancy check and the install happen under one write lock, so
    /// two concurrent starts cannot both claim the slot. Returns the
    /// candidate back if another live session holds it; the caller must
    /// stop the loser.
    pub async fn claim_slot(&self, candidate: ActiveSession) -> Result<(), ActiveSession> {
        let mut active = self.active.write().await;

        if let Some(live) = active.as_ref() {
            if live.session.state() != SessionState::Closed {
                return Err(candidate);
            }
        }

        *active = Some(candidate);
        Ok(())
    }
}
