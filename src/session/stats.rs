use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::SessionState;

/// Statistics about a live tutoring session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Current lifecycle state
    pub state: SessionState,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Number of audio frames forwarded to the model
    pub frames_sent: usize,

    /// Number of messages committed to the transcript
    pub messages: usize,

    /// Number of playback sources scheduled but not yet finished
    pub pending_playback: usize,

    /// Current input loudness (0 to ~2)
    pub input_level: f32,
}
