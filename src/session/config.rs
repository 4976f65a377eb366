use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::audio::pcm::{CAPTURE_BLOCK_SIZE, CAPTURE_SAMPLE_RATE, PLAYBACK_SAMPLE_RATE};

/// Configuration for a live tutoring session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g. "tutor-2026-08-30-es")
    pub session_id: String,

    /// Target language being practiced
    pub language: String,

    /// Named synthetic voice for tutor speech
    pub voice: String,

    /// Sample rate for captured input audio (the model expects 16kHz)
    pub capture_sample_rate: u32,

    /// Sample rate of returned tutor audio (the model emits 24kHz)
    pub playback_sample_rate: u32,

    /// Capture processing block size in samples
    pub block_size: usize,

    /// Number of audio channels (always mono for the live model)
    pub channels: u16,

    /// Optional path for archiving tutor audio as WAV
    pub tutor_audio_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("tutor-{}", uuid::Uuid::new_v4()),
            language: "spanish".to_string(),
            voice: "Aoede".to_string(),
            capture_sample_rate: CAPTURE_SAMPLE_RATE,
            playback_sample_rate: PLAYBACK_SAMPLE_RATE,
            block_size: CAPTURE_BLOCK_SIZE,
            channels: 1,
            tutor_audio_path: None,
        }
    }
}

impl SessionConfig {
    /// System instruction string parameterized by the target language.
    pub fn system_instruction(&self) -> String {
        format!(
            "You are a friendly and patient {} tutor. Hold a spoken conversation \
             in {}, keeping replies short and conversational. Gently correct \
             mistakes and encourage the learner to keep talking.",
            self.language, self.language
        )
    }
}
