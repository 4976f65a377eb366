use serde::{Deserialize, Serialize};

/// Session setup sent once when the channel opens.
///
/// Configures the live model for an audio-only tutoring exchange with
/// transcription of both directions enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSetup {
    pub session_id: String,
    /// Target language being taught (e.g. "spanish")
    pub language: String,
    /// Named synthetic voice for tutor speech
    pub voice: String,
    /// System instruction parameterized by the target language
    pub system_instruction: String,
    /// Response modality; always "audio" for the live tutor
    pub response_modality: String,
    pub input_transcription: bool,
    pub output_transcription: bool,
}

/// Client-to-model audio frame (base64 PCM16, 16kHz mono).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientFrame {
    pub session_id: String,
    pub sequence: u32,
    /// Base64-encoded PCM16 bytes
    pub audio: String,
    pub sample_rate: u32,
    pub channels: u16,
    /// RFC3339 timestamp
    pub timestamp: String,
    #[serde(rename = "final")]
    pub final_frame: bool,
}

/// Model-to-client event on the live channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Audio fragment to play (base64 PCM16, 24kHz mono)
    Audio { data: String },
    /// Incremental transcript of what the user said
    InputTranscript { text: String },
    /// Incremental transcript of what the tutor is saying
    OutputTranscript { text: String },
    /// The current conversational turn is finalized
    TurnComplete,
    /// The user preempted in-flight tutor audio; cancel local playback
    Interrupted,
}
