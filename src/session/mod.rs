//! Live tutoring session management
//!
//! This module provides the `LiveSession` abstraction that manages:
//! - Capture forwarding (chunking, level metering, PCM16 encode)
//! - The bidirectional channel to the live model
//! - Playback scheduling with mid-stream interruption
//! - Transcript aggregation and session history snapshots
//! - Lifecycle state and statistics

mod config;
mod session;
mod stats;
mod transcript;

pub use config::SessionConfig;
pub use session::{LiveSession, SessionState};
pub use stats::SessionStats;
pub use transcript::{
    greeting_for, ChatSessionLog, Message, MessageRole, TranscriptAggregator,
};
