pub mod account;
pub mod audio;
pub mod config;
pub mod http;
pub mod live;
pub mod model;
pub mod session;

pub use account::{AccountRow, AccountStore, PlanTier, RestAccountStore};
pub use audio::{
    BlockChunker, CaptureConfig, CaptureFrame, CaptureSource, LevelMeter, PlaybackBuffer,
    PlaybackClock, PlaybackPipeline, PlaybackSink, PushFeeder, PushSource, ToneSource,
    WavFileSink,
};
pub use config::Config;
pub use http::{create_router, AppState};
pub use live::{ClientFrame, LiveChannel, NatsLiveChannel, ServerEvent, SessionSetup};
pub use model::{
    CultureAnswer, HttpModelClient, InflightGuard, ModelClient, ModelError, RetryPolicy,
};
pub use session::{
    ChatSessionLog, LiveSession, Message, MessageRole, SessionConfig, SessionState,
    SessionStats, TranscriptAggregator,
};
