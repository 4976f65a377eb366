pub mod capture;
pub mod pcm;
pub mod playback;

pub use capture::{
    BlockChunker, CaptureConfig, CaptureFrame, CaptureSource, LevelMeter, PushFeeder, PushSource,
    ToneSource,
};
pub use playback::{
    ActiveSourceSet, PlaybackBuffer, PlaybackClock, PlaybackPipeline, PlaybackSink,
    ScheduledSource, SourceId, WavFileSink,
};
