//! Bidirectional session channel to the live model endpoint.

mod channel;
mod events;

pub use channel::{LiveChannel, NatsLiveChannel};
pub use events::{ClientFrame, ServerEvent, SessionSetup};
