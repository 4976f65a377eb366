//! HTTP API for session control and the stateless model operations
//!
//! Routes:
//! - POST /session/start, /session/audio, /session/stop/:id
//! - GET  /session/:id/{status,transcript,level}, /history
//! - POST /translate, /culture/search, /scan, /speak
//! - GET  /health

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{ActiveSession, AppState};
