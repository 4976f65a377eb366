use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Live session control
        .route("/session/start", post(handlers::start_session))
        .route("/session/audio", post(handlers::push_audio))
        .route("/session/stop/:session_id", post(handlers::stop_session))
        // Live session queries
        .route(
            "/session/:session_id/status",
            get(handlers::get_session_status),
        )
        .route(
            "/session/:session_id/transcript",
            get(handlers::get_session_transcript),
        )
        .route(
            "/session/:session_id/level",
            get(handlers::get_session_level),
        )
        .route("/history", get(handlers::get_history))
        // Stateless model operations
        .route("/translate", post(handlers::translate_message))
        .route("/culture/search", post(handlers::culture_search))
        .route("/scan", post(handlers::scan_image))
        .route("/speak", post(handlers::speak))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
