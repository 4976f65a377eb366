use super::state::{ActiveSession, AppState};
use crate::audio::capture::{CaptureConfig, PushSource};
use crate::audio::pcm;
use crate::live::NatsLiveChannel;
use crate::model::{generic_failure_message, translate_once, ModelError};
use crate::session::{LiveSession, Message, SessionConfig, SessionState, SessionStats};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    /// Target language to practice (e.g. "spanish")
    pub language: String,

    /// Optional tutor voice (default: session default)
    pub voice: Option<String>,

    /// Optional session ID (if not provided, generate UUID)
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub status: String,
    pub greeting: String,
}

#[derive(Debug, Deserialize)]
pub struct PushAudioRequest {
    /// Base64-encoded little-endian float32 samples at the capture rate
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct PushAudioResponse {
    pub accepted_samples: usize,
}

#[derive(Debug, Serialize)]
pub struct StopSessionResponse {
    pub session_id: String,
    pub status: String,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize)]
pub struct LevelResponse {
    pub level: f32,
}

#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    /// Index of the transcript message to translate
    pub index: usize,
}

#[derive(Debug, Serialize)]
pub struct TranslateResponse {
    pub index: usize,
    pub translation: String,
}

#[derive(Debug, Deserialize)]
pub struct CultureSearchRequest {
    pub topic: String,
    pub language: String,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    /// Base64-encoded image bytes
    pub image: String,
    pub mime_type: String,
    pub language: String,
}

#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    pub text: String,
    pub voice: String,
}

#[derive(Debug, Serialize)]
pub struct SpeakResponse {
    /// Base64-encoded PCM16 audio at 24kHz
    pub audio: String,
    pub sample_rate: u32,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct InProgressResponse {
    pub status: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// Map a model failure to the user-facing contract: a missing credential is
/// an actionable instruction, anything else becomes a short localized
/// message with no partial result.
fn model_error_response(e: ModelError, language: &str) -> Response {
    match e {
        ModelError::MissingCredential => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        other => {
            error!("Model call failed: {}", other);
            error_response(StatusCode::BAD_GATEWAY, generic_failure_message(language))
        }
    }
}

fn in_progress() -> Response {
    (
        StatusCode::ACCEPTED,
        Json(InProgressResponse {
            status: "in_progress".to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Session handlers
// ============================================================================

/// POST /session/start
/// Start a live tutoring session (only one may be open at a time)
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> impl IntoResponse {
    let session_id = req
        .session_id
        .unwrap_or_else(|| format!("tutor-{}", uuid::Uuid::new_v4()));

    info!("Starting live session: {}", session_id);

    // Check the single-session slot
    {
        let active = state.active.read().await;
        if let Some(live) = active.as_ref() {
            if live.session.state() != SessionState::Closed {
                return error_response(
                    StatusCode::CONFLICT,
                    format!(
                        "Session {} is already live",
                        live.session.config().session_id
                    ),
                );
            }
        }
    }

    let mut session_config = SessionConfig {
        session_id: session_id.clone(),
        language: req.language,
        capture_sample_rate: state.audio.capture_sample_rate,
        playback_sample_rate: state.audio.playback_sample_rate,
        block_size: state.audio.block_size,
        channels: state.audio.channels,
        tutor_audio_path: state
            .audio
            .tutor_audio_dir
            .as_ref()
            .map(|dir| PathBuf::from(dir).join(format!("{}.wav", session_id))),
        ..SessionConfig::default()
    };
    if let Some(voice) = req.voice {
        session_config.voice = voice;
    }
    let greeting = crate::session::greeting_for(&session_config.language).to_string();

    let channel = match NatsLiveChannel::connect(&state.nats_url, session_id.clone()).await {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Failed to open live channel: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to open live channel: {}", e),
            );
        }
    };

    let session = match LiveSession::new(session_config, channel, Arc::clone(&state.history)) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to create session: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to create session: {}", e),
            );
        }
    };

    let (source, feeder) = PushSource::new(CaptureConfig {
        sample_rate: state.audio.capture_sample_rate,
        block_size: state.audio.block_size,
        ..CaptureConfig::default()
    });

    if let Err(e) = session.start(Box::new(source)).await {
        error!("Failed to start session: {}", e);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to start session: {}", e),
        );
    }

    // The early read check above is only a fast path; the slot is claimed
    // atomically here, and a start that lost the race is torn down.
    if let Err(lost) = state.claim_slot(ActiveSession { session, feeder }).await {
        warn!(
            "Session {} lost the slot to a concurrent start, stopping it",
            session_id
        );
        lost.session.stop().await;
        return error_response(StatusCode::CONFLICT, "Another session is already live");
    }

    info!("Live session started: {}", session_id);

    (
        StatusCode::OK,
        Json(StartSessionResponse {
            session_id,
            status: "active".to_string(),
            greeting,
        }),
    )
        .into_response()
}

/// POST /session/audio
/// Push one block of captured float32 samples into the live session
pub async fn push_audio(
    State(state): State<AppState>,
    Json(req): Json<PushAudioRequest>,
) -> impl IntoResponse {
    let bytes = match pcm::decode_base64(&req.data) {
        Ok(b) => b,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };
    let samples = match pcm::bytes_to_f32(&bytes) {
        Ok(s) => s,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let active = state.active.read().await;
    let live = match active.as_ref() {
        Some(live) if live.session.state() == SessionState::Active => live,
        _ => return error_response(StatusCode::NOT_FOUND, "No live session"),
    };

    let count = samples.len();
    if let Err(e) = live.feeder.push(samples).await {
        return error_response(StatusCode::GONE, e.to_string());
    }

    (
        StatusCode::OK,
        Json(PushAudioResponse {
            accepted_samples: count,
        }),
    )
        .into_response()
}

/// POST /session/stop/:session_id
/// Stop the live session
pub async fn stop_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    info!("Stopping live session: {}", session_id);

    let live = {
        let mut active = state.active.write().await;
        match active.as_ref() {
            Some(live) if live.session.config().session_id == session_id => active.take(),
            _ => None,
        }
    };

    match live {
        Some(live) => {
            let stats = live.session.stop().await;
            info!("Live session stopped: {}", session_id);

            // Best-effort usage bump; the stop result does not depend on it.
            if let (Some(store), Some(user_id)) = (&state.account, &state.account_user) {
                if let Err(e) = store.increment_usage(user_id).await {
                    warn!("Failed to record session usage: {}", e);
                }
            }
            (
                StatusCode::OK,
                Json(StopSessionResponse {
                    session_id,
                    status: "stopped".to_string(),
                    stats,
                }),
            )
                .into_response()
        }
        None => {
            error!("Session {} not found", session_id);
            error_response(
                StatusCode::NOT_FOUND,
                format!("Session {} not found", session_id),
            )
        }
    }
}

/// Find the live session matching an ID.
async fn find_session(state: &AppState, session_id: &str) -> Option<Arc<LiveSession>> {
    let active = state.active.read().await;
    active
        .as_ref()
        .filter(|live| live.session.config().session_id == session_id)
        .map(|live| Arc::clone(&live.session))
}

/// GET /session/:session_id/status
pub async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match find_session(&state, &session_id).await {
        Some(session) => (StatusCode::OK, Json(session.get_stats().await)).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Session {} not found", session_id),
        ),
    }
}

/// GET /session/:session_id/transcript
pub async fn get_session_transcript(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match find_session(&state, &session_id).await {
        Some(session) => {
            let transcript: Vec<Message> = session.transcript().await;
            (StatusCode::OK, Json(transcript)).into_response()
        }
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Session {} not found", session_id),
        ),
    }
}

/// GET /session/:session_id/level
/// Current input loudness, polled by the UI for the speaking indicator
pub async fn get_session_level(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match find_session(&state, &session_id).await {
        Some(session) => (
            StatusCode::OK,
            Json(LevelResponse {
                level: session.input_level(),
            }),
        )
            .into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Session {} not found", session_id),
        ),
    }
}

/// GET /history
/// Finished-session logs, newest last
pub async fn get_history(State(state): State<AppState>) -> impl IntoResponse {
    let history = state.history.lock().await;
    (StatusCode::OK, Json(history.clone())).into_response()
}

// ============================================================================
// Model handlers
// ============================================================================

/// POST /translate
/// Translate one committed transcript message of the live session. Duplicate
/// requests for the same message while one is pending are suppressed.
pub async fn translate_message(
    State(state): State<AppState>,
    Json(req): Json<TranslateRequest>,
) -> impl IntoResponse {
    let (session, language, text) = {
        let active = state.active.read().await;
        let live = match active.as_ref() {
            Some(live) => live,
            None => return error_response(StatusCode::NOT_FOUND, "No live session"),
        };

        let session = Arc::clone(&live.session);
        let language = session.config().language.clone();
        let messages = session.transcript().await;

        match messages.get(req.index) {
            Some(message) if message.translation.is_none() => {
                (session, language, message.text.clone())
            }
            Some(_) => {
                return error_response(
                    StatusCode::CONFLICT,
                    format!("Message {} is already translated", req.index),
                )
            }
            None => {
                return error_response(
                    StatusCode::NOT_FOUND,
                    format!("No transcript message at index {}", req.index),
                )
            }
        }
    };

    let key = format!(
        "translate:{}:{}",
        session.config().session_id,
        req.index
    );

    match translate_once(&state.guard, state.model.as_ref(), &key, &text, &language).await {
        Ok(Some(translation)) => {
            if let Err(e) = session.set_translation(req.index, translation.clone()).await {
                return error_response(StatusCode::CONFLICT, e.to_string());
            }

            (
                StatusCode::OK,
                Json(TranslateResponse {
                    index: req.index,
                    translation,
                }),
            )
                .into_response()
        }
        Ok(None) => in_progress(),
        Err(e) => model_error_response(e, &language),
    }
}

/// POST /culture/search
/// Search-grounded culture answer with citations
pub async fn culture_search(
    State(state): State<AppState>,
    Json(req): Json<CultureSearchRequest>,
) -> impl IntoResponse {
    let key = format!("culture:{}", req.topic);
    let _permit = match state.guard.try_begin(&key) {
        Some(permit) => permit,
        None => return in_progress(),
    };

    match state.model.culture_search(&req.topic, &req.language).await {
        Ok(answer) => (StatusCode::OK, Json(answer)).into_response(),
        Err(e) => model_error_response(e, &req.language),
    }
}

/// POST /scan
/// Identify objects in an image and name them in the target language
pub async fn scan_image(
    State(state): State<AppState>,
    Json(req): Json<ScanRequest>,
) -> impl IntoResponse {
    let _permit = match state.guard.try_begin("scan") {
        Some(permit) => permit,
        None => return in_progress(),
    };

    match state
        .model
        .analyze_image(&req.image, &req.mime_type, &req.language)
        .await
    {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => model_error_response(e, &req.language),
    }
}

/// POST /speak
/// One-shot speech synthesis for a short phrase
pub async fn speak(
    State(state): State<AppState>,
    Json(req): Json<SpeakRequest>,
) -> impl IntoResponse {
    let key = format!("speak:{}", req.text);
    let _permit = match state.guard.try_begin(&key) {
        Some(permit) => permit,
        None => return in_progress(),
    };

    match state.model.synthesize_speech(&req.text, &req.voice).await {
        Ok(audio) => (
            StatusCode::OK,
            Json(SpeakResponse {
                audio: pcm::encode_base64(&audio),
                sample_rate: pcm::PLAYBACK_SAMPLE_RATE,
            }),
        )
            .into_response(),
        Err(e) => model_error_response(e, "english"),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
