//! Stateless model operations: translation, culture search, image scan,
//! one-shot speech synthesis, plus the cross-cutting in-flight guard and
//! bounded retry.

mod client;
mod error;
mod guard;
mod retry;

pub use client::{
    Citation, CultureAnswer, HttpModelClient, ModelClient, ScanFinding, ScanResult,
};
pub use error::ModelError;
pub use guard::{InflightGuard, InflightPermit};
pub use retry::{with_retry, RetryPolicy};

use tracing::debug;

/// Translate once per key: duplicate concurrent requests for the same key
/// are suppressed and report `Ok(None)` without touching the client.
pub async fn translate_once(
    guard: &InflightGuard,
    client: &dyn ModelClient,
    key: &str,
    text: &str,
    target_language: &str,
) -> Result<Option<String>, ModelError> {
    let _permit = match guard.try_begin(key) {
        Some(permit) => permit,
        None => {
            debug!("Translation '{}' already in progress", key);
            return Ok(None);
        }
    };

    let translation = client.translate(text, target_language).await?;
    Ok(Some(translation))
}

/// Short user-facing message replacing a failed model call. No partial
/// results are exposed.
pub fn generic_failure_message(language: &str) -> &'static str {
    match language.to_ascii_lowercase().as_str() {
        "spanish" | "es" => "Algo salió mal. Inténtalo de nuevo.",
        "french" | "fr" => "Une erreur est survenue. Réessayez.",
        "german" | "de" => "Etwas ist schiefgelaufen. Bitte erneut versuchen.",
        "italian" | "it" => "Qualcosa è andato storto. Riprova.",
        "japanese" | "ja" => "エラーが発生しました。もう一度お試しください。",
        "portuguese" | "pt" => "Algo deu errado. Tente novamente.",
        _ => "Something went wrong. Please try again.",
    }
}
