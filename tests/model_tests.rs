// Tests for the stateless model boundary: in-flight dedup, bounded retry,
// and credential gating.

use async_trait::async_trait;
use lingua_live::config::ModelConfig;
use lingua_live::model::{
    translate_once, with_retry, CultureAnswer, HttpModelClient, InflightGuard, ModelClient,
    ModelError, RetryPolicy, ScanResult,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Model double that counts calls and answers slowly.
#[derive(Default)]
struct CountingClient {
    calls: AtomicUsize,
}

impl CountingClient {
    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for CountingClient {
    async fn translate(&self, text: &str, _target_language: &str) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(format!("translated: {}", text))
    }

    async fn culture_search(
        &self,
        _topic: &str,
        _language: &str,
    ) -> Result<CultureAnswer, ModelError> {
        unimplemented!("not exercised")
    }

    async fn analyze_image(
        &self,
        _image_base64: &str,
        _mime_type: &str,
        _language: &str,
    ) -> Result<ScanResult, ModelError> {
        unimplemented!("not exercised")
    }

    async fn synthesize_speech(&self, _text: &str, _voice: &str) -> Result<Vec<u8>, ModelError> {
        unimplemented!("not exercised")
    }
}

// ============================================================================
// In-flight guard
// ============================================================================

#[test]
fn test_guard_suppresses_duplicate_keys() {
    let guard = InflightGuard::new();

    let permit = guard.try_begin("translate:0");
    assert!(permit.is_some());
    assert!(guard.is_inflight("translate:0"));

    assert!(guard.try_begin("translate:0").is_none());
    assert!(guard.try_begin("translate:1").is_some());
}

#[test]
fn test_guard_releases_key_when_permit_drops() {
    let guard = InflightGuard::new();

    {
        let _permit = guard.try_begin("scan").unwrap();
        assert!(guard.is_inflight("scan"));
    }

    assert!(!guard.is_inflight("scan"));
    assert!(guard.try_begin("scan").is_some());
}

#[tokio::test]
async fn test_concurrent_duplicate_translations_issue_one_call() {
    let guard = InflightGuard::new();
    let client = Arc::new(CountingClient::default());

    // Two near-simultaneous requests for the same message index
    let (first, second) = tokio::join!(
        translate_once(&guard, client.as_ref(), "translate:3", "Hola", "spanish"),
        translate_once(&guard, client.as_ref(), "translate:3", "Hola", "spanish"),
    );

    let results = [first.unwrap(), second.unwrap()];
    assert_eq!(client.call_count(), 1, "Duplicate must not reach the client");
    assert_eq!(results.iter().filter(|r| r.is_some()).count(), 1);
    assert_eq!(results.iter().filter(|r| r.is_none()).count(), 1);

    // A fresh request afterwards goes through again
    let third = translate_once(&guard, client.as_ref(), "translate:3", "Hola", "spanish")
        .await
        .unwrap();
    assert!(third.is_some());
    assert_eq!(client.call_count(), 2);
}

// ============================================================================
// Bounded retry
// ============================================================================

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
    }
}

#[tokio::test]
async fn test_retry_absorbs_transient_failures() {
    let attempts = AtomicUsize::new(0);

    let result = with_retry(&fast_policy(3), "test", || {
        let n = attempts.fetch_add(1, Ordering::SeqCst);
        async move {
            if n < 1 {
                Err(ModelError::Timeout)
            } else {
                Ok("ok")
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), "ok");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_retry_respects_attempt_budget() {
    let attempts = AtomicUsize::new(0);

    let result: Result<(), _> = with_retry(&fast_policy(3), "test", || {
        attempts.fetch_add(1, Ordering::SeqCst);
        async { Err(ModelError::Request("connection refused".to_string())) }
    })
    .await;

    assert!(matches!(result, Err(ModelError::Request(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_does_not_retry_rejected_requests() {
    // A 4xx from the endpoint cannot succeed on a second attempt; the
    // budget must not be burned on it.
    let attempts = AtomicUsize::new(0);

    let result: Result<(), _> = with_retry(&fast_policy(5), "test", || {
        attempts.fetch_add(1, Ordering::SeqCst);
        async { Err(ModelError::Rejected(401)) }
    })
    .await;

    assert!(matches!(result, Err(ModelError::Rejected(401))));
    assert!(!ModelError::Rejected(400).is_transient());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_retry_does_not_retry_parse_failures() {
    let attempts = AtomicUsize::new(0);

    let result: Result<(), _> = with_retry(&fast_policy(5), "test", || {
        attempts.fetch_add(1, Ordering::SeqCst);
        async { Err(ModelError::Parse("bad json".to_string())) }
    })
    .await;

    assert!(matches!(result, Err(ModelError::Parse(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 1, "Parse failures are final");
}

// ============================================================================
// Credential gating
// ============================================================================

fn keyless_config() -> ModelConfig {
    // Unroutable base_url: if a request were attempted it would error as a
    // transport failure, not as a missing credential.
    ModelConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        api_key: None,
        timeout_secs: 1,
        max_attempts: 1,
        ..ModelConfig::default()
    }
}

#[tokio::test]
async fn test_missing_credential_fails_before_any_network_call() {
    // The legacy runtime fallback must not pick up a stray key
    std::env::remove_var("GEMINI_API_KEY");

    let client = HttpModelClient::from_config(&keyless_config());

    let result = client.translate("Hola", "spanish").await;
    assert!(matches!(result, Err(ModelError::MissingCredential)));

    let result = client.culture_search("mealtimes", "spanish").await;
    assert!(matches!(result, Err(ModelError::MissingCredential)));

    let result = client.analyze_image("aGk=", "image/png", "spanish").await;
    assert!(matches!(result, Err(ModelError::MissingCredential)));

    let result = client.synthesize_speech("Hola", "Aoede").await;
    assert!(matches!(result, Err(ModelError::MissingCredential)));
}

#[tokio::test]
async fn test_missing_credential_message_is_actionable() {
    std::env::remove_var("GEMINI_API_KEY");

    let client = HttpModelClient::from_config(&keyless_config());
    let err = client.translate("Hola", "spanish").await.unwrap_err();

    let message = err.to_string();
    assert!(message.contains("api_key") || message.contains("API key"));
    assert!(!err.is_transient(), "Missing credential must not be retried");
}
