// Tests for configuration loading and API key resolution.
//
// Key resolution mutates process environment variables, so these live in
// their own test binary rather than alongside the model tests.

use lingua_live::config::{Config, ModelConfig};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_api_key_resolution_priority() {
    std::env::set_var("GEMINI_API_KEY", "legacy-key");

    // Configured value wins over the environment
    let config = ModelConfig {
        api_key: Some("configured-key".to_string()),
        ..ModelConfig::default()
    };
    assert_eq!(config.resolve_api_key().as_deref(), Some("configured-key"));

    // An empty configured value falls through to the legacy environment
    let config = ModelConfig {
        api_key: Some(String::new()),
        ..ModelConfig::default()
    };
    assert_eq!(config.resolve_api_key().as_deref(), Some("legacy-key"));

    let config = ModelConfig {
        api_key: None,
        ..ModelConfig::default()
    };
    assert_eq!(config.resolve_api_key().as_deref(), Some("legacy-key"));

    std::env::remove_var("GEMINI_API_KEY");
}

#[test]
fn test_config_loads_from_toml() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("service.toml");

    fs::write(
        &path,
        r#"
[service]
name = "lingua-live-test"

[service.http]
bind = "127.0.0.1"
port = 9999

[live]
nats_url = "nats://localhost:4222"

[audio]
capture_sample_rate = 16000
playback_sample_rate = 24000
block_size = 4096
channels = 1

[model]
base_url = "http://localhost:8000"
text_model = "test-model"
tts_model = "test-tts"
timeout_secs = 5
max_attempts = 2
"#,
    )
    .unwrap();

    let stem = temp_dir.path().join("service");
    let cfg = Config::load(stem.to_str().unwrap()).unwrap();

    assert_eq!(cfg.service.name, "lingua-live-test");
    assert_eq!(cfg.service.http.port, 9999);
    assert_eq!(cfg.audio.block_size, 4096);
    assert_eq!(cfg.model.max_attempts, 2);
    assert!(cfg.model.api_key.is_none());
    assert!(cfg.account.base_url.is_none(), "Account section defaults off");
}
