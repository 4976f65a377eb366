use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Legacy runtime environment variable, checked last.
const LEGACY_API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub live: LiveConfig,
    pub audio: AudioConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub account: AccountConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct LiveConfig {
    /// Message-bus URL carrying the live model channel
    pub nats_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub capture_sample_rate: u32,
    pub playback_sample_rate: u32,
    pub block_size: usize,
    pub channels: u16,
    /// Directory for archived tutor audio; omit to disable archiving
    pub tutor_audio_dir: Option<String>,
}

/// Settings for the stateless model REST surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub base_url: String,
    /// Explicit API key; environment fallbacks apply when absent
    pub api_key: Option<String>,
    pub text_model: String,
    pub tts_model: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: None,
            text_model: "gemini-2.5-flash".to_string(),
            tts_model: "gemini-2.5-flash-preview-tts".to_string(),
            timeout_secs: 30,
            max_attempts: 3,
        }
    }
}

impl ModelConfig {
    /// Resolve the API key in priority order: configured value, build-time
    /// environment value, legacy runtime environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }

        if let Some(key) = option_env!("LINGUA_API_KEY") {
            if !key.is_empty() {
                return Some(key.to_string());
            }
        }

        std::env::var(LEGACY_API_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
    }
}

/// Settings for the external usage/plan row store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountConfig {
    /// REST endpoint of the row store; omit to disable usage tracking
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Row owner whose usage counter this service bumps
    pub user_id: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
