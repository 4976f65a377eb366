//! `ModelClient` trait and the Gemini-style REST implementation.
//!
//! Every call resolves the credential before building a request: a missing
//! key fails locally with [`ModelError::MissingCredential`] and never
//! touches the network. Transient transport failures are absorbed by the
//! bounded retry wrapper before surfacing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::error::ModelError;
use super::retry::{with_retry, RetryPolicy};
use crate::audio::pcm;
use crate::config::ModelConfig;

/// A grounding source returned alongside a search-augmented answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub uri: String,
}

/// Search-grounded culture answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CultureAnswer {
    pub text: String,
    pub sources: Vec<Citation>,
}

/// One object recognized in a scanned image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanFinding {
    pub object: String,
    pub translation: String,
}

/// Structured result of an image scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub summary: String,
    pub findings: Vec<ScanFinding>,
}

/// Stateless request/response operations against the external model.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Translate `text` into the target language.
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, ModelError>;

    /// Answer a culture question with web-search grounding and citations.
    async fn culture_search(
        &self,
        topic: &str,
        language: &str,
    ) -> Result<CultureAnswer, ModelError>;

    /// Identify objects in an image and name them in the target language.
    async fn analyze_image(
        &self,
        image_base64: &str,
        mime_type: &str,
        language: &str,
    ) -> Result<ScanResult, ModelError>;

    /// One-shot speech synthesis; returns raw PCM bytes.
    async fn synthesize_speech(&self, text: &str, voice: &str) -> Result<Vec<u8>, ModelError>;
}

/// Calls a Gemini-style `models/{model}:generateContent` REST surface.
pub struct HttpModelClient {
    client: reqwest::Client,
    config: ModelConfig,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl HttpModelClient {
    /// Build a client from application config.
    ///
    /// The API key is resolved once, in priority order (config value,
    /// build-time environment, legacy runtime environment).
    pub fn from_config(config: &ModelConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let retry = RetryPolicy {
            max_attempts: config.max_attempts,
            ..RetryPolicy::default()
        };

        Self {
            client,
            api_key: config.resolve_api_key(),
            config: config.clone(),
            retry,
        }
    }

    fn api_key(&self) -> Result<&str, ModelError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ModelError::MissingCredential)
    }

    /// POST one generateContent request and return the parsed body.
    async fn generate(
        &self,
        model: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, ModelError> {
        let key = self.api_key()?;

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url, model, key
        );

        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        if status.is_client_error() {
            return Err(ModelError::Rejected(status.as_u16()));
        }
        if !status.is_success() {
            return Err(ModelError::Request(format!("HTTP {}", status)));
        }

        response
            .json()
            .await
            .map_err(|e| ModelError::Parse(e.to_string()))
    }

    fn extract_text(body: &serde_json::Value) -> Result<String, ModelError> {
        let text = body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or(ModelError::EmptyResponse)?
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(ModelError::EmptyResponse);
        }

        Ok(text)
    }

    fn extract_citations(body: &serde_json::Value) -> Vec<Citation> {
        let chunks = body["candidates"][0]["groundingMetadata"]["groundingChunks"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        chunks
            .iter()
            .filter_map(|chunk| {
                let web = &chunk["web"];
                Some(Citation {
                    title: web["title"].as_str()?.to_string(),
                    uri: web["uri"].as_str()?.to_string(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, ModelError> {
        // Fail pre-network on a missing key, before entering the retry loop.
        self.api_key()?;

        let prompt = format!(
            "Translate the following {} text into English. \
             Reply with the translation only.\n\n{}",
            target_language, text
        );

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        with_retry(&self.retry, "translate", || {
            let body = body.clone();
            async move {
                let response = self.generate(&self.config.text_model, body).await?;
                Self::extract_text(&response)
            }
        })
        .await
    }

    async fn culture_search(
        &self,
        topic: &str,
        language: &str,
    ) -> Result<CultureAnswer, ModelError> {
        self.api_key()?;

        let prompt = format!(
            "Explain for a learner of {}: {}. Keep it concise and practical.",
            language, topic
        );

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "tools": [{ "google_search": {} }]
        });

        with_retry(&self.retry, "culture_search", || {
            let body = body.clone();
            async move {
                let response = self.generate(&self.config.text_model, body).await?;
                let text = Self::extract_text(&response)?;
                let sources = Self::extract_citations(&response);
                Ok(CultureAnswer { text, sources })
            }
        })
        .await
    }

    async fn analyze_image(
        &self,
        image_base64: &str,
        mime_type: &str,
        language: &str,
    ) -> Result<ScanResult, ModelError> {
        self.api_key()?;

        let prompt = format!(
            "Identify the main objects in this image and give each one's name \
             in {}.",
            language
        );

        let body = json!({
            "contents": [{
                "parts": [
                    { "inline_data": { "mime_type": mime_type, "data": image_base64 } },
                    { "text": prompt }
                ]
            }],
            "generationConfig": {
                "response_mime_type": "application/json",
                "response_schema": {
                    "type": "OBJECT",
                    "properties": {
                        "summary": { "type": "STRING" },
                        "findings": {
                            "type": "ARRAY",
                            "items": {
                                "type": "OBJECT",
                                "properties": {
                                    "object": { "type": "STRING" },
                                    "translation": { "type": "STRING" }
                                },
                                "required": ["object", "translation"]
                            }
                        }
                    },
                    "required": ["summary", "findings"]
                }
            }
        });

        with_retry(&self.retry, "analyze_image", || {
            let body = body.clone();
            async move {
                let response = self.generate(&self.config.text_model, body).await?;
                let text = Self::extract_text(&response)?;
                serde_json::from_str(&text).map_err(|e| ModelError::Parse(e.to_string()))
            }
        })
        .await
    }

    async fn synthesize_speech(&self, text: &str, voice: &str) -> Result<Vec<u8>, ModelError> {
        self.api_key()?;

        let body = json!({
            "contents": [{ "parts": [{ "text": text }] }],
            "generationConfig": {
                "response_modalities": ["AUDIO"],
                "speech_config": {
                    "voice_config": {
                        "prebuilt_voice_config": { "voice_name": voice }
                    }
                }
            }
        });

        with_retry(&self.retry, "synthesize_speech", || {
            let body = body.clone();
            async move {
                let response = self.generate(&self.config.tts_model, body).await?;

                let data = response["candidates"][0]["content"]["parts"][0]["inlineData"]
                    ["data"]
                    .as_str()
                    .ok_or(ModelError::EmptyResponse)?;

                pcm::decode_base64(data).map_err(|e| ModelError::Parse(e.to_string()))
            }
        })
        .await
    }
}
