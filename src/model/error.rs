use thiserror::Error;

/// Errors from the stateless model-call boundary.
#[derive(Debug, Error)]
pub enum ModelError {
    /// No API key could be resolved; the operation aborts before any
    /// network call is made.
    #[error(
        "no API key configured; set model.api_key in the config file or the \
         LINGUA_API_KEY / GEMINI_API_KEY environment variable"
    )]
    MissingCredential,

    /// HTTP transport or connection error.
    #[error("model request failed: {0}")]
    Request(String),

    /// The endpoint rejected the request (4xx); retrying cannot help.
    #[error("model rejected the request: HTTP {0}")]
    Rejected(u16),

    /// The request did not complete within the configured timeout.
    #[error("model request timed out")]
    Timeout,

    /// The response could not be parsed as expected JSON.
    #[error("failed to parse model response: {0}")]
    Parse(String),

    /// The model returned a response with no usable content.
    #[error("model returned an empty response")]
    EmptyResponse,
}

impl ModelError {
    /// Whether a bounded retry may absorb this failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, ModelError::Request(_) | ModelError::Timeout)
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ModelError::Timeout
        } else {
            ModelError::Request(e.to_string())
        }
    }
}
