//! Generative-text client shared by the refinement and composition stages.
//!
//! [`TextGenerator`] is the seam both stages depend on; [`ChatCompletionsClient`]
//! speaks the OpenAI-compatible `/chat/completions` wire format, which the
//! default Gemini endpoint also accepts.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::config::LlmConfig;

/// Errors that can occur while calling the generative-text service.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("generation request timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("generation service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse generation response: {0}")]
    Parse(String),

    /// The service returned no usable text.
    #[error("generation service returned an empty response")]
    EmptyResponse,

    /// The hosted endpoint needs a key and none is configured.
    #[error("no API key configured for {0}")]
    MissingApiKey(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

/// Async seam over a prompt-in, text-out generative service.
///
/// Implementors must be `Send + Sync`; the pipeline shares one instance
/// behind an `Arc<dyn TextGenerator>`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Client for an OpenAI-compatible chat completions endpoint.
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl ChatCompletionsClient {
    /// Build a client whose per-request timeout comes from `config.timeout_secs`.
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    /// Hosted endpoints reject keyless requests; local ones usually accept them.
    fn requires_api_key(&self) -> bool {
        url::Url::parse(&self.config.base_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.ends_with("googleapis.com")))
            .unwrap_or(false)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "stream": false,
            "temperature": self.config.temperature
        })
    }
}

/// Pull the first choice's message text out of a chat completions body
pub fn completion_text(body: &serde_json::Value) -> Result<String, LlmError> {
    let text = body["choices"][0]["message"]["content"]
        .as_str()
        .ok_or(LlmError::EmptyResponse)?
        .trim()
        .to_string();

    if text.is_empty() {
        return Err(LlmError::EmptyResponse);
    }

    Ok(text)
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    /// The bearer token is attached only when an API key is configured.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let key = self.config.api_key.as_deref().unwrap_or("");
        if key.is_empty() && self.requires_api_key() {
            return Err(LlmError::MissingApiKey(self.config.base_url.clone()));
        }

        let mut request = self
            .client
            .post(self.endpoint())
            .json(&self.request_body(prompt));

        if !key.is_empty() {
            request = request.bearer_auth(key);
        }

        tracing::debug!(model = %self.config.model, prompt_chars = prompt.len(), "Sending generation request");

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: crate::utils::truncate_chars(&body, 200),
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        completion_text(&json)
    }
}
