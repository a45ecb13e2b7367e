//! Completion endpoint transport.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::fmt;

use crate::config::CompletionConfig;
use crate::errors::{PodflowError, PodflowResult};

/// Sends a prompt to a text completion service.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Returns the raw completion text for `prompt`.
    async fn complete(&self, prompt: &str) -> PodflowResult<String>;
}

/// OpenAI-compatible chat completion client.
pub struct HttpCompletionClient {
    http_client: reqwest::Client,
    api_key: String,
    config: CompletionConfig,
}

impl fmt::Debug for HttpCompletionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpCompletionClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

impl HttpCompletionClient {
    /// Creates a client.
    pub fn new(config: CompletionConfig, api_key: impl Into<String>) -> PodflowResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout()?)
            .build()
            .map_err(|e| PodflowError::invalid_input(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            api_key: api_key.into(),
            config,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You write concise, search-friendly Etsy listings. Reply with JSON only."
                },
                {
                    "role": "user",
                    "content": prompt
                }
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "response_format": { "type": "json_object" }
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

fn first_choice_text(response: ChatCompletionResponse) -> PodflowResult<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PodflowError::malformed("completion response contained no text"))
}

#[async_trait]
impl ContentGenerator for HttpCompletionClient {
    async fn complete(&self, prompt: &str) -> PodflowResult<String> {
        tracing::debug!(
            model = %self.config.model,
            prompt_len = prompt.len(),
            "sending completion request"
        );

        let response = self
            .http_client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(PodflowError::from_status(status.as_u16(), &body));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)?;
        first_choice_text(parsed)
    }
}
