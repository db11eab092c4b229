//! OpenRouter API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, ChatOptions, ChatResponse, LlmClient, LlmError, TokenUsage};
use crate::config::Config;

/// OpenRouter API client (OpenAI-compatible chat completions).
pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenRouterClient {
    /// Create a new OpenRouter client.
    ///
    /// `base_url` is the API root, e.g. `https://openrouter.ai/api/v1`.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        Self::new(
            config.api_key.clone(),
            config.base_url.clone(),
            config.request_timeout,
        )
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CompletionBody {
    #[serde(default)]
    choices: Vec<Choice>,
    model: Option<String>,
    #[serde(default, deserialize_with = "super::lenient_usage")]
    usage: Option<TokenUsage>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<serde_json::Value>,
    message: Option<String>,
}

impl ErrorBody {
    fn status(&self) -> Option<u16> {
        self.code
            .as_ref()
            .and_then(|c| c.as_u64())
            .and_then(|c| u16::try_from(c).ok())
    }

    fn message_or(&self, fallback: &str) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| fallback.to_string())
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<ChatResponse, LlmError> {
        let request = CompletionRequest {
            model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        tracing::debug!(model = %model, messages = messages.len(), "Sending chat completion");

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .header("X-Title", "cardsmith")
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::network(format!("Request to OpenRouter failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|env| env.error.message_or(&body))
                .unwrap_or(body);
            tracing::debug!(status = status.as_u16(), "OpenRouter returned an error status");
            return Err(LlmError::from_status(status.as_u16(), message));
        }

        let parsed: CompletionBody = serde_json::from_str(&body)
            .map_err(|e| LlmError::parse(format!("Failed to parse completion: {}", e)))?;

        // OpenRouter may report upstream failures inside a 200 response.
        if let Some(err) = parsed.error {
            let message = err.message_or("Upstream provider error");
            return Err(match err.status() {
                Some(code) => LlmError::from_status(code, message),
                None => LlmError::new(super::LlmErrorKind::Other, message),
            });
        }

        let (content, finish_reason) = match parsed.choices.into_iter().next() {
            Some(choice) => (
                choice.message.and_then(|m| m.content).unwrap_or_default(),
                choice.finish_reason,
            ),
            None => (String::new(), None),
        };

        Ok(ChatResponse {
            content,
            finish_reason,
            usage: parsed.usage,
            model: parsed.model,
        })
    }
}
