//! Minimal chat-completions client for the Grok API.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default API endpoint.
const BASE_URL: &str = "https://api.x.ai/v1";

/// Request timeout. Insight generation is best-effort, so a hung upstream
/// must not hold a check-in response open indefinitely.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const TEMPERATURE: f64 = 0.7;
const MAX_TOKENS: u32 = 200;

/// Errors from the insights backend.
#[derive(Debug, Error)]
pub enum InsightsError {
    /// Network-level failure.
    #[error("insights request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned a non-success status.
    #[error("insights API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, for the logs.
        message: String,
    },

    /// The API answered 2xx but the body was not a usable completion.
    #[error("malformed insights response: {0}")]
    MalformedResponse(String),

    /// Client could not be constructed.
    #[error("insights configuration error: {0}")]
    Configuration(String),
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Client for the chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct InsightsClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl InsightsClient {
    /// Create a client against the production endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(api_key: &str, model: &str) -> Result<Self, InsightsError> {
        Self::with_base_url(api_key, model, BASE_URL)
    }

    /// Create a client against a custom endpoint. Used by tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn with_base_url(
        api_key: &str,
        model: &str,
        base_url: &str,
    ) -> Result<Self, InsightsError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| InsightsError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    /// Run one system+user completion and return the model's text.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, a non-success status, or a
    /// response without any completion text.
    pub async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, InsightsError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system_prompt },
                ChatMessage { role: "user", content: user_prompt },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(InsightsError::Api { status: status.as_u16(), message });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| InsightsError::MalformedResponse(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| InsightsError::MalformedResponse("no choices in response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_base_url_trims_trailing_slash() {
        let client = InsightsClient::with_base_url("key", "grok-2-1212", "http://localhost:9099/")
            .unwrap();
        assert_eq!(client.base_url, "http://localhost:9099");
    }

    #[test]
    fn new_uses_production_endpoint() {
        let client = InsightsClient::new("key", "grok-2-1212").unwrap();
        assert_eq!(client.base_url, BASE_URL);
    }
}
