//! OpenAI client implementation.
//!
//! Talks to the chat completions endpoint. Any OpenAI-compatible server
//! (vLLM, LM Studio, OpenRouter, ...) works by pointing `base_url` at it.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::config::ProviderConfig;
//! use llm::provider::{CompletionRequest, LlmProvider};
//! use llm::remote::OpenAiClient;
//!
//! let config = ProviderConfig::from_env("OPENAI_API_KEY", "https://api.openai.com/v1", "gpt-4")?;
//! let client = OpenAiClient::new(config)?;
//! let text = client.complete(&CompletionRequest::new("Hello!")).await?;
//! ```

use super::{http_client, read_reply, transport_error};
use crate::config::ProviderConfig;
use crate::error::{LlmError, Result};
use crate::provider::{CompletionRequest, HttpReply, LlmProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI API client.
#[derive(Clone)]
pub struct OpenAiClient {
    config: ProviderConfig,
    client: Client,
}

impl OpenAiClient {
    /// Create a new OpenAI client with the given configuration.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = http_client(&config)?;
        Ok(Self { config, client })
    }

    fn build_body(&self, request: &CompletionRequest) -> OpenAiRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(OpenAiMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(OpenAiMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        OpenAiRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: Some(request.max_tokens.unwrap_or(self.config.max_tokens)),
            temperature: Some(request.temperature.unwrap_or(self.config.temperature)),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn send(&self, request: &CompletionRequest) -> Result<HttpReply> {
        let url = format!("{}/chat/completions", self.config.base_url());
        let body = self.build_body(request);

        tracing::debug!(model = %self.config.model, url = %url, "sending OpenAI request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        read_reply(response).await
    }

    fn parse_reply(&self, reply: &HttpReply) -> Result<String> {
        let resp: OpenAiResponse = serde_json::from_str(&reply.body)
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        resp.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiClient {
        OpenAiClient::new(ProviderConfig::new("test-key", DEFAULT_BASE_URL, "gpt-4")).unwrap()
    }

    #[test]
    fn test_request_body_includes_system() {
        let client = client();
        let req = CompletionRequest::new("diff here").with_system("review code");
        let body = serde_json::to_value(client.build_body(&req)).unwrap();

        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "diff here");
    }

    #[test]
    fn test_parse_reply() {
        let client = client();
        let reply = HttpReply::new(
            200,
            r#"{"choices":[{"message":{"role":"assistant","content":"{\"issues\":[]}"}}]}"#,
        );
        assert_eq!(client.parse_reply(&reply).unwrap(), r#"{"issues":[]}"#);
    }

    #[test]
    fn test_parse_reply_without_choices() {
        let client = client();
        let reply = HttpReply::new(200, r#"{"choices":[]}"#);
        assert!(client.parse_reply(&reply).is_err());
    }
}
