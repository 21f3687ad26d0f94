//! Anthropic Claude client implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::config::ProviderConfig;
//! use llm::provider::{CompletionRequest, LlmProvider};
//! use llm::remote::ClaudeClient;
//!
//! let config = ProviderConfig::from_env(
//!     "ANTHROPIC_API_KEY",
//!     "https://api.anthropic.com",
//!     "claude-3-5-sonnet-20241022",
//! )?;
//! let client = ClaudeClient::new(config)?;
//! let text = client.complete(&CompletionRequest::new("Hello!")).await?;
//! ```

use super::{http_client, read_reply, transport_error};
use crate::config::ProviderConfig;
use crate::error::{LlmError, Result};
use crate::provider::{CompletionRequest, HttpReply, LlmProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic Claude API client.
#[derive(Clone)]
pub struct ClaudeClient {
    config: ProviderConfig,
    client: Client,
}

impl ClaudeClient {
    /// Create a new Claude client with the given configuration.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = http_client(&config)?;
        Ok(Self { config, client })
    }

    fn build_body(&self, request: &CompletionRequest) -> ClaudeRequest {
        ClaudeRequest {
            model: self.config.model.clone(),
            messages: vec![ClaudeMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            system: request.system.clone(),
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            temperature: Some(request.temperature.unwrap_or(self.config.temperature)),
        }
    }
}

#[async_trait]
impl LlmProvider for ClaudeClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn send(&self, request: &CompletionRequest) -> Result<HttpReply> {
        let url = format!("{}/v1/messages", self.config.base_url());
        let body = self.build_body(request);

        tracing::debug!(model = %self.config.model, url = %url, "sending Claude request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        read_reply(response).await
    }

    fn parse_reply(&self, reply: &HttpReply) -> Result<String> {
        let resp: ClaudeResponse = serde_json::from_str(&reply.body)
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let text = resp
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(LlmError::InvalidResponse(
                "Claude response contained no text content".to_string(),
            ));
        }

        Ok(text)
    }
}

// Claude API types
#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
}

#[derive(Debug, Deserialize)]
struct ClaudeContent {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}
