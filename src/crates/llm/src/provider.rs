//! Provider abstraction shared by all remote clients.
//!
//! A provider exposes the raw HTTP exchange (`send`) separately from reply
//! decoding (`parse_reply`) so callers can inspect the status code of every
//! attempt, which the retry layer needs to synthesize rate-limit errors.

use crate::error::{LlmError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single completion request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Optional system prompt.
    pub system: Option<String>,
    /// User prompt.
    pub prompt: String,
    /// Overrides the provider's configured token limit.
    pub max_tokens: Option<u32>,
    /// Overrides the provider's configured temperature.
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Raw reply of one HTTP exchange with a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Convert a non-2xx reply into a typed error.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(LlmError::from_status(self.status, self.body))
        }
    }
}

/// A text-completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Registry name of the provider (e.g. "openai").
    fn name(&self) -> &str;

    /// Model identifier used for requests.
    fn model(&self) -> &str;

    /// Perform one HTTP exchange. Transport failures are errors; any HTTP
    /// status, including non-2xx, is returned as a reply.
    async fn send(&self, request: &CompletionRequest) -> Result<HttpReply>;

    /// Extract the completion text from a successful reply body.
    fn parse_reply(&self, reply: &HttpReply) -> Result<String>;

    /// Send a request and decode the reply in one step.
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let reply = self.send(request).await?.error_for_status()?;
        self.parse_reply(&reply)
    }
}
