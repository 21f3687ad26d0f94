//! Remote LLM provider implementations.
//!
//! # Providers
//!
//! - **OpenAI** - chat completions API (GPT-4, GPT-4o, ...); also works with
//!   any OpenAI-compatible endpoint via `base_url`
//! - **Anthropic** - Claude messages API

pub mod claude;
pub mod openai;

pub use claude::ClaudeClient;
pub use openai::OpenAiClient;

use crate::config::ProviderConfig;
use crate::error::{LlmError, Result};
use crate::provider::HttpReply;
use reqwest::Client;

/// Build the shared HTTP client for a provider.
pub(crate) fn http_client(config: &ProviderConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| LlmError::ConfigError(format!("failed to create HTTP client: {}", e)))
}

/// Map a reqwest failure to a typed error, keeping timeouts distinct.
pub(crate) fn transport_error(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout(err.to_string())
    } else {
        LlmError::HttpError(err)
    }
}

/// Drain a response into an `HttpReply` without judging its status.
pub(crate) async fn read_reply(response: reqwest::Response) -> Result<HttpReply> {
    let status = response.status().as_u16();
    let body = response.text().await.map_err(transport_error)?;
    Ok(HttpReply { status, body })
}
