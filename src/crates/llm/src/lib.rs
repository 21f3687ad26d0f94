//! LLM provider implementations for git-llm-review.
//!
//! Each provider implements [`LlmProvider`](provider::LlmProvider), which
//! splits a completion into the raw HTTP exchange and reply decoding.
//! Providers are looked up by name through an explicit
//! [`ProviderRegistry`](registry::ProviderRegistry).
//!
//! # Remote Providers
//!
//! - **OpenAI** - OpenAI models and OpenAI-compatible servers
//! - **Anthropic** - Claude models
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use llm::config::ProviderConfig;
//! use llm::provider::{CompletionRequest, LlmProvider};
//! use llm::registry::ProviderRegistry;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ProviderRegistry::with_defaults();
//!     let config = ProviderConfig::from_env("OPENAI_API_KEY", "", "gpt-4")?;
//!     let provider = registry.create("openai", config)?;
//!
//!     let text = provider
//!         .complete(&CompletionRequest::new("Explain this diff"))
//!         .await?;
//!     println!("{}", text);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod provider;
pub mod registry;

#[cfg(feature = "remote")]
pub mod remote;

pub use config::ProviderConfig;
pub use error::{LlmError, Result};
pub use provider::{CompletionRequest, HttpReply, LlmProvider};
pub use registry::{ProviderFactory, ProviderRegistry};
