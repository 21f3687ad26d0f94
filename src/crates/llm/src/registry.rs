//! Explicit provider registry.
//!
//! Factories are registered by name on a registry value owned by the caller;
//! there is no process-wide table.

use crate::config::ProviderConfig;
use crate::error::{LlmError, Result};
use crate::provider::LlmProvider;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Constructor for a provider from its configuration.
pub type ProviderFactory =
    Arc<dyn Fn(ProviderConfig) -> Result<Arc<dyn LlmProvider>> + Send + Sync>;

#[derive(Clone)]
struct Entry {
    default_base_url: String,
    factory: ProviderFactory,
}

/// Name-to-factory table for LLM providers.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    entries: BTreeMap<String, Entry>,
}

impl ProviderRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in remote providers ("openai", "anthropic").
    #[cfg(feature = "remote")]
    pub fn with_defaults() -> Self {
        use crate::remote::{claude, openai, ClaudeClient, OpenAiClient};

        let mut registry = Self::new();
        registry.register("openai", openai::DEFAULT_BASE_URL, |config| {
            Ok(Arc::new(OpenAiClient::new(config)?) as Arc<dyn LlmProvider>)
        });
        registry.register("anthropic", claude::DEFAULT_BASE_URL, |config| {
            Ok(Arc::new(ClaudeClient::new(config)?) as Arc<dyn LlmProvider>)
        });
        registry
    }

    /// Register (or replace) a provider factory.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        default_base_url: impl Into<String>,
        factory: F,
    ) where
        F: Fn(ProviderConfig) -> Result<Arc<dyn LlmProvider>> + Send + Sync + 'static,
    {
        self.entries.insert(
            name.into().to_lowercase(),
            Entry {
                default_base_url: default_base_url.into(),
                factory: Arc::new(factory),
            },
        );
    }

    /// Create a provider instance. An empty `base_url` is replaced by the
    /// provider's default.
    pub fn create(&self, name: &str, mut config: ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
        let entry = self
            .entries
            .get(&name.to_lowercase())
            .ok_or_else(|| LlmError::UnsupportedProvider(name.to_string()))?;

        if config.base_url.trim().is_empty() {
            config.base_url = entry.default_base_url.clone();
        }
        config.validate()?;

        tracing::debug!(provider = %name, model = %config.model, "creating LLM provider");
        (entry.factory)(config)
    }

    /// Default base URL for a registered provider.
    pub fn default_base_url(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_lowercase())
            .map(|e| e.default_base_url.as_str())
    }

    /// Registered provider names, sorted.
    pub fn available(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_registered() {
        let registry = ProviderRegistry::with_defaults();
        assert_eq!(registry.available(), vec!["anthropic", "openai"]);
        assert_eq!(
            registry.default_base_url("OpenAI"),
            Some("https://api.openai.com/v1")
        );
    }

    #[test]
    fn test_unknown_provider() {
        let registry = ProviderRegistry::with_defaults();
        let config = ProviderConfig::new("key", "", "model");
        assert!(matches!(
            registry.create("nope", config),
            Err(LlmError::UnsupportedProvider(_))
        ));
    }

    #[test]
    fn test_create_fills_default_base_url() {
        let registry = ProviderRegistry::with_defaults();
        let provider = registry
            .create("anthropic", ProviderConfig::new("key", "", "claude-3-haiku"))
            .unwrap();
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.model(), "claude-3-haiku");
    }

    #[test]
    fn test_create_validates_config() {
        let registry = ProviderRegistry::with_defaults();
        let result = registry.create("openai", ProviderConfig::new("", "", "gpt-4"));
        assert!(matches!(result, Err(LlmError::ApiKeyNotFound(_))));
    }
}
