//! Configuration schema for git-llm-review

use crate::error::{Result, ReviewError};
use crate::retry::RetryPolicy;
use llm::ProviderConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable that overrides `llm.api_key`.
pub const API_KEY_ENV: &str = "LLM_API_KEY";

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// File extensions to review (".go", "rs", ...); empty reviews everything
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// LLM configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Concurrency configuration
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    /// Retry configuration
    #[serde(default)]
    pub retry: RetrySettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            llm: LlmConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            retry: RetrySettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ReviewConfig {
    /// Resolve `${VAR}` references, then let `LLM_API_KEY` override the key.
    pub fn resolve_env_vars(&mut self) {
        if let Some(ref api_key) = self.llm.api_key {
            self.llm.api_key = Some(Self::expand_env_var(api_key));
        }
        if let Some(ref api_url) = self.llm.api_url {
            self.llm.api_url = Some(Self::expand_env_var(api_url));
        }
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                self.llm.api_key = Some(key);
            }
        }
    }

    /// Expand environment variable in a string
    ///
    /// Supports ${VAR_NAME} syntax; unset variables leave the value untouched.
    pub(crate) fn expand_env_var(value: &str) -> String {
        if value.starts_with("${") && value.ends_with('}') {
            let var_name = &value[2..value.len() - 1];
            std::env::var(var_name).unwrap_or_else(|_| value.to_string())
        } else {
            value.to_string()
        }
    }

    /// Reject values the runner and retry layer cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency.max_tasks == 0 {
            return Err(ReviewError::Config(
                "concurrency.max_tasks must be at least 1".into(),
            ));
        }
        if !(self.retry.backoff_factor >= 1.0) {
            return Err(ReviewError::Config(format!(
                "retry.backoff_factor must be >= 1.0, got {}",
                self.retry.backoff_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err(ReviewError::Config(format!(
                "retry.jitter_factor must be within [0, 1], got {}",
                self.retry.jitter_factor
            )));
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(ReviewError::Config(
                "retry.initial_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.llm.temperature) {
            return Err(ReviewError::Config(format!(
                "llm.temperature must be within [0, 1], got {}",
                self.llm.temperature
            )));
        }
        if self.llm.provider.trim().is_empty() {
            return Err(ReviewError::Config("llm.provider must not be empty".into()));
        }
        Ok(())
    }

    /// True when `path` has one of the configured extensions.
    pub fn wants_file(&self, path: &str) -> bool {
        crate::git::has_extension(path, &self.extensions)
    }
}

fn default_extensions() -> Vec<String> {
    [".go", ".c", ".cc", ".proto", ".vue", ".rs"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// LLM provider configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name as registered: "openai", "anthropic"
    pub provider: String,

    /// API base URL; the provider default when unset
    pub api_url: Option<String>,

    /// API key (supports ${VAR} interpolation; LLM_API_KEY overrides)
    pub api_key: Option<String>,

    /// Model name
    pub model: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature for generation (0.0-1.0)
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_url: None,
            api_key: None,
            model: "gpt-4".to_string(),
            timeout_secs: 300,
            max_tokens: 4096,
            temperature: 0.1,
        }
    }
}

impl LlmConfig {
    /// Transport settings for the provider registry.
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig::new(
            self.api_key.clone().unwrap_or_default(),
            self.api_url.clone().unwrap_or_default(),
            self.model.clone(),
        )
        .with_timeout(Duration::from_secs(self.timeout_secs))
        .with_max_tokens(self.max_tokens)
        .with_temperature(self.temperature)
    }
}

/// Concurrency configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Maximum reviews in flight at once
    pub max_tasks: usize,

    /// Deadline for the whole run in seconds; 0 disables it
    pub run_timeout_secs: u64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_tasks: 5,
            run_timeout_secs: 0,
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Disabled means a single attempt
    pub enabled: bool,

    /// Retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,

    /// Cap for any delay, in milliseconds
    pub max_delay_ms: u64,

    /// Growth factor between delays
    pub backoff_factor: f64,

    /// Symmetric jitter fraction (0.0-1.0)
    pub jitter_factor: f64,

    /// Error message substrings treated as transient
    pub retryable_errors: Vec<String>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
            backoff_factor: 2.0,
            jitter_factor: 0.1,
            retryable_errors: [
                "rate limit",
                "timeout",
                "connection reset",
                "connection refused",
                "no response",
                "internal server error",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl RetrySettings {
    /// Build the immutable policy used for a run.
    pub fn to_policy(&self) -> RetryPolicy {
        let max_retries = if self.enabled { self.max_retries } else { 0 };
        RetryPolicy::default()
            .with_max_retries(max_retries)
            .with_initial_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_backoff_factor(self.backoff_factor)
            .with_jitter_factor(self.jitter_factor)
            .with_retryable_errors(self.retryable_errors.iter().cloned())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,

    /// Log format: "compact", "pretty", "json"
    pub format: String,

    /// Write logs to `log_file_path` instead of stderr
    pub log_to_file: bool,

    /// Log file path
    pub log_file_path: String,

    /// Append every rendered prompt to this file when set
    pub prompt_log_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            log_to_file: false,
            log_file_path: "git-llm-review.log".to_string(),
            prompt_log_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReviewConfig::default();
        assert!(config.extensions.contains(&".go".to_string()));
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model, "gpt-4");
        assert_eq!(config.llm.timeout_secs, 300);
        assert_eq!(config.concurrency.max_tasks, 5);
        assert!(config.retry.enabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_section_keeps_field_defaults() {
        let config: ReviewConfig = serde_yaml::from_str("retry:\n  max_retries: 7\n").unwrap();
        assert_eq!(config.retry.max_retries, 7);
        assert_eq!(config.retry.initial_delay_ms, 500);
        assert_eq!(config.llm, LlmConfig::default());
    }

    #[test]
    fn test_disabled_retry_means_single_attempt() {
        let settings = RetrySettings {
            enabled: false,
            ..Default::default()
        };
        assert_eq!(settings.to_policy().max_attempts(), 1);
    }

    #[test]
    fn test_to_policy_carries_values() {
        let policy = RetrySettings::default().to_policy();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_millis(5000));
        assert!(policy.retryable_errors.contains(&"no response".to_string()));
    }

    #[test]
    fn test_expand_env_var() {
        std::env::set_var("GLR_SCHEMA_TEST_KEY", "secret");
        assert_eq!(ReviewConfig::expand_env_var("${GLR_SCHEMA_TEST_KEY}"), "secret");
        assert_eq!(ReviewConfig::expand_env_var("${GLR_SCHEMA_UNSET}"), "${GLR_SCHEMA_UNSET}");
        assert_eq!(ReviewConfig::expand_env_var("plain"), "plain");
    }

    #[test]
    fn test_validate() {
        assert!(ReviewConfig::default().validate().is_ok());

        let mut config = ReviewConfig::default();
        config.concurrency.max_tasks = 0;
        assert!(config.validate().is_err());

        let mut config = ReviewConfig::default();
        config.retry.backoff_factor = 0.5;
        assert!(config.validate().is_err());

        let mut config = ReviewConfig::default();
        config.retry.initial_delay_ms = 10_000;
        assert!(config.validate().is_err());

        let mut config = ReviewConfig::default();
        config.retry.jitter_factor = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_wants_file() {
        let config = ReviewConfig::default();
        assert!(config.wants_file("pkg/main.go"));
        assert!(config.wants_file("src/LIB.RS"));
        assert!(!config.wants_file("README.md"));
        assert!(!config.wants_file("Makefile"));

        let all = ReviewConfig {
            extensions: Vec::new(),
            ..Default::default()
        };
        assert!(all.wants_file("Makefile"));
    }

    #[test]
    fn test_provider_config() {
        let llm = LlmConfig {
            api_key: Some("k".into()),
            timeout_secs: 12,
            ..Default::default()
        };
        let provider = llm.provider_config();
        assert_eq!(provider.api_key, "k");
        assert_eq!(provider.base_url, "");
        assert_eq!(provider.timeout, Duration::from_secs(12));
    }
}
