//! Logging setup and the prompt log.
//!
//! Diagnostics go through `tracing`. The subscriber writes to stderr (or a
//! file) so stdout stays reserved for the review report.

use crate::config::LoggingConfig;
use crate::error::{Result, ReviewError};
use chrono::Utc;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level; `verbose` forces debug for
/// this crate. Calling it twice is an error rather than a panic.
pub fn init_logging(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("{level},hyper=warn,reqwest=warn")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let writer = if config.log_to_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file_path)
            .map_err(|e| {
                ReviewError::Config(format!(
                    "Failed to open log file {}: {}",
                    config.log_file_path, e
                ))
            })?;
        BoxMakeWriter::new(Mutex::new(file))
    } else {
        BoxMakeWriter::new(std::io::stderr)
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(!config.log_to_file);

    let installed = match config.format.as_str() {
        "json" => builder.json().try_init(),
        "pretty" => builder.pretty().try_init(),
        _ => builder.compact().with_target(false).try_init(),
    };
    installed.map_err(|e| ReviewError::Config(format!("Failed to initialize logging: {}", e)))
}

/// Appends rendered prompts, and optionally raw answers, to a file.
///
/// Write failures are logged and otherwise ignored; the prompt log must
/// never fail a review.
#[derive(Debug)]
pub struct PromptLogger {
    path: PathBuf,
    full_exchange: bool,
    file: tokio::sync::Mutex<Option<tokio::fs::File>>,
}

impl PromptLogger {
    /// Open `path` for appending, creating parent directories as needed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        debug!(path = %path.display(), "Prompt logging enabled");
        Ok(Self {
            path,
            full_exchange: false,
            file: tokio::sync::Mutex::new(Some(file)),
        })
    }

    /// Also record the raw answer for each prompt.
    pub fn with_full_exchange(mut self, enabled: bool) -> Self {
        self.full_exchange = enabled;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn log_prompt(&self, provider: &str, file_path: &str, prompt: &str) {
        let entry = format!(
            "\n\n===== PROMPT LOG [{}] =====\nProvider: {}\nFile: {}\n\n{}\n===== END PROMPT LOG =====\n",
            Utc::now().to_rfc3339(),
            provider,
            file_path,
            prompt
        );
        self.append(&entry).await;
    }

    /// Record a raw answer; a no-op unless full exchange logging is on.
    pub async fn log_response(&self, provider: &str, file_path: &str, response: &str) {
        if !self.full_exchange {
            return;
        }
        let entry = format!(
            "\n\n===== RESPONSE LOG [{}] =====\nProvider: {}\nFile: {}\n\n{}\n===== END RESPONSE LOG =====\n",
            Utc::now().to_rfc3339(),
            provider,
            file_path,
            response
        );
        self.append(&entry).await;
    }

    async fn append(&self, entry: &str) {
        let mut guard = self.file.lock().await;
        let Some(file) = guard.as_mut() else { return };
        let written = async {
            file.write_all(entry.as_bytes()).await?;
            file.flush().await
        }
        .await;
        if let Err(e) = written {
            warn!(path = %self.path.display(), error = %e, "Failed to write prompt log; disabling it");
            *guard = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_prompt_log_appends_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("prompt.log");
        let logger = PromptLogger::open(&path).await.unwrap();

        logger.log_prompt("openai", "a.go", "review a.go").await;
        logger.log_prompt("openai", "b.go", "review b.go").await;
        logger.log_response("openai", "b.go", "ignored").await;

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(text.matches("===== PROMPT LOG [").count(), 2);
        assert!(text.contains("File: a.go\n\nreview a.go\n===== END PROMPT LOG ====="));
        assert!(!text.contains("RESPONSE LOG"));
    }

    #[tokio::test]
    async fn test_full_exchange_records_responses() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("exchange.log");
        let logger = PromptLogger::open(&path).await.unwrap().with_full_exchange(true);

        logger.log_response("anthropic", "x.rs", "{\"issues\": []}").await;

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(text.contains("===== RESPONSE LOG ["));
        assert!(text.contains("Provider: anthropic"));
    }
}
