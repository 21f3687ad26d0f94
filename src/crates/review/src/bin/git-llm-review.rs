//! git-llm-review - review staged (or all) git changes with an LLM
//!
//! Main entry point for the command-line tool.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use llm::ProviderRegistry;
use llm_review::config::{ConfigLoader, ReviewConfig};
use llm_review::logging::{init_logging, PromptLogger};
use llm_review::report::{render_terminal, write_markdown};
use llm_review::{
    ConsoleTracker, GitRepository, ProgressReporter, Repository, ReviewFileProcessor, ReviewMode,
    RunnerConfig, ShutdownCoordinator, TaskRunner,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Default prompt log file for `--log-prompts`.
const DEFAULT_PROMPT_LOG: &str = "prompt.log";

#[derive(Parser, Debug)]
#[command(name = "git-llm-review")]
#[command(about = "Review git changes with a large language model", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file (YAML or TOML), applied over user and project config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Review staged and unstaged changes plus untracked files
    #[arg(short, long)]
    all: bool,

    /// LLM provider name (see --list-providers)
    #[arg(short, long)]
    provider: Option<String>,

    /// Model name
    #[arg(short, long)]
    model: Option<String>,

    /// Maximum number of files reviewed at once
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Deadline for the whole run, in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Write a markdown report to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Append every prompt to prompt.log (or logging.prompt_log_path)
    #[arg(short = 'x', long)]
    log_prompts: bool,

    /// Also log raw model answers next to the prompts
    #[arg(long)]
    log_full_exchange: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// List available providers and exit
    #[arg(long)]
    list_providers: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut ReviewConfig) {
        if let Some(provider) = &self.provider {
            config.llm.provider = provider.clone();
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency.max_tasks = concurrency;
        }
        if let Some(timeout) = self.timeout {
            config.concurrency.run_timeout_secs = timeout;
        }
        if (self.log_prompts || self.log_full_exchange) && config.logging.prompt_log_path.is_none()
        {
            config.logging.prompt_log_path = Some(DEFAULT_PROMPT_LOG.to_string());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let registry = ProviderRegistry::with_defaults();
    if cli.list_providers {
        for name in registry.available() {
            let url = registry.default_base_url(&name).unwrap_or_default();
            println!("{}  {}", name.bold(), url);
        }
        return Ok(());
    }

    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let repo = GitRepository::discover(&cwd, Vec::new())
        .await
        .context("Not in a Git repository")?;

    let mut loader = ConfigLoader::new(repo.root());
    if let Some(path) = &cli.config {
        loader = loader.with_explicit(path);
    }
    let mut config = loader.load().await.context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    init_logging(&config.logging, cli.verbose)?;
    info!(root = %repo.root().display(), "Git repository detected");
    debug!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        max_tasks = config.concurrency.max_tasks,
        run_timeout_secs = config.concurrency.run_timeout_secs,
        max_retries = config.retry.max_retries,
        "Effective configuration"
    );

    let provider = registry
        .create(&config.llm.provider, config.llm.provider_config())
        .with_context(|| format!("Failed to create LLM provider '{}'", config.llm.provider))?;

    let repo = repo.with_extensions(config.extensions.clone());
    let mode = if cli.all { ReviewMode::All } else { ReviewMode::Staged };
    let files = repo
        .changed_files(mode)
        .await
        .context("Failed to collect changed files")?;

    if files.is_empty() {
        println!("{}", "No files to review.".yellow());
        return Ok(());
    }

    println!("Git repository: {}", repo.root().display());
    println!("Files to review:");
    for file in &files {
        println!("  {} {}", file.status.code(), file.path);
    }
    println!();

    let mut processor = ReviewFileProcessor::new(
        Arc::new(repo.clone()),
        provider,
        config.retry.to_policy(),
    );
    if let Some(path) = &config.logging.prompt_log_path {
        let logger = PromptLogger::open(path)
            .await
            .with_context(|| format!("Failed to open prompt log {}", path))?
            .with_full_exchange(cli.log_full_exchange);
        processor = processor.with_prompt_log(Arc::new(logger));
    }

    let shutdown = ShutdownCoordinator::new();
    let signals = shutdown.install_signal_handlers();

    let (reporter, events) = ProgressReporter::channel();
    let tracker = ConsoleTracker::new().spawn(events);

    let runner =
        TaskRunner::new(RunnerConfig::from(&config.concurrency)).with_progress(reporter);
    let run = runner
        .run_with_cancel(files, Arc::new(processor), shutdown.token())
        .await;
    drop(runner);
    let _ = tracker.await;
    signals.abort();

    print!("{}", render_terminal(&run));

    if let Some(path) = &cli.output {
        write_markdown(&run, &repo.name(), path)
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("Review report written to {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_over_config() {
        let cli = Cli::parse_from([
            "git-llm-review",
            "--provider",
            "anthropic",
            "-j",
            "2",
            "--timeout",
            "60",
            "-x",
        ]);
        let mut config = ReviewConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.llm.model, "gpt-4");
        assert_eq!(config.concurrency.max_tasks, 2);
        assert_eq!(config.concurrency.run_timeout_secs, 60);
        assert_eq!(config.logging.prompt_log_path.as_deref(), Some(DEFAULT_PROMPT_LOG));
    }

    #[test]
    fn test_configured_prompt_log_path_wins() {
        let cli = Cli::parse_from(["git-llm-review", "--log-prompts"]);
        let mut config = ReviewConfig::default();
        config.logging.prompt_log_path = Some("logs/prompts.log".into());
        cli.apply_overrides(&mut config);
        assert_eq!(config.logging.prompt_log_path.as_deref(), Some("logs/prompts.log"));
    }
}
