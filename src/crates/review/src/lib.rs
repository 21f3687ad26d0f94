//! # llm-review - concurrent LLM code review of git changes
//!
//! Reviews every changed file of a repository with a language model and
//! collects structured findings per file.
//!
//! ## Features
//!
//! - **Bounded concurrency** - at most `max_tasks` files talk to the model at
//!   once; a run deadline or Ctrl+C cancels the rest cleanly
//! - **Retrying transport** - exponential back-off with jitter for rate limits,
//!   timeouts and server errors; client errors fail fast
//! - **Resilient parsing** - model answers are decoded through progressively
//!   more forgiving stages and never fail the review
//! - **Failure isolation** - one file's error or panic never affects another
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use llm_review::{
//!     CancellationToken, ChangeScope, ChangeStatus, FileTask, ReviewResult, RunnerConfig, TaskRunner,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> llm_review::Result<()> {
//! let runner = TaskRunner::new(RunnerConfig::new(4));
//! let files = vec![FileTask::new("main.go", ChangeStatus::Modified, ChangeScope::Staged)];
//! let run = runner
//!     .run(files, Arc::new(|_cancel: CancellationToken, _task: FileTask| async move {
//!         Ok::<_, llm_review::ReviewError>(ReviewResult::default())
//!     }))
//!     .await;
//! println!("{} issues", run.stats.total_issues);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod git;
pub mod logging;
pub mod parse;
pub mod processor;
pub mod progress;
pub mod prompt;
pub mod report;
pub mod retry;
pub mod runner;
pub mod shutdown;

mod error;

pub use config::{load_config, ReviewConfig};
pub use git::{GitRepository, Repository, ReviewMode};
pub use parse::{parse_review, parse_review_detailed, FileDiff, Issue, ParseStage, ReviewResult};
pub use processor::ReviewFileProcessor;
pub use progress::{ConsoleTracker, ProgressEvent, ProgressReporter};
pub use retry::{llm_request_with_retry, retry_with_backoff, Cancelled, RetryPolicy};
pub use runner::{
    ChangeScope, ChangeStatus, FileReviewer, FileTask, RunResult, RunStats, RunnerConfig,
    TaskRunner,
};
pub use shutdown::ShutdownCoordinator;
pub use tokio_util::sync::CancellationToken;

pub use error::{Result, ReviewError};
