//! Bounded-concurrency review runner.
//!
//! One task is spawned per file. Each task must hold one of
//! `max_concurrency` semaphore permits while it talks to the model; waiting
//! for a permit and the review itself both race the run's cancellation
//! token, which fires on the run deadline or on an external cancel. The
//! runner always joins every task before returning.

pub mod task;

pub use task::{ChangeScope, ChangeStatus, FileTask};

use crate::config::ConcurrencyConfig;
use crate::error::{Result, ReviewError};
use crate::parse::ReviewResult;
use crate::progress::{ProgressEvent, ProgressReporter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Runner settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Upper bound on simultaneously running reviews
    pub max_concurrency: usize,
    /// Deadline for the whole run
    pub run_timeout: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            run_timeout: None,
        }
    }
}

impl RunnerConfig {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency,
            ..Default::default()
        }
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }
}

impl From<&ConcurrencyConfig> for RunnerConfig {
    fn from(config: &ConcurrencyConfig) -> Self {
        Self {
            max_concurrency: config.max_tasks,
            run_timeout: (config.run_timeout_secs > 0)
                .then(|| Duration::from_secs(config.run_timeout_secs)),
        }
    }
}

/// Reviews a single file. Implementations run the retry-wrapped model call
/// and parse its answer; `cancel` fires when the run is cancelled.
#[async_trait]
pub trait FileReviewer: Send + Sync + 'static {
    async fn review(&self, cancel: &CancellationToken, task: &FileTask) -> Result<ReviewResult>;
}

#[async_trait]
impl<F, Fut> FileReviewer for F
where
    F: Fn(CancellationToken, FileTask) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ReviewResult>> + Send + 'static,
{
    async fn review(&self, cancel: &CancellationToken, task: &FileTask) -> Result<ReviewResult> {
        (self)(cancel.clone(), task.clone()).await
    }
}

/// Counters for a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Subset of `failed` that ended in cancellation
    pub cancelled: usize,
    pub total_issues: usize,
    pub total_diffs: usize,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

/// Aggregate outcome of a run: every path appears in exactly one map.
#[derive(Debug)]
pub struct RunResult {
    pub results: HashMap<String, ReviewResult>,
    pub errors: HashMap<String, ReviewError>,
    pub stats: RunStats,
}

impl RunResult {
    /// Successful results ordered by path.
    pub fn sorted_results(&self) -> Vec<(&String, &ReviewResult)> {
        let mut entries: Vec<_> = self.results.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// Errors ordered by path.
    pub fn sorted_errors(&self) -> Vec<(&String, &ReviewError)> {
        let mut entries: Vec<_> = self.errors.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Default)]
struct SharedOutcomes {
    results: Mutex<HashMap<String, ReviewResult>>,
    errors: Mutex<HashMap<String, ReviewError>>,
}

/// Why the run token fired.
#[derive(Clone)]
struct CancelCause {
    deadline_hit: Arc<AtomicBool>,
    run_timeout: Option<Duration>,
}

impl CancelCause {
    fn describe(&self, what: &str) -> String {
        match self.run_timeout {
            Some(timeout) if self.deadline_hit.load(Ordering::SeqCst) => {
                format!("run deadline of {:?} exceeded {}", timeout, what)
            }
            _ => format!("run cancelled {}", what),
        }
    }
}

/// Executes file reviews with bounded concurrency.
#[derive(Debug, Clone, Default)]
pub struct TaskRunner {
    config: RunnerConfig,
    progress: Option<ProgressReporter>,
}

impl TaskRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            progress: None,
        }
    }

    /// Send progress events to `reporter`.
    pub fn with_progress(mut self, reporter: ProgressReporter) -> Self {
        self.progress = Some(reporter);
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Review every file; see [`TaskRunner::run_with_cancel`].
    pub async fn run<R>(&self, files: Vec<FileTask>, reviewer: Arc<R>) -> RunResult
    where
        R: FileReviewer + ?Sized,
    {
        self.run_with_cancel(files, reviewer, CancellationToken::new())
            .await
    }

    /// Review every file, stopping early when `cancel` fires or the run
    /// deadline elapses. Files not yet admitted at that point are recorded
    /// as cancelled without calling the reviewer.
    pub async fn run_with_cancel<R>(
        &self,
        files: Vec<FileTask>,
        reviewer: Arc<R>,
        cancel: CancellationToken,
    ) -> RunResult
    where
        R: FileReviewer + ?Sized,
    {
        let started_at = Utc::now();
        let start = Instant::now();
        let token = cancel.child_token();
        let files = dedup_by_path(files);
        let total = files.len();
        let max_concurrency = self.config.max_concurrency.max(1);

        self.emit(ProgressEvent::started(total));
        info!(
            files = total,
            max_concurrency,
            run_timeout = ?self.config.run_timeout,
            "Starting review run"
        );

        let cause = CancelCause {
            deadline_hit: Arc::new(AtomicBool::new(false)),
            run_timeout: self.config.run_timeout,
        };
        let deadline_timer = self.config.run_timeout.map(|timeout| {
            let token = token.clone();
            let deadline_hit = cause.deadline_hit.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(timeout) => {
                        deadline_hit.store(true, Ordering::SeqCst);
                        warn!(
                            timeout_ms = timeout.as_millis() as u64,
                            "Run deadline exceeded, cancelling"
                        );
                        token.cancel();
                    }
                }
            })
        });

        let semaphore = Arc::new(Semaphore::new(max_concurrency));
        let shared = Arc::new(SharedOutcomes::default());
        let mut join_set = JoinSet::new();

        for task in files {
            let semaphore = semaphore.clone();
            let token = token.clone();
            let reviewer = reviewer.clone();
            let shared = shared.clone();
            let progress = self.progress.clone();
            let cause = cause.clone();

            join_set.spawn(async move {
                let path = task.path.clone();
                let emit = |event: ProgressEvent| {
                    if let Some(progress) = &progress {
                        progress.emit(event);
                    }
                };

                let permit = tokio::select! {
                    biased;
                    _ = token.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let Some(permit) = permit else {
                    let err = ReviewError::Cancelled(cause.describe("before review started"));
                    debug!(file = %path, "Not admitted before cancellation");
                    emit(ProgressEvent::file_failed(&path, err.to_string()));
                    shared.errors.lock().insert(path, err);
                    return;
                };

                emit(ProgressEvent::file_started(&path));
                debug!(file = %path, "Review started");

                let outcome = tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        Err(ReviewError::Cancelled(cause.describe("during review")))
                    }
                    caught = AssertUnwindSafe(reviewer.review(&token, &task)).catch_unwind() => {
                        caught.unwrap_or_else(|panic| Err(ReviewError::Panicked(panic_message(panic))))
                    }
                };

                // Free the slot before bookkeeping so queued files proceed.
                drop(permit);

                match outcome {
                    Ok(result) => {
                        info!(
                            file = %path,
                            issues = result.issue_count(),
                            diffs = result.diff_count(),
                            "Review completed"
                        );
                        emit(ProgressEvent::file_completed(&path, result.issue_count()));
                        shared.results.lock().insert(path, result);
                    }
                    Err(err) => {
                        warn!(file = %path, category = err.category(), error = %err, "Review failed");
                        emit(ProgressEvent::file_failed(&path, err.to_string()));
                        shared.errors.lock().insert(path, err);
                    }
                }
            });
        }

        while let Some(joined) = join_set.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Review task terminated abnormally");
            }
        }

        if let Some(timer) = deadline_timer {
            timer.abort();
        }

        let results = std::mem::take(&mut *shared.results.lock());
        let errors = std::mem::take(&mut *shared.errors.lock());
        let stats = RunStats {
            total,
            succeeded: results.len(),
            failed: errors.len(),
            cancelled: errors.values().filter(|e| e.is_cancelled()).count(),
            total_issues: results.values().map(ReviewResult::issue_count).sum(),
            total_diffs: results.values().map(ReviewResult::diff_count).sum(),
            started_at,
            duration: start.elapsed(),
        };

        self.emit(ProgressEvent::finished(
            stats.succeeded,
            stats.failed,
            stats.duration,
        ));
        info!(
            succeeded = stats.succeeded,
            failed = stats.failed,
            cancelled = stats.cancelled,
            issues = stats.total_issues,
            duration_ms = stats.duration.as_millis() as u64,
            "Review run finished"
        );

        RunResult {
            results,
            errors,
            stats,
        }
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(progress) = &self.progress {
            progress.emit(event);
        }
    }
}

fn dedup_by_path(files: Vec<FileTask>) -> Vec<FileTask> {
    let mut seen = HashSet::new();
    files
        .into_iter()
        .filter(|task| {
            let first = seen.insert(task.path.clone());
            if !first {
                warn!(file = %task.path, "Skipping duplicate file task");
            }
            first
        })
        .collect()
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
