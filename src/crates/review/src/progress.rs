//! Progress events for a review run.
//!
//! The runner emits events through a [`ProgressReporter`], which only pushes
//! into an unbounded channel: a slow or absent consumer can never block or
//! fail the run.

use chrono::Utc;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Event types for review progress tracking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Run started
    Started { total: usize, timestamp: i64 },
    /// A file was admitted and its review began
    FileStarted { path: String, timestamp: i64 },
    /// A file review finished successfully
    FileCompleted {
        path: String,
        issue_count: usize,
        timestamp: i64,
    },
    /// A file review failed or was cancelled
    FileFailed {
        path: String,
        message: String,
        timestamp: i64,
    },
    /// Every task has terminated
    Finished {
        completed: usize,
        failed: usize,
        duration_ms: u64,
        timestamp: i64,
    },
}

impl ProgressEvent {
    pub fn started(total: usize) -> Self {
        ProgressEvent::Started {
            total,
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn file_started(path: impl Into<String>) -> Self {
        ProgressEvent::FileStarted {
            path: path.into(),
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn file_completed(path: impl Into<String>, issue_count: usize) -> Self {
        ProgressEvent::FileCompleted {
            path: path.into(),
            issue_count,
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn file_failed(path: impl Into<String>, message: impl Into<String>) -> Self {
        ProgressEvent::FileFailed {
            path: path.into(),
            message: message.into(),
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn finished(completed: usize, failed: usize, duration: Duration) -> Self {
        ProgressEvent::Finished {
            completed,
            failed,
            duration_ms: duration.as_millis() as u64,
            timestamp: Utc::now().timestamp(),
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            ProgressEvent::Started { total, .. } => {
                format!("Starting code review of {} files...", total)
            }
            ProgressEvent::FileStarted { path, .. } => format!("Reviewing {}", path),
            ProgressEvent::FileCompleted {
                path, issue_count, ..
            } => format!("{}: {} issues", path, issue_count),
            ProgressEvent::FileFailed { path, message, .. } => {
                format!("{}: error: {}", path, message)
            }
            ProgressEvent::Finished {
                completed,
                failed,
                duration_ms,
                ..
            } => format!(
                "Code review completed in {:.1}s: {} completed, {} errors",
                *duration_ms as f64 / 1000.0,
                completed,
                failed
            ),
        }
    }
}

/// Fire-and-forget sender half of a progress channel.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressReporter {
    /// Create a reporter and the receiver its events arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Send an event; a dropped receiver is ignored.
    pub fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}

/// Renders progress events as a console progress bar.
pub struct ConsoleTracker {
    bar: ProgressBar,
    in_flight: BTreeSet<String>,
}

impl ConsoleTracker {
    /// Draw to stderr.
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Draw nowhere; still tracks counts.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), target);
        let style = ProgressStyle::with_template(
            "{spinner} [{bar:20}] {pos}/{len} files ({percent}%) {wide_msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        bar.set_style(style);
        Self {
            bar,
            in_flight: BTreeSet::new(),
        }
    }

    /// Consume events on a background task until the channel closes.
    pub fn spawn(mut self, mut rx: mpsc::UnboundedReceiver<ProgressEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                self.handle(&event);
            }
        })
    }

    /// Apply one event to the display.
    pub fn handle(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { total, .. } => {
                self.bar.set_length(*total as u64);
                self.bar.set_position(0);
                self.bar.enable_steady_tick(Duration::from_millis(100));
                self.bar.println(event.description());
            }
            ProgressEvent::FileStarted { path, .. } => {
                self.in_flight.insert(path.clone());
                self.refresh_message();
            }
            ProgressEvent::FileCompleted { path, .. } | ProgressEvent::FileFailed { path, .. } => {
                self.in_flight.remove(path);
                self.bar.inc(1);
                if matches!(event, ProgressEvent::FileFailed { .. }) {
                    self.bar.println(event.description());
                }
                self.refresh_message();
            }
            ProgressEvent::Finished { .. } => {
                self.bar.finish_and_clear();
                self.bar.println(event.description());
            }
        }
    }

    /// Number of files reported as terminated.
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    fn refresh_message(&self) {
        let message = match self.in_flight.iter().next() {
            Some(first) if self.in_flight.len() > 1 => {
                format!("{} (+{} more)", truncate_path(first, 30), self.in_flight.len() - 1)
            }
            Some(first) => truncate_path(first, 30),
            None => String::new(),
        };
        self.bar.set_message(message);
    }
}

impl Default for ConsoleTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep the tail of a long path, prefixed with "...".
fn truncate_path(path: &str, max_chars: usize) -> String {
    let count = path.chars().count();
    if count <= max_chars {
        return path.to_string();
    }
    let tail: String = path.chars().skip(count - (max_chars - 3)).collect();
    format!("...{}", tail)
}
