//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use llm::{CompletionRequest, HttpReply, LlmError, LlmProvider};
use llm_review::git::Repository;
use llm_review::{ChangeScope, ChangeStatus, FileTask, RetryPolicy, ReviewError, ReviewMode};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const EMPTY_REVIEW: &str = r#"{"issues": [], "diffs": []}"#;

pub fn task(path: &str) -> FileTask {
    FileTask::new(path, ChangeStatus::Modified, ChangeScope::Staged)
}

pub fn tasks(paths: &[&str]) -> Vec<FileTask> {
    paths.iter().map(|p| task(p)).collect()
}

/// Millisecond delays and no jitter so retry tests stay fast and exact.
pub fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy::default()
        .with_max_retries(max_retries)
        .with_initial_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(5))
        .with_jitter_factor(0.0)
}

/// One scripted provider answer.
#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(u16, String),
    Timeout,
}

/// Provider that plays back scripted answers, then repeats a fallback.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Scripted,
    calls: AtomicUsize,
    prompts: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Scripted>, fallback_body: &str) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Scripted::Reply(200, fallback_body.to_string()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always(body: &str) -> Self {
        Self::new(Vec::new(), body)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn send(&self, request: &CompletionRequest) -> llm::Result<HttpReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(request.clone());
        let next = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match next {
            Scripted::Reply(status, body) => Ok(HttpReply::new(status, body)),
            Scripted::Timeout => Err(LlmError::Timeout("scripted timeout".into())),
        }
    }

    fn parse_reply(&self, reply: &HttpReply) -> llm::Result<String> {
        Ok(reply.body.clone())
    }
}

/// In-memory repository: path -> (diff, content).
#[derive(Default)]
pub struct MemoryRepository {
    root: PathBuf,
    files: HashMap<String, (String, Option<String>)>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/repo"),
            files: HashMap::new(),
        }
    }

    pub fn with_file(mut self, path: &str, diff: &str, content: Option<&str>) -> Self {
        self.files.insert(
            path.to_string(),
            (diff.to_string(), content.map(str::to_string)),
        );
        self
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn changed_files(&self, _mode: ReviewMode) -> llm_review::Result<Vec<FileTask>> {
        let mut paths: Vec<_> = self.files.keys().cloned().collect();
        paths.sort();
        Ok(paths.iter().map(|p| task(p)).collect())
    }

    async fn file_diff(&self, task: &FileTask) -> llm_review::Result<String> {
        self.files
            .get(&task.path)
            .map(|(diff, _)| diff.clone())
            .ok_or_else(|| ReviewError::Repository(format!("unknown file {}", task.path)))
    }

    async fn file_content(&self, task: &FileTask) -> llm_review::Result<String> {
        self.files
            .get(&task.path)
            .and_then(|(_, content)| content.clone())
            .ok_or_else(|| ReviewError::Repository(format!("no content for {}", task.path)))
    }
}
