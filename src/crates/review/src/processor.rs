//! Per-file review: diff, prompt, model call and answer parsing.

use crate::error::{Result, ReviewError};
use crate::git::Repository;
use crate::logging::PromptLogger;
use crate::parse::{parse_review_detailed, ParseStage, ReviewResult};
use crate::prompt::PromptBuilder;
use crate::retry::{llm_request_with_retry, RetryPolicy};
use crate::runner::{FileReviewer, FileTask};
use async_trait::async_trait;
use llm::{CompletionRequest, LlmProvider};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Reviews one file with a model. The steps for a file run strictly in
/// sequence; the cancellation token is checked between them.
pub struct ReviewFileProcessor {
    repository: Arc<dyn Repository>,
    provider: Arc<dyn LlmProvider>,
    prompts: PromptBuilder,
    policy: RetryPolicy,
    prompt_log: Option<Arc<PromptLogger>>,
}

impl ReviewFileProcessor {
    pub fn new(
        repository: Arc<dyn Repository>,
        provider: Arc<dyn LlmProvider>,
        policy: RetryPolicy,
    ) -> Self {
        let prompts = PromptBuilder::for_provider(provider.name());
        Self {
            repository,
            provider,
            prompts,
            policy,
            prompt_log: None,
        }
    }

    pub fn with_prompt_builder(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_prompt_log(mut self, logger: Arc<PromptLogger>) -> Self {
        self.prompt_log = Some(logger);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

fn ensure_active(cancel: &CancellationToken, step: &str) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(ReviewError::Cancelled(format!("cancelled before {}", step)));
    }
    Ok(())
}

#[async_trait]
impl FileReviewer for ReviewFileProcessor {
    async fn review(&self, cancel: &CancellationToken, task: &FileTask) -> Result<ReviewResult> {
        ensure_active(cancel, "diff")?;
        let diff = self.repository.file_diff(task).await?;

        ensure_active(cancel, "content fetch")?;
        let content = match self.repository.file_content(task).await {
            Ok(content) => Some(content),
            Err(e) => {
                warn!(file = %task.path, error = %e, "Failed to get file content, reviewing diff only");
                None
            }
        };

        let prompt = self.prompts.render(task, &diff, content.as_deref());
        if let Some(log) = &self.prompt_log {
            log.log_prompt(self.provider.name(), &task.path, &prompt).await;
        }

        ensure_active(cancel, "model request")?;
        let request = CompletionRequest::new(prompt).with_system(self.prompts.system_prompt());
        let operation = format!("review {}", task.path);
        debug!(
            file = %task.path,
            provider = %self.provider.name(),
            model = %self.provider.model(),
            "Sending review request"
        );

        let reply = llm_request_with_retry(&self.policy, &operation, cancel, || {
            self.provider.send(&request)
        })
        .await?;
        let text = self.provider.parse_reply(&reply)?;

        if let Some(log) = &self.prompt_log {
            log.log_response(self.provider.name(), &task.path, &text).await;
        }

        let outcome = parse_review_detailed(&text);
        match outcome.stage {
            ParseStage::Failed => warn!(
                file = %task.path,
                answer_len = text.len(),
                "Model answer could not be interpreted, reporting no issues"
            ),
            stage => info!(
                file = %task.path,
                stage = %stage,
                issues = outcome.result.issue_count(),
                diffs = outcome.result.diff_count(),
                "Reviewed file"
            ),
        }
        Ok(outcome.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_active() {
        let token = CancellationToken::new();
        assert!(ensure_active(&token, "diff").is_ok());
        token.cancel();
        let err = ensure_active(&token, "diff").unwrap_err();
        assert!(err.is_cancelled());
    }
}
