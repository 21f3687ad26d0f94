//! Resilient parsing of LLM review answers.
//!
//! Models are asked for `{"issues": [...], "diffs": [...]}` but regularly
//! wrap it in reasoning prefaces or code fences, put raw newlines inside
//! string literals, or add conversational text around the object. The
//! pipeline tries progressively more forgiving stages and stops at the first
//! one that yields at least one issue or diff:
//!
//! 1. strip an end-of-reasoning preface and a wrapping code fence
//! 2. strict decode
//! 3. decode after literal repair
//! 4. decode the first usable balanced `{...}` object in the text
//! 5. regex/scan extraction of issues and diffs
//!
//! Parsing never fails: when nothing is recoverable the result is empty and
//! [`ParseStage::Failed`] records why.

pub mod lenient;
pub mod repair;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

pub const DEFAULT_ISSUE_TITLE: &str = "Unnamed Issue";
pub const DEFAULT_EXPLANATION: &str = "No explanation provided.";
pub const DEFAULT_ISSUE_FILE: &str = "General";

/// Objects decoded from one answer before giving up on stage 4.
const MAX_EMBEDDED_CANDIDATES: usize = 16;

/// A single review finding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub title: String,
    pub explanation: String,
    pub file: String,
    /// Legacy per-issue diff; may be empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub diff: String,
}

/// Consolidated suggested change for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub file: String,
    pub diff: String,
}

/// Structured review of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResult {
    pub issues: Vec<Issue>,
    pub diffs: Vec<FileDiff>,
}

impl ReviewResult {
    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }

    pub fn diff_count(&self) -> usize {
        self.diffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty() && self.diffs.is_empty()
    }
}

impl fmt::Display for ReviewResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "No issues found.");
        }

        writeln!(f, "Found {} issues:\n", self.issues.len())?;
        for (i, issue) in self.issues.iter().enumerate() {
            writeln!(f, "Issue {}: {}", i + 1, issue.title)?;
            writeln!(f, "Explanation: {}", issue.explanation)?;
            if !issue.diff.is_empty() {
                writeln!(f, "Suggested changes:\n```diff\n{}\n```", issue.diff)?;
            }
            writeln!(f)?;
        }

        if !self.diffs.is_empty() {
            writeln!(f, "Consolidated diffs by file:")?;
            for diff in &self.diffs {
                writeln!(f, "File: {}\n```diff\n{}\n```\n", diff.file, diff.diff)?;
            }
        }
        Ok(())
    }
}

/// Which stage produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStage {
    /// Input was empty or whitespace
    EmptyInput,
    /// Decoded as-is
    Strict,
    /// Decoded after literal repair
    Repaired,
    /// Decoded from an object embedded in surrounding text
    Embedded,
    /// Recovered by pattern extraction
    Lenient,
    /// Valid JSON that reports no issues and no diffs
    NoIssues,
    /// Nothing recoverable
    Failed,
}

impl ParseStage {
    /// True when the text could not be interpreted at all.
    pub fn is_failure(self) -> bool {
        matches!(self, ParseStage::Failed)
    }
}

impl fmt::Display for ParseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ParseStage::EmptyInput => "empty_input",
            ParseStage::Strict => "strict",
            ParseStage::Repaired => "repaired",
            ParseStage::Embedded => "embedded",
            ParseStage::Lenient => "lenient",
            ParseStage::NoIssues => "no_issues",
            ParseStage::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Parse result together with the stage that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutcome {
    pub result: ReviewResult,
    pub stage: ParseStage,
}

/// Wire shape of an answer; every field is optional so partial objects
/// still decode.
#[derive(Debug, Default, Deserialize)]
struct WireReview {
    #[serde(default)]
    issues: Option<Vec<WireIssue>>,
    #[serde(default)]
    diffs: Option<Vec<WireDiff>>,
}

#[derive(Debug, Default, Deserialize)]
struct WireIssue {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    diff: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireDiff {
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    diff: Option<String>,
}

impl From<WireReview> for ReviewResult {
    fn from(wire: WireReview) -> Self {
        ReviewResult {
            issues: wire
                .issues
                .unwrap_or_default()
                .into_iter()
                .map(|i| Issue {
                    title: i.title.unwrap_or_default(),
                    explanation: i.explanation.unwrap_or_default(),
                    file: i.file.unwrap_or_default(),
                    diff: i.diff.unwrap_or_default(),
                })
                .collect(),
            diffs: wire
                .diffs
                .unwrap_or_default()
                .into_iter()
                .map(|d| FileDiff {
                    file: d.file.unwrap_or_default(),
                    diff: d.diff.unwrap_or_default(),
                })
                .collect(),
        }
    }
}

/// Parse an answer, discarding stage information.
pub fn parse_review(text: &str) -> ReviewResult {
    parse_review_detailed(text).result
}

/// Parse an answer and report which stage succeeded.
pub fn parse_review_detailed(text: &str) -> ParseOutcome {
    if text.trim().is_empty() {
        return ParseOutcome {
            result: ReviewResult::default(),
            stage: ParseStage::EmptyInput,
        };
    }

    let cleaned = repair::strip_fence(repair::strip_reasoning(text));
    let mut decoded_empty = false;

    let mut try_decode = |candidate: &str| -> Option<ReviewResult> {
        match serde_json::from_str::<WireReview>(candidate) {
            Ok(wire) => {
                let result = ReviewResult::from(wire);
                if result.is_empty() {
                    decoded_empty = true;
                    None
                } else {
                    Some(result)
                }
            }
            Err(e) => {
                debug!(error = %e, "Review answer did not decode");
                None
            }
        }
    };

    let stage_result = try_decode(cleaned)
        .map(|r| (r, ParseStage::Strict))
        .or_else(|| {
            let repaired = repair::repair_literals(cleaned);
            if repaired == cleaned {
                return None;
            }
            try_decode(&repaired).map(|r| (r, ParseStage::Repaired))
        })
        .or_else(|| {
            repair::balanced_objects(cleaned)
                .into_iter()
                .take(MAX_EMBEDDED_CANDIDATES)
                .filter(|range| *range != (0..cleaned.len()))
                .find_map(|range| try_decode(&repair::repair_literals(&cleaned[range])))
                .map(|r| (r, ParseStage::Embedded))
        });

    let (result, stage) = match stage_result {
        Some(found) => found,
        None => {
            let lenient = ReviewResult {
                issues: lenient::extract_issues(cleaned),
                diffs: lenient::extract_diffs(cleaned),
            };
            if !lenient.is_empty() {
                (lenient, ParseStage::Lenient)
            } else if decoded_empty {
                (ReviewResult::default(), ParseStage::NoIssues)
            } else {
                (ReviewResult::default(), ParseStage::Failed)
            }
        }
    };

    let result = normalize(result);
    debug!(
        stage = %stage,
        issues = result.issue_count(),
        diffs = result.diff_count(),
        "Parsed review answer"
    );
    ParseOutcome { result, stage }
}

/// Fill blank issue fields with defaults and keep only the first diff per file.
pub fn normalize(mut result: ReviewResult) -> ReviewResult {
    for issue in &mut result.issues {
        if issue.title.trim().is_empty() {
            issue.title = DEFAULT_ISSUE_TITLE.to_string();
        }
        if issue.explanation.trim().is_empty() {
            issue.explanation = DEFAULT_EXPLANATION.to_string();
        }
        if issue.file.trim().is_empty() {
            issue.file = DEFAULT_ISSUE_FILE.to_string();
        }
    }

    // TODO: revisit first-wins once we know whether models split one file's
    // changes across several entries on purpose; concatenating may fit better.
    let mut seen = HashSet::new();
    result.diffs.retain(|d| {
        let first = seen.insert(d.file.clone());
        if !first {
            debug!(file = %d.file, "Dropping duplicate diff for file");
        }
        first
    });

    result
}
