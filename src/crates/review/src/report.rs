//! Rendering of run results for the terminal and as a markdown report.

use crate::error::Result;
use crate::parse::{Issue, ReviewResult};
use crate::runner::RunResult;
use chrono::Utc;
use colored::Colorize;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;

/// Category label from an issue title prefix such as "Bug: ...".
pub fn issue_category(title: &str) -> String {
    let Some((prefix, _)) = title.split_once(':') else {
        return "General".to_string();
    };
    let prefix = prefix.trim();
    match prefix.to_ascii_lowercase().as_str() {
        "bug" => "Bug".to_string(),
        "style" | "formatting" => "Style".to_string(),
        "performance" | "perf" | "efficiency" => "Performance".to_string(),
        "security" => "Security".to_string(),
        "maintainability" | "maintenance" | "maintain" | "readability" => {
            "Maintainability".to_string()
        }
        "documentation" | "doc" => "Documentation".to_string(),
        "unused" => "Unused".to_string(),
        "refactor" => "Refactor".to_string(),
        _ if prefix.starts_with(|c: char| c.is_ascii_uppercase()) => prefix.to_string(),
        _ => "General".to_string(),
    }
}

fn colorize_diff_line(line: &str) -> String {
    if line.starts_with("@@") {
        line.cyan().to_string()
    } else if line.starts_with('+') && !line.starts_with("+++") {
        line.green().to_string()
    } else if line.starts_with('-') && !line.starts_with("---") {
        line.red().to_string()
    } else {
        line.to_string()
    }
}

fn render_issue(out: &mut String, index: usize, issue: &Issue) {
    let _ = writeln!(
        out,
        "  {} {}",
        format!("{}.", index + 1).bold(),
        issue.title.yellow().bold()
    );
    for line in issue.explanation.lines() {
        let _ = writeln!(out, "     {}", line);
    }
    if !issue.diff.is_empty() {
        for line in issue.diff.lines() {
            let _ = writeln!(out, "     {}", colorize_diff_line(line));
        }
    }
}

/// Terminal rendering of one file's review.
pub fn render_file(path: &str, result: &ReviewResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", format!("=== {} ===", path).blue().bold());

    if result.is_empty() {
        let _ = writeln!(out, "  {}", "No issues found.".green());
        return out;
    }

    let _ = writeln!(out, "  Found {} issues:", result.issue_count());
    for (i, issue) in result.issues.iter().enumerate() {
        render_issue(&mut out, i, issue);
    }

    for diff in &result.diffs {
        let _ = writeln!(out, "\n  {} {}", "Suggested diff for".bold(), diff.file.bold());
        for line in diff.diff.lines() {
            let _ = writeln!(out, "  {}", colorize_diff_line(line));
        }
    }
    out
}

/// Terminal rendering of a whole run: successes, then errors, then totals.
pub fn render_terminal(run: &RunResult) -> String {
    let mut out = String::new();

    for (path, result) in run.sorted_results() {
        out.push_str(&render_file(path, result));
        out.push('\n');
    }

    let errors = run.sorted_errors();
    if !errors.is_empty() {
        let _ = writeln!(out, "{}", "Errors:".red().bold());
        for (path, error) in errors {
            let _ = writeln!(out, "  {} [{}] {}", path.bold(), error.category(), error);
        }
        out.push('\n');
    }

    let stats = &run.stats;
    let summary = format!(
        "Reviewed {} files in {:.1}s: {} succeeded, {} failed ({} cancelled), {} issues, {} diffs",
        stats.total,
        stats.duration.as_secs_f64(),
        stats.succeeded,
        stats.failed,
        stats.cancelled,
        stats.total_issues,
        stats.total_diffs
    );
    if stats.failed > 0 {
        let _ = writeln!(out, "{}", summary.yellow());
    } else {
        let _ = writeln!(out, "{}", summary.green());
    }
    out
}

fn fenced_diff(diff: &str) -> String {
    let body = diff
        .trim()
        .trim_start_matches("```diff")
        .trim_end_matches("```")
        .trim_matches('\n');
    format!("```diff\n{}\n```", body)
}

/// Markdown report with one section per file.
pub fn render_markdown(run: &RunResult, repo_name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Code Review Report\n");
    let _ = writeln!(out, "Repository: {}\n", repo_name);
    let _ = writeln!(out, "Generated on: {}\n", Utc::now().to_rfc2822());
    let stats = &run.stats;
    let _ = writeln!(
        out,
        "Files reviewed: {}, issues: {}, failed: {}\n",
        stats.total, stats.total_issues, stats.failed
    );

    for (path, result) in run.sorted_results() {
        let _ = writeln!(out, "## File: {}\n", path);
        if result.issues.is_empty() {
            let _ = writeln!(out, "No issues found in this file.\n");
        }

        let mut by_category: BTreeMap<String, Vec<&Issue>> = BTreeMap::new();
        for issue in &result.issues {
            by_category
                .entry(issue_category(&issue.title))
                .or_default()
                .push(issue);
        }
        for (category, issues) in by_category {
            let _ = writeln!(out, "### {} Issues\n", category);
            for issue in issues {
                let _ = writeln!(out, "#### {}\n\n{}\n", issue.title, issue.explanation);
                if !issue.diff.is_empty() {
                    let _ = writeln!(out, "{}\n", fenced_diff(&issue.diff));
                }
            }
        }

        for diff in &result.diffs {
            let _ = writeln!(out, "### Suggested changes: {}\n", diff.file);
            let _ = writeln!(out, "{}\n", fenced_diff(&diff.diff));
        }
    }

    let errors = run.sorted_errors();
    if !errors.is_empty() {
        let _ = writeln!(out, "## Errors\n");
        for (path, error) in errors {
            let _ = writeln!(out, "- `{}` ({}): {}", path, error.category(), error);
        }
    }
    out
}

/// Write the markdown report, creating parent directories.
pub async fn write_markdown(run: &RunResult, repo_name: &str, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(path, render_markdown(run, repo_name)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReviewError;
    use crate::parse::FileDiff;
    use crate::runner::RunStats;
    use std::collections::HashMap;
    use std::time::Duration;

    fn sample_run() -> RunResult {
        let mut results = HashMap::new();
        results.insert(
            "b.go".to_string(),
            ReviewResult {
                issues: vec![
                    Issue {
                        title: "Bug: nil map write".into(),
                        explanation: "initialize the map".into(),
                        file: "b.go".into(),
                        diff: String::new(),
                    },
                    Issue {
                        title: "naming".into(),
                        explanation: "rename x".into(),
                        file: "b.go".into(),
                        diff: String::new(),
                    },
                ],
                diffs: vec![FileDiff {
                    file: "b.go".into(),
                    diff: "@@ -1 +1 @@\n-var m map[string]int\n+m := map[string]int{}".into(),
                }],
            },
        );
        results.insert("a.go".to_string(), ReviewResult::default());
        let mut errors = HashMap::new();
        errors.insert(
            "c.go".to_string(),
            ReviewError::Cancelled("run deadline exceeded".into()),
        );
        RunResult {
            results,
            errors,
            stats: RunStats {
                total: 3,
                succeeded: 2,
                failed: 1,
                cancelled: 1,
                total_issues: 2,
                total_diffs: 1,
                started_at: Utc::now(),
                duration: Duration::from_millis(1500),
            },
        }
    }

    #[test]
    fn test_issue_category() {
        assert_eq!(issue_category("Bug: off by one"), "Bug");
        assert_eq!(issue_category("perf: allocation in loop"), "Performance");
        assert_eq!(issue_category("Concurrency: data race"), "Concurrency");
        assert_eq!(issue_category("lowercase: thing"), "General");
        assert_eq!(issue_category("No prefix"), "General");
    }

    #[test]
    fn test_terminal_report_lists_results_errors_and_summary() {
        colored::control::set_override(false);
        let text = render_terminal(&sample_run());
        let a = text.find("=== a.go ===").unwrap();
        let b = text.find("=== b.go ===").unwrap();
        assert!(a < b);
        assert!(text.contains("1. Bug: nil map write"));
        assert!(text.contains("+m := map[string]int{}"));
        assert!(text.contains("c.go [cancelled]"));
        assert!(text.contains("Reviewed 3 files in 1.5s: 2 succeeded, 1 failed (1 cancelled)"));
    }

    #[test]
    fn test_markdown_report() {
        let md = render_markdown(&sample_run(), "demo");
        assert!(md.starts_with("# Code Review Report"));
        assert!(md.contains("## File: a.go\n\nNo issues found in this file."));
        assert!(md.contains("### Bug Issues"));
        assert!(md.contains("### General Issues"));
        assert!(md.contains("```diff\n@@ -1 +1 @@"));
        assert!(md.contains("- `c.go` (cancelled)"));
    }

    #[test]
    fn test_fenced_diff_is_not_double_wrapped() {
        assert_eq!(fenced_diff("```diff\n-a\n+b\n```"), "```diff\n-a\n+b\n```");
        assert_eq!(fenced_diff("-a"), "```diff\n-a\n```");
    }

    #[tokio::test]
    async fn test_write_markdown_creates_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("reports").join("review.md");
        write_markdown(&sample_run(), "demo", &path).await.unwrap();
        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(text.contains("Repository: demo"));
    }
}
