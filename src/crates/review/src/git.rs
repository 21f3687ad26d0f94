//! Repository collaborator: changed files, per-file diffs and contents.
//!
//! The runner never talks to version control itself; it receives
//! [`FileTask`]s and asks a [`Repository`] for the text it needs.

use crate::error::{Result, ReviewError};
use crate::runner::{ChangeScope, ChangeStatus, FileTask};
use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::process::Command;
use tracing::{debug, warn};

/// Placeholder diff when git reports nothing for a file.
pub const NO_CHANGES: &str = "No changes detected.";

static HUNK_HEADER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -\d+(?:,\d+)? \+\d+(?:,\d+)? @@").expect("valid hunk header regex")
});

/// Which changes to review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewMode {
    /// Only what is in the index
    #[default]
    Staged,
    /// Staged and unstaged changes plus untracked files, one task per file
    All,
}

/// Source of files to review.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Absolute path of the working tree root.
    fn root(&self) -> &Path;

    /// Changed files matching the extension filter, sorted by path.
    async fn changed_files(&self, mode: ReviewMode) -> Result<Vec<FileTask>>;

    /// Diff text for one task, headers stripped.
    async fn file_diff(&self, task: &FileTask) -> Result<String>;

    /// Full content of the file as the review should see it.
    async fn file_content(&self, task: &FileTask) -> Result<String>;
}

/// [`Repository`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitRepository {
    root: PathBuf,
    extensions: Vec<String>,
}

impl GitRepository {
    /// Locate the repository containing `dir`.
    pub async fn discover(dir: impl AsRef<Path>, extensions: Vec<String>) -> Result<Self> {
        let dir = dir.as_ref();
        let inside = run_git(dir, &["rev-parse", "--is-inside-work-tree"])
            .await
            .map_err(|e| match e {
                ReviewError::Repository(msg) if msg.contains("not a git repository") => {
                    ReviewError::Repository(format!("{} is not a Git repository", dir.display()))
                }
                other => other,
            })?;
        if inside.trim() != "true" {
            return Err(ReviewError::Repository(format!(
                "{} is not inside a Git working tree",
                dir.display()
            )));
        }

        let root = run_git(dir, &["rev-parse", "--show-toplevel"]).await?;
        let root = PathBuf::from(root.trim());
        debug!(root = %root.display(), "Git repository detected");
        Ok(Self { root, extensions })
    }

    /// Replace the extension filter used by [`Repository::changed_files`].
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Directory name of the working tree root.
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }

    async fn git(&self, args: &[&str]) -> Result<String> {
        run_git(&self.root, args).await
    }

    async fn scoped_diff(&self, path: &str, staged: bool) -> Result<String> {
        let mut args = vec!["diff", "--no-color"];
        if staged {
            args.push("--cached");
        }
        args.extend(["--", path]);
        Ok(format_diff(&self.git(&args).await?))
    }

    async fn read_index(&self, path: &str) -> Result<String> {
        let spec = format!(":./{}", path);
        self.git(&["show", &spec]).await
    }

    async fn read_worktree(&self, path: &str) -> Result<String> {
        Ok(tokio::fs::read_to_string(self.root.join(path)).await?)
    }
}

#[async_trait]
impl Repository for GitRepository {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn changed_files(&self, mode: ReviewMode) -> Result<Vec<FileTask>> {
        let files = match mode {
            ReviewMode::Staged => {
                let output = self.git(&["diff", "--cached", "--name-status"]).await?;
                parse_name_status(&output, &self.extensions)
            }
            ReviewMode::All => {
                let output = self.git(&["status", "--porcelain"]).await?;
                parse_porcelain(&output, &self.extensions)
                    .into_iter()
                    .filter_map(UnifiedChange::into_task)
                    .collect()
            }
        };
        debug!(count = files.len(), mode = ?mode, "Collected changed files");
        Ok(files)
    }

    async fn file_diff(&self, task: &FileTask) -> Result<String> {
        match task.scope {
            ChangeScope::Staged => self.scoped_diff(&task.path, true).await,
            ChangeScope::Unstaged => self.scoped_diff(&task.path, false).await,
            ChangeScope::Unified => {
                let output = self.git(&["status", "--porcelain", "--", &task.path]).await?;
                let change = parse_porcelain(&output, &[])
                    .into_iter()
                    .find(|c| c.path == task.path)
                    .unwrap_or_else(|| UnifiedChange::new(&task.path));

                let staged = match change.staged {
                    Some(_) => Some(self.scoped_diff(&task.path, true).await?),
                    None => None,
                };
                let unstaged = match change.unstaged {
                    Some(_) => Some(self.scoped_diff(&task.path, false).await?),
                    None => None,
                };
                Ok(change.render_diff(staged.as_deref(), unstaged.as_deref()))
            }
        }
    }

    async fn file_content(&self, task: &FileTask) -> Result<String> {
        let primary = match task.scope {
            ChangeScope::Staged => self.read_index(&task.path).await,
            _ => self.read_worktree(&task.path).await,
        };
        match primary {
            Ok(content) => Ok(content),
            Err(e) => {
                debug!(file = %task.path, error = %e, "Primary content source failed, trying fallback");
                match task.scope {
                    ChangeScope::Staged => self.read_worktree(&task.path).await,
                    _ => self.read_index(&task.path).await,
                }
            }
        }
    }
}

async fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => ReviewError::Repository("git executable not found".into()),
            _ => ReviewError::Io(e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(args = %args.join(" "), status = ?output.status.code(), "git command failed");
        return Err(ReviewError::Repository(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// True when `path` ends in one of `extensions` (with or without the dot,
/// case-insensitive). An empty list accepts every path.
pub fn has_extension(path: &str, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) else {
        return false;
    };
    extensions
        .iter()
        .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

fn unquote(path: &str) -> &str {
    let path = path.trim();
    path.strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
        .unwrap_or(path)
}

/// Parse `git diff --cached --name-status`. Renames keep the new path,
/// deletions are skipped.
pub fn parse_name_status(output: &str, extensions: &[String]) -> Vec<FileTask> {
    let mut files: Vec<FileTask> = output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let fields: Vec<&str> = if line.contains('\t') {
                line.split('\t').collect()
            } else {
                line.split_whitespace().collect()
            };
            let code = *fields.first()?;
            let status = ChangeStatus::from_code(code)?;
            let path = match status {
                ChangeStatus::Renamed => fields.get(2).or_else(|| fields.get(1))?,
                ChangeStatus::Deleted => return None,
                _ => fields.get(1)?,
            };
            let path = unquote(path);
            has_extension(path, extensions)
                .then(|| FileTask::new(path, status, ChangeScope::Staged))
        })
        .collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files.dedup_by(|a, b| a.path == b.path);
    files
}

/// Index and working-tree status for one path from `git status --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnifiedChange {
    pub path: String,
    /// Index status code, e.g. "M"
    pub staged: Option<String>,
    /// Working tree status code, "??" for untracked
    pub unstaged: Option<String>,
}

impl UnifiedChange {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            staged: None,
            unstaged: None,
        }
    }

    /// Task for this change; `None` when the file is simply gone.
    pub fn into_task(self) -> Option<FileTask> {
        let is_deleted = |code: &Option<String>| code.as_deref().map_or(true, |c| c == "D");
        if is_deleted(&self.staged) && is_deleted(&self.unstaged) {
            return None;
        }
        let code = self
            .staged
            .as_deref()
            .filter(|c| *c != "D")
            .or(self.unstaged.as_deref())?;
        let status = ChangeStatus::from_code(code)?;
        Some(FileTask::new(self.path, status, ChangeScope::Unified))
    }

    /// Combine per-side diffs under `=== ... ===` headers.
    pub fn render_diff(&self, staged: Option<&str>, unstaged: Option<&str>) -> String {
        let mut out = String::new();
        if let (Some(code), Some(diff)) = (&self.staged, staged) {
            out.push_str(&format!("=== Staged changes ({}) ===\n", code));
            out.push_str(diff);
        }
        if let (Some(code), Some(diff)) = (&self.unstaged, unstaged) {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("=== Unstaged changes ({}) ===\n", code));
            out.push_str(diff);
        }
        if out.is_empty() {
            out.push_str(NO_CHANGES);
        }
        out
    }
}

/// Parse `git status --porcelain` into one entry per path.
pub fn parse_porcelain(output: &str, extensions: &[String]) -> Vec<UnifiedChange> {
    let mut by_path: BTreeMap<String, UnifiedChange> = BTreeMap::new();

    for line in output.lines() {
        if line.len() < 3 || !line.is_char_boundary(2) {
            continue;
        }
        let mut codes = line[..2].chars();
        let (x, y) = match (codes.next(), codes.next()) {
            (Some(x), Some(y)) => (x, y),
            _ => continue,
        };
        let mut path = line[2..].trim();
        if x == 'R' || y == 'R' {
            if let Some((_, new_path)) = path.split_once(" -> ") {
                path = new_path;
            }
        }
        let path = unquote(path);
        if !has_extension(path, extensions) {
            continue;
        }

        let entry = by_path
            .entry(path.to_string())
            .or_insert_with(|| UnifiedChange::new(path));
        if x == '?' && y == '?' {
            entry.unstaged = Some("??".to_string());
            continue;
        }
        if x != ' ' && x != '?' {
            entry.staged = Some(x.to_string());
        }
        if y != ' ' {
            entry.unstaged = Some(y.to_string());
        }
    }

    by_path.into_values().collect()
}

/// Drop everything before the first hunk header.
pub fn format_diff(diff: &str) -> String {
    if diff.trim().is_empty() {
        return NO_CHANGES.to_string();
    }
    let mut in_header = true;
    let kept: Vec<&str> = diff
        .lines()
        .filter(|line| {
            if in_header && HUNK_HEADER_REGEX.is_match(line) {
                in_header = false;
            }
            !in_header
        })
        .collect();
    if kept.is_empty() {
        return diff.trim_end().to_string();
    }
    kept.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_name_status() {
        let output = "M\tpkg/b.go\nA\tsrc/a.rs\nD\told.go\nR087\tlegacy.go\tpkg/new.go\nM\tREADME.md\n";
        let files = parse_name_status(output, &exts(&[".go", ".rs"]));
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["pkg/b.go", "pkg/new.go", "src/a.rs"]);
        assert_eq!(files[1].status, ChangeStatus::Renamed);
        assert!(files.iter().all(|f| f.scope == ChangeScope::Staged));
    }

    #[test]
    fn test_parse_porcelain_unifies_per_path() {
        let output = "MM main.go\nA  added.go\n?? new.go\n M only_worktree.go\nR  a.go -> b.go\n D gone.go\n?? notes.txt\n";
        let changes = parse_porcelain(output, &exts(&[".go"]));
        let paths: Vec<_> = changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["added.go", "b.go", "gone.go", "main.go", "new.go", "only_worktree.go"]
        );

        let main = changes.iter().find(|c| c.path == "main.go").unwrap();
        assert_eq!(main.staged.as_deref(), Some("M"));
        assert_eq!(main.unstaged.as_deref(), Some("M"));

        let untracked = changes.iter().find(|c| c.path == "new.go").unwrap();
        assert_eq!(untracked.staged, None);
        assert_eq!(untracked.unstaged.as_deref(), Some("??"));
    }

    #[test]
    fn test_unified_tasks_skip_deleted_files() {
        let output = " D gone.go\n?? new.go\nAM added.go\n";
        let tasks: Vec<_> = parse_porcelain(output, &[])
            .into_iter()
            .filter_map(UnifiedChange::into_task)
            .collect();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].path, "added.go");
        assert_eq!(tasks[0].status, ChangeStatus::Added);
        assert_eq!(tasks[1].status, ChangeStatus::Untracked);
        assert!(tasks.iter().all(|t| t.scope == ChangeScope::Unified));
    }

    #[test]
    fn test_render_unified_diff_headers() {
        let change = UnifiedChange {
            path: "main.go".into(),
            staged: Some("M".into()),
            unstaged: Some("M".into()),
        };
        let text = change.render_diff(Some("@@ -1 +1 @@\n-a\n+b"), Some("@@ -2 +2 @@\n-c\n+d"));
        assert!(text.starts_with("=== Staged changes (M) ===\n@@ -1 +1 @@"));
        assert!(text.contains("\n=== Unstaged changes (M) ===\n@@ -2 +2 @@"));

        assert_eq!(UnifiedChange::new("x.go").render_diff(None, None), NO_CHANGES);
    }

    #[test]
    fn test_format_diff_strips_headers() {
        let raw = "diff --git a/x.go b/x.go\nindex 1..2 100644\n--- a/x.go\n+++ b/x.go\n@@ -1,2 +1,2 @@\n-a\n+b\n";
        assert_eq!(format_diff(raw), "@@ -1,2 +1,2 @@\n-a\n+b");
        assert_eq!(format_diff(""), NO_CHANGES);
    }

    #[test]
    fn test_has_extension() {
        assert!(has_extension("a/b.GO", &exts(&[".go"])));
        assert!(has_extension("a/b.rs", &exts(&["rs"])));
        assert!(!has_extension("Makefile", &exts(&[".go"])));
        assert!(has_extension("Makefile", &[]));
    }

    #[tokio::test]
    async fn test_discover_outside_repository_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = GitRepository::discover(dir.path(), Vec::new()).await;
        assert!(matches!(result, Err(ReviewError::Repository(_))));
    }
}
