//! Units of work handed to the runner.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a file changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    Untracked,
}

impl ChangeStatus {
    /// Map a `git status` / `git diff --name-status` code. Copies count as
    /// additions; type changes and unmerged entries as modifications.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.chars().next()? {
            'A' | 'C' => Some(ChangeStatus::Added),
            'M' | 'T' | 'U' => Some(ChangeStatus::Modified),
            'D' => Some(ChangeStatus::Deleted),
            'R' => Some(ChangeStatus::Renamed),
            '?' => Some(ChangeStatus::Untracked),
            _ => None,
        }
    }

    /// Single-letter code as printed by `git status`.
    pub fn code(self) -> char {
        match self {
            ChangeStatus::Added => 'A',
            ChangeStatus::Modified => 'M',
            ChangeStatus::Deleted => 'D',
            ChangeStatus::Renamed => 'R',
            ChangeStatus::Untracked => '?',
        }
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChangeStatus::Added => "added",
            ChangeStatus::Modified => "modified",
            ChangeStatus::Deleted => "deleted",
            ChangeStatus::Renamed => "renamed",
            ChangeStatus::Untracked => "untracked",
        };
        f.write_str(label)
    }
}

/// Which side of the index a change lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeScope {
    Staged,
    Unstaged,
    /// Staged and unstaged changes reviewed together
    Unified,
}

impl fmt::Display for ChangeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChangeScope::Staged => "staged",
            ChangeScope::Unstaged => "unstaged",
            ChangeScope::Unified => "staged+unstaged",
        };
        f.write_str(label)
    }
}

/// One file to review. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileTask {
    /// Repository-relative path
    pub path: String,
    pub status: ChangeStatus,
    pub scope: ChangeScope,
}

impl FileTask {
    pub fn new(path: impl Into<String>, status: ChangeStatus, scope: ChangeScope) -> Self {
        Self {
            path: path.into(),
            status,
            scope,
        }
    }

    /// Lower-case extension without the dot, if any.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }
}

impl fmt::Display for FileTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.path, self.status, self.scope)
    }
}
