//! Review prompt rendering.

use crate::runner::{ChangeScope, FileTask};
use std::fmt::Write;

const ANSWER_CONTRACT: &str = r#"Your response must be a JSON object with this structure:
{
  "issues": [
    {
      "title": "Short title, e.g. 'Bug: possible nil dereference' or 'Style: inconsistent naming'",
      "explanation": "What is wrong and why it matters",
      "file": "Path of the file the issue is in"
    }
  ],
  "diffs": [
    {
      "file": "Path of the file",
      "diff": "One unified diff with every suggested fix for this file"
    }
  ]
}"#;

const FOCUS: &str = "Focus on:
1. Bugs and logic errors
2. Code style and idioms
3. Performance
4. Security vulnerabilities
5. Maintainability and readability";

const SYSTEM_PROMPT: &str = r#"You are a code review assistant.
Review the code and give actionable feedback on bugs, code style and performance. Pay particular attention to security issues and how to fix them.

Format your ENTIRE response as a single JSON object:
{
  "issues": [{"title": "...", "explanation": "...", "file": "path/to/file.ext"}],
  "diffs": [{"file": "path/to/file.ext", "diff": "@@ line numbers @@\ncode changes"}]
}

Output raw JSON only: no markdown code fences and no text before or after the object."#;

/// Prompt dialect for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptFlavor {
    OpenAi,
    Anthropic,
    Default,
}

impl PromptFlavor {
    pub fn for_provider(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "openai" => PromptFlavor::OpenAi,
            "anthropic" | "claude" => PromptFlavor::Anthropic,
            _ => PromptFlavor::Default,
        }
    }
}

/// Renders the per-file review prompt.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    flavor: PromptFlavor,
    extra_instructions: Option<String>,
}

impl PromptBuilder {
    pub fn new(flavor: PromptFlavor) -> Self {
        Self {
            flavor,
            extra_instructions: None,
        }
    }

    pub fn for_provider(name: &str) -> Self {
        Self::new(PromptFlavor::for_provider(name))
    }

    /// Appended verbatim after the standard instructions.
    pub fn with_extra_instructions(mut self, instructions: impl Into<String>) -> Self {
        let instructions = instructions.into();
        self.extra_instructions = (!instructions.trim().is_empty()).then_some(instructions);
        self
    }

    pub fn flavor(&self) -> PromptFlavor {
        self.flavor
    }

    /// System prompt for chat-style providers.
    pub fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    /// Render the prompt for one file. `content` is `None` when the file
    /// body could not be read; the diff is then the only context.
    pub fn render(&self, task: &FileTask, diff: &str, content: Option<&str>) -> String {
        let language = language_for_path(&task.path).unwrap_or_default();
        let version = match task.scope {
            ChangeScope::Staged => "STAGED",
            ChangeScope::Unstaged | ChangeScope::Unified => "WORKING TREE",
        };
        let mut out = String::new();

        if self.flavor == PromptFlavor::Anthropic {
            out.push_str("Human: ");
        }
        out.push_str(
            "You are a code review assistant. Review the following code changes and provide feedback.\n\n",
        );

        match self.flavor {
            PromptFlavor::OpenAi | PromptFlavor::Anthropic => {
                out.push_str(ANSWER_CONTRACT);
                out.push_str("\n\nIMPORTANT: Group issues by file and give only ONE consolidated diff per file covering every fix for it, so all fixes apply without conflicts.\n");
                let _ = writeln!(
                    out,
                    "\nIMPORTANT: The FULL FILE CONTENT below is the {} version of the file. Write diffs against that version; the change diff is context only.",
                    version
                );
                if self.flavor == PromptFlavor::OpenAi {
                    out.push_str("\nIMPORTANT: Only propose changes you know will work. Do not assume values or keys exist unless the code shows they do.\n");
                }
            }
            PromptFlavor::Default => {}
        }

        let _ = writeln!(out, "\nFile: {}\n", task.path);
        match content {
            Some(content) => {
                let _ = writeln!(
                    out,
                    "FULL FILE CONTENT ({} VERSION):\n```{}\n{}\n```\n",
                    version, language, content
                );
            }
            None => out.push_str("FULL FILE CONTENT: unavailable, review the diff only.\n\n"),
        }
        let _ = writeln!(out, "DIFF (CHANGES MADE):\n```diff\n{}\n```\n", diff);
        out.push_str(FOCUS);
        out.push_str("\n\n");

        match self.flavor {
            PromptFlavor::Default => {
                out.push_str(ANSWER_CONTRACT);
                out.push('\n');
            }
            _ => out.push_str(
                "Use the full file for context and answer in the JSON format specified above.\n",
            ),
        }

        if let Some(extra) = &self.extra_instructions {
            let _ = writeln!(out, "\n{}", extra);
        }
        out
    }
}

/// Markdown fence language for a path, if known.
pub fn language_for_path(path: &str) -> Option<&'static str> {
    let ext = std::path::Path::new(path).extension()?.to_str()?;
    let language = match ext.to_ascii_lowercase().as_str() {
        "go" => "go",
        "js" => "javascript",
        "ts" => "typescript",
        "py" => "python",
        "java" => "java",
        "rb" => "ruby",
        "php" => "php",
        "c" | "cc" | "cpp" | "h" | "hpp" => "cpp",
        "cs" => "csharp",
        "rs" => "rust",
        "swift" => "swift",
        "kt" => "kotlin",
        "sh" => "bash",
        "html" => "html",
        "css" => "css",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "md" => "markdown",
        "proto" => "protobuf",
        "vue" => "vue",
        _ => return None,
    };
    Some(language)
}
