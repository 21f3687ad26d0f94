//! Last-resort structural recovery from near-JSON text.

use super::{FileDiff, Issue};
use regex::Regex;
use std::sync::LazyLock;

static ISSUE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#""title"\s*:\s*"((?:[^"\\]|\\.)*)"(?:[^{}"]|"(?:[^"\\]|\\.)*")*?"explanation"\s*:\s*"((?:[^"\\]|\\.)*)""#,
    )
    .expect("valid issue regex")
});

static FILE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""file"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("valid file regex")
});

static DIFF_MARKER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""diff"\s*:\s*""#).expect("valid diff regex"));

static DIFFS_KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""diffs"\s*:\s*\["#).expect("valid diffs regex"));

/// Every `"title"` field followed by an `"explanation"` field of the same
/// object. Quoted strings between them may contain braces; bare braces end
/// the search.
pub fn extract_issues(text: &str) -> Vec<Issue> {
    ISSUE_REGEX
        .captures_iter(text)
        .map(|caps| Issue {
            title: unescape(caps[1].trim()),
            explanation: unescape(caps[2].trim()),
            file: String::new(),
            diff: String::new(),
        })
        .collect()
}

/// Every `"file"` field whose next field is a `"diff"` string.
///
/// When the text has a `"diffs"` array, only that part is searched so that
/// per-issue `file`/`diff` pairs are not mistaken for consolidated diffs.
pub fn extract_diffs(text: &str) -> Vec<FileDiff> {
    let region = match DIFFS_KEY_REGEX.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    };

    let files: Vec<_> = FILE_REGEX.captures_iter(region).collect();
    let mut diffs = Vec::new();
    let mut resume_at = 0;

    for (i, caps) in files.iter().enumerate() {
        let whole = match caps.get(0) {
            Some(m) => m,
            None => continue,
        };
        if whole.start() < resume_at {
            continue;
        }
        let next_file_start = files
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(region.len());

        let Some(marker) = DIFF_MARKER_REGEX.find_at(region, whole.end()) else {
            break;
        };
        if marker.start() > next_file_start {
            continue;
        }
        let Some(close) = find_closing_quote(region, marker.end()) else {
            continue;
        };

        diffs.push(FileDiff {
            file: unescape(caps[1].trim()),
            diff: unescape(&region[marker.end()..close]),
        });
        resume_at = close + 1;
    }

    diffs
}

/// Byte index of the first unescaped `"` at or after `from`.
fn find_closing_quote(text: &str, from: usize) -> Option<usize> {
    let mut escaped = false;
    for (i, b) in text.as_bytes().iter().enumerate().skip(from) {
        if escaped {
            escaped = false;
        } else if *b == b'\\' {
            escaped = true;
        } else if *b == b'"' {
            return Some(i);
        }
    }
    None
}

/// Decode the escapes a model commonly emits; unknown escapes are kept as-is.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('/') => out.push('/'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}
