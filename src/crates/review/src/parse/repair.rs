//! Text clean-up passes applied before decoding.

/// Closing markers of a private reasoning preface.
const REASONING_END_MARKERS: &[&str] = &["</think>", "</thinking>"];

/// Drop everything up to and including the first end-of-reasoning marker.
pub fn strip_reasoning(text: &str) -> &str {
    REASONING_END_MARKERS
        .iter()
        .filter_map(|marker| text.find(marker).map(|idx| idx + marker.len()))
        .min()
        .map(|end| text[end..].trim())
        .unwrap_or(text)
}

/// Remove the markers of a single fenced code block wrapping the whole text.
///
/// The opening fence may carry a language tag. Text with more than one fence
/// pair, or with content outside the block, is returned trimmed but
/// otherwise untouched.
pub fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(inner) = after_open.strip_suffix("```") else {
        return trimmed;
    };

    // First line of the block is the (possibly empty) language tag.
    let body = match inner.find('\n') {
        Some(newline) => {
            let tag = inner[..newline].trim();
            if tag.contains(char::is_whitespace) || tag.contains('{') {
                return trimmed;
            }
            &inner[newline + 1..]
        }
        None => return trimmed,
    };

    if body.lines().any(|line| line.trim_start().starts_with("```")) {
        return trimmed;
    }
    body.trim()
}

/// Escape literal control characters inside JSON string literals and drop
/// trailing commas before `}` or `]` outside them.
///
/// A backslash inside a string escapes exactly the next character, so `\\"`
/// ends the string while `\"` does not.
pub fn repair_literals(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 16);
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if in_string {
            if escaped {
                escaped = false;
                push_string_char(&mut out, c);
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                _ => push_string_char(&mut out, c),
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' if closes_after_whitespace(&text[idx + 1..]) => {}
            _ => out.push(c),
        }
    }

    out
}

fn push_string_char(out: &mut String, c: char) {
    match c {
        '\n' => out.push_str("\\n"),
        '\t' => out.push_str("\\t"),
        '\r' => out.push_str("\\r"),
        '\u{8}' => out.push_str("\\b"),
        '\u{c}' => out.push_str("\\f"),
        c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
        c => out.push(c),
    }
}

fn closes_after_whitespace(rest: &str) -> bool {
    matches!(rest.trim_start().chars().next(), Some('}') | Some(']'))
}

/// Byte ranges of balanced outermost `{...}` objects, in order of their
/// opening brace. Braces inside string literals are ignored; string tracking
/// starts at the first `{`, and a `{` that never closes does not hide the
/// objects after it.
///
/// One pass over the text with a stack of open-brace offsets.
pub fn balanced_objects(text: &str) -> Vec<std::ops::Range<usize>> {
    let Some(first) = text.find('{') else {
        return Vec::new();
    };

    let mut open = Vec::new();
    let mut closed = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in text.as_bytes().iter().enumerate().skip(first) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => open.push(i),
            b'}' => {
                if let Some(start) = open.pop() {
                    closed.push(start..i + 1);
                }
            }
            _ => {}
        }
    }

    // Closed ranges nest or are disjoint; keep the ones nothing else contains.
    closed.sort_by_key(|range| range.start);
    let mut outermost: Vec<std::ops::Range<usize>> = Vec::new();
    for range in closed {
        match outermost.last() {
            Some(last) if range.start < last.end => {}
            _ => outermost.push(range),
        }
    }
    outermost
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_reasoning() {
        assert_eq!(
            strip_reasoning("<think>hmm, maybe {</think>\n{\"issues\":[]}"),
            "{\"issues\":[]}"
        );
        assert_eq!(strip_reasoning("reasoning</thinking> {}"), "{}");
        assert_eq!(strip_reasoning("{\"issues\":[]}"), "{\"issues\":[]}");
    }

    #[test]
    fn test_strip_fence_with_and_without_tag() {
        assert_eq!(strip_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fence("  ```\n{\"a\":1}\n```  "), "{\"a\":1}");
    }

    #[test]
    fn test_strip_fence_leaves_partial_wrapping() {
        let text = "Here you go:\n```json\n{}\n```";
        assert_eq!(strip_fence(text), text);

        let two_blocks = "```json\n{}\n```\nand\n```json\n{}\n```";
        assert_eq!(strip_fence(two_blocks), two_blocks);
    }

    #[test]
    fn test_repair_escapes_controls_inside_strings_only() {
        let raw = "{\n  \"diff\": \"line1\nline2\tend\"\n}";
        let repaired = repair_literals(raw);
        assert_eq!(repaired, "{\n  \"diff\": \"line1\\nline2\\tend\"\n}");
    }

    #[test]
    fn test_repair_respects_escaped_quotes_and_backslashes() {
        // `\"` keeps the string open, `\\"` closes it.
        let raw = "{\"a\": \"say \\\"hi\nthere\\\"\", \"b\": \"c:\\\\\", \"n\": 1,}";
        let repaired = repair_literals(raw);
        assert_eq!(
            repaired,
            "{\"a\": \"say \\\"hi\\nthere\\\"\", \"b\": \"c:\\\\\", \"n\": 1}"
        );
    }

    #[test]
    fn test_repair_removes_trailing_commas() {
        assert_eq!(repair_literals("[1, 2, ]"), "[1, 2 ]");
        assert_eq!(repair_literals("{\"a\": \"x,}\",\n}"), "{\"a\": \"x,}\"\n}");
    }

    #[test]
    fn test_repair_escapes_other_control_characters() {
        assert_eq!(repair_literals("\"a\u{1}b\""), "\"a\\u0001b\"");
    }

    #[test]
    fn test_balanced_objects_skip_braces_in_strings() {
        let text = "Sure! {\"issues\": [{\"title\": \"brace } here\"}]} trailing {";
        let ranges = balanced_objects(text);
        assert_eq!(ranges.len(), 1);
        assert_eq!(
            &text[ranges[0].clone()],
            "{\"issues\": [{\"title\": \"brace } here\"}]}"
        );
    }

    #[test]
    fn test_balanced_objects_after_unbalanced_prefix() {
        let text = "fn main() { x\n{\"issues\": []}";
        let ranges = balanced_objects(text);
        assert_eq!(ranges.len(), 1);
        assert_eq!(&text[ranges[0].clone()], "{\"issues\": []}");
    }

    #[test]
    fn test_balanced_objects_keeps_only_outermost() {
        let text = "{\"a\": {\"b\": {}}} and {\"c\": 1} {{";
        let ranges = balanced_objects(text);
        let objects: Vec<_> = ranges.into_iter().map(|r| &text[r]).collect();
        assert_eq!(objects, vec!["{\"a\": {\"b\": {}}}", "{\"c\": 1}"]);
    }

    #[test]
    fn test_balanced_objects_linear_on_unclosed_braces() {
        let text = format!("\"{}{{\"issues\": []}}", "{ x ".repeat(50_000));
        let start = std::time::Instant::now();
        let ranges = balanced_objects(&text);
        assert!(start.elapsed() < std::time::Duration::from_secs(2));
        assert_eq!(ranges.len(), 1);
        assert_eq!(&text[ranges[0].clone()], "{\"issues\": []}");
    }
}
