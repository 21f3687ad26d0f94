//! Integration tests for resilient review-answer parsing

use llm_review::parse::{DEFAULT_EXPLANATION, DEFAULT_ISSUE_FILE};
use llm_review::{parse_review, parse_review_detailed, ParseStage};
use std::time::{Duration, Instant};

#[test]
fn test_empty_input_yields_empty_result() {
    let result = parse_review("");
    assert!(result.issues.is_empty());
    assert!(result.diffs.is_empty());
}

#[test]
fn test_issue_without_file_gets_default_file() {
    let outcome = parse_review_detailed(
        r#"{"issues":[{"title":"Bug: null deref","explanation":"x may be nil"}]}"#,
    );
    assert_eq!(outcome.stage, ParseStage::Strict);
    assert_eq!(outcome.result.issues.len(), 1);
    assert_eq!(outcome.result.issues[0].title, "Bug: null deref");
    assert_eq!(outcome.result.issues[0].file, DEFAULT_ISSUE_FILE);
}

#[test]
fn test_literal_newline_in_diff_is_repaired() {
    let text = "{\"issues\": [], \"diffs\": [{\"file\": \"main.go\", \"diff\": \"line1\nline2\"}]}";
    let outcome = parse_review_detailed(text);
    assert_eq!(outcome.stage, ParseStage::Repaired);
    assert_eq!(outcome.result.diffs.len(), 1);
    assert_eq!(outcome.result.diffs[0].diff, "line1\nline2");
}

#[test]
fn test_reasoning_preface_and_fence_are_stripped() {
    let text = "<think>the user wants JSON</think>\n```json\n{\"issues\": [{\"title\": \"Style: naming\", \"explanation\": \"use camelCase\", \"file\": \"a.go\"}]}\n```";
    let outcome = parse_review_detailed(text);
    assert_eq!(outcome.stage, ParseStage::Strict);
    assert_eq!(outcome.result.issues[0].file, "a.go");
}

#[test]
fn test_trailing_commas_are_repaired() {
    let text = r#"{"issues": [{"title": "t", "explanation": "e",},], "diffs": [],}"#;
    let outcome = parse_review_detailed(text);
    assert_eq!(outcome.stage, ParseStage::Repaired);
    assert_eq!(outcome.result.issues.len(), 1);
}

#[test]
fn test_object_embedded_in_prose() {
    let text = "Sure! Here is my review:\n{\"issues\": [{\"title\": \"Bug: leak\", \"explanation\": \"close the body\"}]}\nLet me know if you need more.";
    let outcome = parse_review_detailed(text);
    assert_eq!(outcome.stage, ParseStage::Embedded);
    assert_eq!(outcome.result.issues[0].title, "Bug: leak");
}

#[test]
fn test_truncated_answer_falls_back_to_extraction() {
    let text = r#"{"issues": [{"title": "Bug: race", "explanation": "guard \"count\" with a mutex", "file": "c.go"}], "diffs": [{"file": "c.go", "diff": "-count++\n+mu.Lock()\n+count++\n+mu.Unlock()"}, {"file": "d.go", "diff": "-a"#;
    let outcome = parse_review_detailed(text);
    assert_eq!(outcome.stage, ParseStage::Lenient);
    assert_eq!(outcome.result.issues.len(), 1);
    assert_eq!(outcome.result.issues[0].explanation, "guard \"count\" with a mutex");
    assert_eq!(outcome.result.issues[0].file, DEFAULT_ISSUE_FILE);
    assert_eq!(outcome.result.diffs.len(), 1);
    assert_eq!(
        outcome.result.diffs[0].diff,
        "-count++\n+mu.Lock()\n+count++\n+mu.Unlock()"
    );
}

#[test]
fn test_diffs_alone_are_usable() {
    let outcome =
        parse_review_detailed(r#"{"issues": [], "diffs": [{"file": "a.go", "diff": "+x"}]}"#);
    assert_eq!(outcome.stage, ParseStage::Strict);
    assert!(outcome.result.issues.is_empty());
    assert_eq!(outcome.result.diffs.len(), 1);
}

#[test]
fn test_duplicate_file_diffs_keep_first() {
    let result = parse_review(
        r#"{"issues": [], "diffs": [{"file": "a.go", "diff": "first"}, {"file": "b.go", "diff": "other"}, {"file": "a.go", "diff": "second"}]}"#,
    );
    assert_eq!(result.diffs.len(), 2);
    assert_eq!(result.diffs[0].diff, "first");
    assert_eq!(result.diffs[1].file, "b.go");
}

#[test]
fn test_parsing_is_idempotent() {
    let inputs = [
        "",
        "not json at all",
        r#"{"issues": [{"title": "", "explanation": ""}]}"#,
        "{\"diffs\": [{\"file\": \"x\", \"diff\": \"a\tb\nc\"}]}",
        r#"prefix {"issues": [{"title": "t", "explanation": "e"}]} suffix"#,
    ];
    for input in inputs {
        assert_eq!(parse_review_detailed(input), parse_review_detailed(input), "{:?}", input);
    }
}

#[test]
fn test_unrecoverable_text_is_empty_not_error() {
    let outcome = parse_review_detailed("The model refused to answer.");
    assert_eq!(outcome.stage, ParseStage::Failed);
    assert!(outcome.result.is_empty());

    let outcome = parse_review_detailed(r#"{"issues": []}"#);
    assert_eq!(outcome.stage, ParseStage::NoIssues);
}

#[test]
fn test_blank_fields_get_defaults() {
    let result = parse_review(r#"{"issues": [{"title": "Perf: copy", "explanation": "   "}]}"#);
    assert_eq!(result.issues[0].explanation, DEFAULT_EXPLANATION);
}

#[test]
fn test_large_unbalanced_answer_fails_fast() {
    let text = format!("\"{}", "{ x ".repeat(30_000));
    let start = Instant::now();
    let outcome = parse_review_detailed(&text);
    assert_eq!(outcome.stage, ParseStage::Failed);
    assert!(start.elapsed() < Duration::from_secs(2), "{:?}", start.elapsed());
}

#[test]
fn test_issue_missing_explanation_is_not_merged_with_next() {
    let text = r#"{"issues": [{"title": "Style: naming", "file": "a.go"}, {"title": "Bug: nil map", "explanation": "initialise it"}], "diffs": [{"file": "a.go""#;
    let outcome = parse_review_detailed(text);
    assert_eq!(outcome.stage, ParseStage::Lenient);
    assert_eq!(outcome.result.issues.len(), 1);
    assert_eq!(outcome.result.issues[0].title, "Bug: nil map");
    assert_eq!(outcome.result.issues[0].explanation, "initialise it");
}
