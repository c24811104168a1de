use super::*;

#[test]
fn plain_array_parses() {
    let out = parse_extraction_json(
        r#"[{"content": "we chose sqlite", "type": "decision"}, {"content": "note this", "type": "note"}]"#,
        3,
    );
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].kind, MemoryKind::Decision);
    assert_eq!(out[0].importance, 0.8);
    assert_eq!(out[1].kind, MemoryKind::Note);
}

#[test]
fn fenced_json_parses() {
    let raw = "```json\n[{\"content\":\"test\",\"type\":\"note\"}]\n```";
    let out = parse_extraction_json(raw, 3);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].content, "test");
    assert_eq!(out[0].kind, MemoryKind::Note);
}

#[test]
fn prose_wrapped_array_parses() {
    let raw = "Here is what I found:\n[{\"content\":\"always run clippy\",\"type\":\"constraint\"}]\nHope that helps!";
    let out = parse_extraction_json(raw, 3);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].kind, MemoryKind::Constraint);
}

#[test]
fn malformed_json_yields_nothing() {
    assert!(parse_extraction_json("[{broken", 3).is_empty());
    assert!(parse_extraction_json("no array here", 3).is_empty());
    assert!(parse_extraction_json("", 3).is_empty());
    assert!(parse_extraction_json("] backwards [", 3).is_empty());
}

#[test]
fn missing_leading_brace_is_normalized() {
    // Some small models emit `["content": ...` — the first `{` goes missing.
    let raw = r#"["content": "we migrated to pnpm", "type": "decision"}]"#;
    let out = parse_extraction_json(raw, 3);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].content, "we migrated to pnpm");

    // Same defect with leading whitespace inside the array.
    let raw = "[\n  \"content\": \"use pnpm\", \"type\": \"decision\"}]";
    let out = parse_extraction_json(raw, 3);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].content, "use pnpm");
}

#[test]
fn empty_content_is_discarded() {
    let raw = r#"[{"content": "", "type": "note"}, {"content": "  ", "type": "note"}, {"content": "keep", "type": "note"}]"#;
    let out = parse_extraction_json(raw, 3);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].content, "keep");
}

#[test]
fn invalid_type_falls_back_to_classifier() {
    let raw = r#"[{"content": "we decided to use Redis for caching", "type": "fact"}]"#;
    let out = parse_extraction_json(raw, 3);
    assert_eq!(out[0].kind, MemoryKind::Decision);

    let raw = r#"[{"content": "misc observation", "type": "banana"}]"#;
    let out = parse_extraction_json(raw, 3);
    assert_eq!(out[0].kind, MemoryKind::Note);
}

#[test]
fn output_capped_at_max() {
    let raw = r#"[
        {"content": "one", "type": "note"},
        {"content": "two", "type": "note"},
        {"content": "three", "type": "note"},
        {"content": "four", "type": "note"}
    ]"#;
    assert_eq!(parse_extraction_json(raw, 2).len(), 2);
}

#[test]
fn trim_short_text_untouched() {
    assert_eq!(trim_response("short", 3000), "short");
}

#[test]
fn trim_prefers_sentence_boundary() {
    let text = format!("{} End of sentence. {}", "x".repeat(2000), "y".repeat(2000));
    let trimmed = trim_response(&text, 3000);
    assert!(trimmed.ends_with(". [...]"));
    assert!(trimmed.len() <= 3010);
}

#[test]
fn trim_without_boundary_cuts_hard() {
    let text = "z".repeat(4000);
    let trimmed = trim_response(&text, 3000);
    assert!(trimmed.ends_with(" [...]"));
    assert!(trimmed.len() <= 3010);
}
