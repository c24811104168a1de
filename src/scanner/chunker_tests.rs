use super::*;

fn numbered_lines(n: usize) -> String {
    (1..=n).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n")
}

#[test]
fn small_file_is_one_chunk() {
    let content = numbered_lines(42);
    let chunks = chunk_file(&content, "code", 150);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].start_line, 1);
    assert_eq!(chunks[0].end_line, 42);
    assert_eq!(chunks[0].content, content);
}

#[test]
fn exactly_max_lines_is_one_chunk() {
    let chunks = chunk_file(&numbered_lines(150), "code", 150);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].end_line, 150);
}

#[test]
fn tiny_tail_merges_into_previous_window() {
    // 155 lines with M=150, O=10: only 5 new lines remain past the first
    // window, so it extends to EOF rather than emitting a 15-line sliver.
    let chunks = chunk_file(&numbered_lines(155), "code", 150);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].start_line, 1);
    assert_eq!(chunks[0].end_line, 155);
}

#[test]
fn tail_of_exactly_overlap_is_its_own_window() {
    // 160 lines leaves exactly 10 new lines: no merge, second window runs
    // [141..160].
    let chunks = chunk_file(&numbered_lines(160), "code", 150);
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[1].start_line, 141);
    assert_eq!(chunks[1].end_line, 160);
}

#[test]
fn windows_overlap_by_ten_lines() {
    let chunks = chunk_file(&numbered_lines(300), "code", 150);
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].start_line, 1);
    assert_eq!(chunks[0].end_line, 150);
    assert_eq!(chunks[1].start_line, 141);
    assert_eq!(chunks[1].end_line, 290);
    assert_eq!(chunks[2].start_line, 281);
    assert_eq!(chunks[2].end_line, 300);
    // 10 lines from the end of chunk 0 reappear at the start of chunk 1.
    assert!(chunks[1].content.starts_with("line 141"));
}

#[test]
fn near_tail_merges_into_second_window() {
    // 295 lines: second window ends at 290 with 5 new lines left — merged.
    let chunks = chunk_file(&numbered_lines(295), "code", 150);
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[1].start_line, 141);
    assert_eq!(chunks[1].end_line, 295);
}

#[test]
fn coverage_is_complete() {
    for n in [1usize, 149, 150, 151, 160, 161, 299, 300, 500] {
        let chunks = chunk_file(&numbered_lines(n), "code", 150);
        assert_eq!(chunks[0].start_line, 1, "n={n}");
        assert_eq!(chunks.last().unwrap().end_line, n, "n={n}");
        for w in chunks.windows(2) {
            assert!(
                w[1].start_line <= w[0].end_line + 1,
                "gap between chunks at n={n}"
            );
        }
        for c in &chunks {
            assert!(c.start_line >= 1 && c.start_line <= c.end_line && c.end_line <= n);
        }
    }
}

#[test]
fn markdown_splits_on_headings() {
    let content = "# Title\nintro text\n## Section One\nbody one\n### Sub\nbody sub\n## Section Two\nbody two";
    let chunks = chunk_file(content, "docs", 150);
    assert_eq!(chunks.len(), 4);
    assert!(chunks[0].content.starts_with("# Title"));
    assert!(chunks[1].content.starts_with("## Section One"));
    assert!(chunks[2].content.starts_with("### Sub"));
    assert!(chunks[3].content.starts_with("## Section Two"));
    assert_eq!(chunks[0].start_line, 1);
    assert_eq!(chunks[0].end_line, 2);
    assert_eq!(chunks[3].end_line, 8);
}

#[test]
fn markdown_force_splits_at_max_lines() {
    let content = numbered_lines(200);
    let chunks = chunk_file(&content, "docs", 80);
    assert!(chunks.len() >= 3);
    assert!(chunks.iter().all(|c| c.end_line - c.start_line + 1 <= 80));
    assert_eq!(chunks.last().unwrap().end_line, 200);
}

#[test]
fn chunk_type_is_carried() {
    let chunks = chunk_file("a\nb", "test", 150);
    assert_eq!(chunks[0].chunk_type, "test");
}

#[test]
fn empty_content_is_single_empty_chunk() {
    // split('\n') of "" yields one empty line; the file exists, so it gets
    // one chunk covering line 1.
    let chunks = chunk_file("", "code", 150);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].start_line, 1);
    assert_eq!(chunks[0].end_line, 1);
}
