pub const DEFAULT_MAX_LINES: usize = 150;
pub const DEFAULT_OVERLAP: usize = 10;

/// A slice of a source file before it is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawChunk {
    pub content: String,
    /// 1-based.
    pub start_line: usize,
    /// 1-based, inclusive.
    pub end_line: usize,
    pub chunk_type: String,
}

/// Split file content into overlapping chunks.
///
/// `chunk_type` is one of "code", "config", "test", "docs". Docs split on
/// markdown headings; everything else uses fixed line windows with overlap.
/// Pure — no I/O.
pub fn chunk_file(content: &str, chunk_type: &str, max_lines: usize) -> Vec<RawChunk> {
    let max_lines = if max_lines == 0 { DEFAULT_MAX_LINES } else { max_lines };

    let lines: Vec<&str> = content.split('\n').collect();
    if lines.is_empty() {
        return Vec::new();
    }

    if chunk_type == "docs" {
        return chunk_markdown(&lines, max_lines);
    }

    chunk_by_lines(&lines, chunk_type, max_lines, DEFAULT_OVERLAP)
}

fn chunk_by_lines(
    lines: &[&str],
    chunk_type: &str,
    max_lines: usize,
    overlap: usize,
) -> Vec<RawChunk> {
    let total = lines.len();
    if total <= max_lines {
        return vec![RawChunk {
            content: lines.join("\n"),
            start_line: 1,
            end_line: total,
            chunk_type: chunk_type.to_string(),
        }];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < total {
        let end = (start + max_lines).min(total);

        chunks.push(RawChunk {
            content: lines[start..end].join("\n"),
            start_line: start + 1,
            end_line: end,
            chunk_type: chunk_type.to_string(),
        });

        let advance = if max_lines > overlap { max_lines - overlap } else { max_lines };
        start += advance;

        // Avoid a tiny trailing chunk: when fewer than `overlap` new lines
        // remain past this window, extend it to EOF instead.
        if start < total && total - end < overlap {
            let last = chunks.last_mut().expect("at least one chunk");
            last.content = lines[last.start_line - 1..total].join("\n");
            last.end_line = total;
            break;
        }
    }

    chunks
}

/// Split markdown on `## ` / `### ` headings, force-splitting at max_lines.
fn chunk_markdown(lines: &[&str], max_lines: usize) -> Vec<RawChunk> {
    let mut chunks: Vec<RawChunk> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut start_line = 1usize;

    let flush = |chunks: &mut Vec<RawChunk>, current: &mut Vec<&str>, start: usize, end: usize| {
        if current.is_empty() {
            return;
        }
        chunks.push(RawChunk {
            content: current.join("\n"),
            start_line: start,
            end_line: end,
            chunk_type: "docs".to_string(),
        });
        current.clear();
    };

    for (i, line) in lines.iter().enumerate() {
        let line_num = i + 1;
        let is_heading = line.starts_with("## ") || line.starts_with("### ");

        if is_heading && !current.is_empty() {
            flush(&mut chunks, &mut current, start_line, line_num - 1);
            start_line = line_num;
        }

        current.push(line);

        if current.len() >= max_lines {
            flush(&mut chunks, &mut current, start_line, line_num);
            start_line = line_num + 1;
        }
    }

    flush(&mut chunks, &mut current, start_line, lines.len());
    chunks
}

#[cfg(test)]
#[path = "chunker_tests.rs"]
mod tests;
