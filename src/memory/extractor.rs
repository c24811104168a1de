use serde::Deserialize;

use crate::adapter::{collect_stream, CompletionRequest, LLMAdapter};
use crate::error::Result;

use super::{classify_memory_kind, MemoryKind};

pub const DEFAULT_MAX_EXTRACTS: usize = 3;

/// A candidate memory pulled out of a model response, not yet persisted.
#[derive(Debug, Clone)]
pub struct ExtractedMemory {
    pub content: String,
    pub kind: MemoryKind,
    pub importance: f64,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: String,
    #[serde(default, rename = "type")]
    kind: String,
}

/// Ask the model to pull memorable decisions, constraints, and conventions
/// out of a response transcript. Returns at most `max_extracts` candidates;
/// callers persist them via [`super::Orchestrator::remember`].
pub async fn extract_memories(
    llm: &dyn LLMAdapter,
    response_text: &str,
    max_extracts: usize,
) -> Result<Vec<ExtractedMemory>> {
    let max = if max_extracts == 0 { DEFAULT_MAX_EXTRACTS } else { max_extracts };
    let trimmed = trim_response(response_text, 3000);

    let prompt = format!(
        "From the assistant response below, extract any decisions, constraints, or conventions \
         that were explicitly stated or recommended. These are things the team should remember \
         for future sessions.\n\n\
         Return ONLY a compact JSON array. Each element: {{\"content\": \"...\", \"type\": \"decision|constraint|convention|todo|note\"}}.\n\
         - decision: something chosen (\"we will use X\", \"we switched to Y\")\n\
         - constraint: a hard rule (\"must\", \"never\", \"always\", \"only\")\n\
         - convention: a style or pattern guideline\n\
         - todo: a future task or follow-up\n\
         - note: anything else worth remembering\n\n\
         If nothing qualifies, return []. No prose, no markdown — only the JSON array.\n\
         Maximum {max} items.\n\n\
         --- ASSISTANT RESPONSE ---\n{trimmed}\n--- END ---"
    );

    let rx = llm
        .complete(CompletionRequest {
            user_message: prompt,
            max_tokens: 512,
            temperature: 0.1,
            stream: false,
            ..Default::default()
        })
        .await?;
    let raw = collect_stream(rx).await?;

    Ok(parse_extraction_json(&raw, max))
}

/// Lenient extraction-JSON parse.
///
/// Slices between the first `[` and last `]` so fenced or prose-wrapped
/// arrays still parse; normalizes the `["content": ...` defect some small
/// models produce; yields nothing (not an error) when still malformed.
pub(crate) fn parse_extraction_json(raw: &str, max: usize) -> Vec<ExtractedMemory> {
    let Some(start) = raw.find('[') else {
        return Vec::new();
    };
    let Some(end) = raw.rfind(']') else {
        return Vec::new();
    };
    if end <= start {
        return Vec::new();
    }

    let mut slice = raw[start..=end].to_string();
    let inner = slice[1..].trim_start();
    if inner.starts_with('"') {
        slice = format!("[{{{inner}");
    }

    let Ok(candidates) = serde_json::from_str::<Vec<Candidate>>(&slice) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for c in candidates {
        if out.len() >= max {
            break;
        }
        let content = c.content.trim();
        if content.is_empty() {
            continue;
        }
        let kind = c
            .kind
            .trim()
            .to_lowercase()
            .parse::<MemoryKind>()
            .unwrap_or_else(|_| classify_memory_kind(content));
        out.push(ExtractedMemory {
            content: content.to_string(),
            importance: kind.default_importance(),
            kind,
        });
    }
    out
}

/// Cap the response at roughly `max_chars`, trimming at a sentence boundary
/// when one exists past the halfway mark.
pub(crate) fn trim_response(s: &str, max_chars: usize) -> String {
    if s.len() <= max_chars {
        return s.to_string();
    }
    let mut cut = max_chars;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut trimmed = &s[..cut];
    if let Some(idx) = trimmed.rfind(['.', '!', '?', '\n']) {
        if idx > max_chars / 2 {
            trimmed = &trimmed[..=idx];
        }
    }
    format!("{trimmed} [...]")
}

#[cfg(test)]
#[path = "extractor_tests.rs"]
mod tests;
