use crate::adapter::{collect_stream, CompletionRequest, LLMAdapter};
use crate::error::Result;

use super::extractor::trim_response;

/// Produce a short summary of a session transcript via a single
/// non-streaming completion. `max_tokens` of 0 defaults to 256.
pub async fn summarize_session(
    llm: &dyn LLMAdapter,
    label: &str,
    transcript: &str,
    max_tokens: u32,
) -> Result<String> {
    let max_tokens = if max_tokens == 0 { 256 } else { max_tokens };
    let trimmed = trim_response(transcript, 3000);

    let prompt = format!(
        "Summarize the following AI coding session in 2-3 sentences. Focus on what was \
         worked on, what was decided, and what remains open. No preamble.\n\n\
         Session: {label}\n\n--- TRANSCRIPT ---\n{trimmed}\n--- END ---"
    );

    let rx = llm
        .complete(CompletionRequest {
            user_message: prompt,
            max_tokens,
            temperature: 0.2,
            stream: false,
            ..Default::default()
        })
        .await?;

    let summary = collect_stream(rx).await?;
    Ok(summary.trim().to_string())
}
