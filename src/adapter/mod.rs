//! Uniform streaming-completion + embedding contract over four providers.

mod claude;
mod gemini;
mod ollama;
mod openai;

pub use claude::ClaudeAdapter;
pub use gemini::GeminiAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{MemvraError, Result};

pub const PROVIDER_CLAUDE: &str = "claude";
pub const PROVIDER_OPENAI: &str = "openai";
pub const PROVIDER_GEMINI: &str = "gemini";
pub const PROVIDER_OLLAMA: &str = "ollama";

/// Producer→consumer channel capacity for streamed completions.
pub const STREAM_BUFFER: usize = 64;

/// Request timeout for embedding and non-streaming calls. Streaming
/// completions rely on server-side stream termination instead.
const EMBED_TIMEOUT: Duration = Duration::from_secs(60);

/// A single token batch or in-band failure delivered during streaming.
/// The producer closes the channel exactly once, possibly after an `Error`.
#[derive(Debug)]
pub enum StreamChunk {
    Text(String),
    Error(MemvraError),
}

/// Parameters for a completion call.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub system_prompt: String,
    /// Injected project context; wrapped in `<context>` tags by adapters.
    pub context: String,
    pub user_message: String,
    /// Model override; empty uses the provider default.
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub stream: bool,
}

/// Capability metadata for an adapter.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub provider: &'static str,
    pub max_context_window: usize,
    pub supports_streaming: bool,
    /// 0 when the provider has no embedding endpoint.
    pub embedding_dimension: usize,
}

/// The common interface all provider adapters implement.
#[async_trait]
pub trait LLMAdapter: Send + Sync {
    /// Send a prompt; chunks arrive on the returned channel in server order.
    async fn complete(&self, req: CompletionRequest) -> Result<mpsc::Receiver<StreamChunk>>;

    /// Batch-embed texts. Empty input returns empty output; results are in
    /// input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn info(&self) -> ModelInfo;
}

/// Narrower alias for components that only embed.
pub type Embedder = Arc<dyn LLMAdapter>;

/// Construct the adapter for the named provider.
///
/// Empty api keys fall back to the provider's environment variable; a key
/// that is still missing fails on first call, not at construction. Unknown
/// provider names fail here.
pub fn new_adapter(
    provider: &str,
    embed_model: &str,
    api_key: &str,
    ollama_host: &str,
) -> Result<Arc<dyn LLMAdapter>> {
    match provider {
        PROVIDER_CLAUDE => Ok(Arc::new(ClaudeAdapter::new(api_key))),
        PROVIDER_OPENAI => Ok(Arc::new(OpenAiAdapter::new(api_key))),
        PROVIDER_GEMINI => Ok(Arc::new(GeminiAdapter::new(api_key))),
        PROVIDER_OLLAMA => {
            let host = if ollama_host.is_empty() {
                "http://localhost:11434"
            } else {
                ollama_host
            };
            let model = if embed_model.is_empty() {
                "nomic-embed-text"
            } else {
                embed_model
            };
            Ok(Arc::new(OllamaAdapter::new(host, model)))
        }
        other => Err(MemvraError::InvalidInput(format!(
            "unknown provider {other:?}; valid providers: claude, openai, gemini, ollama"
        ))),
    }
}

pub(crate) fn timed_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(EMBED_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Client without a global timeout, for streamed completions.
pub(crate) fn streaming_client() -> reqwest::Client {
    reqwest::Client::new()
}

/// Accumulates raw bytes and yields complete `\n`-terminated lines, for SSE
/// and line-delimited JSON streams.
pub(crate) struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            lines.push(text.trim_end_matches(['\n', '\r']).to_string());
        }
        lines
    }

    /// Whatever is left after the stream ends (no trailing newline).
    pub fn remainder(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let text = String::from_utf8_lossy(&self.buf).trim().to_string();
        self.buf.clear();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Drain a completion stream into a single string, surfacing in-band errors.
pub async fn collect_stream(mut rx: mpsc::Receiver<StreamChunk>) -> Result<String> {
    let mut out = String::new();
    while let Some(chunk) = rx.recv().await {
        match chunk {
            StreamChunk::Text(t) => out.push_str(&t),
            StreamChunk::Error(e) => return Err(e),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_fails_at_construction() {
        let result = new_adapter("bard", "", "", "");
        assert!(matches!(result, Err(MemvraError::InvalidInput(_))));
    }

    #[test]
    fn known_providers_construct_without_keys() {
        for p in [PROVIDER_CLAUDE, PROVIDER_OPENAI, PROVIDER_GEMINI, PROVIDER_OLLAMA] {
            let adapter = new_adapter(p, "", "", "").unwrap();
            assert_eq!(adapter.info().provider, p);
        }
    }

    #[test]
    fn ollama_defaults_fill_in() {
        let adapter = new_adapter(PROVIDER_OLLAMA, "", "", "").unwrap();
        assert_eq!(adapter.info().name, "nomic-embed-text");
    }

    #[test]
    fn line_buffer_splits_on_newlines() {
        let mut lb = LineBuffer::new();
        assert!(lb.push(b"data: {\"a\"").is_empty());
        let lines = lb.push(b": 1}\ndata: done\n\npartial");
        assert_eq!(lines, vec!["data: {\"a\": 1}", "data: done", ""]);
        assert_eq!(lb.remainder().as_deref(), Some("partial"));
        assert!(lb.remainder().is_none());
    }

    #[test]
    fn line_buffer_strips_carriage_returns() {
        let mut lb = LineBuffer::new();
        let lines = lb.push(b"data: x\r\n");
        assert_eq!(lines, vec!["data: x"]);
    }

    #[tokio::test]
    async fn collect_stream_concatenates_and_errors() {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tx.send(StreamChunk::Text("hello ".into())).await.unwrap();
        tx.send(StreamChunk::Text("world".into())).await.unwrap();
        drop(tx);
        assert_eq!(collect_stream(rx).await.unwrap(), "hello world");

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tx.send(StreamChunk::Text("partial".into())).await.unwrap();
        tx.send(StreamChunk::Error(MemvraError::Stream("boom".into())))
            .await
            .unwrap();
        drop(tx);
        assert!(collect_stream(rx).await.is_err());
    }
}
