use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{MemvraError, Result};

use super::{
    streaming_client, CompletionRequest, LLMAdapter, LineBuffer, ModelInfo, StreamChunk,
    PROVIDER_CLAUDE, STREAM_BUFFER,
};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-6";

/// Anthropic Claude. Streaming completions; no embedding endpoint.
pub struct ClaudeAdapter {
    api_key: String,
    client: reqwest::Client,
}

impl ClaudeAdapter {
    /// Empty `api_key` falls back to `ANTHROPIC_API_KEY`.
    pub fn new(api_key: &str) -> Self {
        let key = if api_key.is_empty() {
            std::env::var("ANTHROPIC_API_KEY").unwrap_or_default()
        } else {
            api_key.to_string()
        };
        Self {
            api_key: key,
            client: streaming_client(),
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
    temperature: f64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

fn build_request(req: &CompletionRequest) -> MessagesRequest {
    let model = if req.model.is_empty() {
        DEFAULT_MODEL.to_string()
    } else {
        req.model.clone()
    };
    // Injected context rides in the user turn; Claude has no second system slot.
    let user_content = if req.context.is_empty() {
        req.user_message.clone()
    } else {
        format!("<context>\n{}\n</context>\n\n{}", req.context, req.user_message)
    };
    MessagesRequest {
        model,
        max_tokens: if req.max_tokens == 0 { 4096 } else { req.max_tokens },
        system: if req.system_prompt.is_empty() {
            None
        } else {
            Some(req.system_prompt.clone())
        },
        messages: vec![Message {
            role: "user",
            content: user_content,
        }],
        temperature: req.temperature,
        stream: req.stream,
    }
}

#[async_trait]
impl LLMAdapter for ClaudeAdapter {
    fn info(&self) -> ModelInfo {
        ModelInfo {
            name: DEFAULT_MODEL.to_string(),
            provider: PROVIDER_CLAUDE,
            max_context_window: 200_000,
            supports_streaming: true,
            embedding_dimension: 0,
        }
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(MemvraError::provider(
            "claude: embeddings not supported; use openai or ollama for embeddings",
        ))
    }

    async fn complete(&self, req: CompletionRequest) -> Result<mpsc::Receiver<StreamChunk>> {
        let body = build_request(&req);
        let request = self
            .client
            .post(API_URL)
            .header("x-api-key", self.api_key.clone())
            .header("anthropic-version", API_VERSION)
            .json(&body);

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);

        if !req.stream {
            tokio::spawn(async move {
                match request.send().await {
                    Ok(resp) if resp.status().is_success() => {
                        match resp.json::<MessagesResponse>().await {
                            Ok(mr) => {
                                let text: String = mr
                                    .content
                                    .iter()
                                    .filter(|b| b.block_type == "text")
                                    .filter_map(|b| b.text.as_deref())
                                    .collect();
                                let _ = tx.send(StreamChunk::Text(text)).await;
                            }
                            Err(e) => {
                                let _ = tx
                                    .send(StreamChunk::Error(MemvraError::provider(format!(
                                        "claude: response parse failed: {e}"
                                    ))))
                                    .await;
                            }
                        }
                    }
                    Ok(resp) => {
                        let status = resp.status();
                        let body = resp.text().await.unwrap_or_default();
                        let _ = tx
                            .send(StreamChunk::Error(MemvraError::provider(format!(
                                "claude: {status}: {body}"
                            ))))
                            .await;
                    }
                    Err(e) => {
                        let _ = tx
                            .send(StreamChunk::Error(MemvraError::provider(format!(
                                "claude: request failed: {e}"
                            ))))
                            .await;
                    }
                }
            });
            return Ok(rx);
        }

        tokio::spawn(async move {
            let resp = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    let _ = tx
                        .send(StreamChunk::Error(MemvraError::provider(format!(
                            "claude: request failed: {e}"
                        ))))
                        .await;
                    return;
                }
            };
            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                let _ = tx
                    .send(StreamChunk::Error(MemvraError::provider(format!(
                        "claude: {status}: {body}"
                    ))))
                    .await;
                return;
            }

            let mut stream = resp.bytes_stream();
            let mut lines = LineBuffer::new();
            while let Some(item) = stream.next().await {
                let bytes = match item {
                    Ok(b) => b,
                    Err(e) => {
                        warn!("claude stream chunk error: {e}");
                        let _ = tx
                            .send(StreamChunk::Error(MemvraError::Stream(e.to_string())))
                            .await;
                        return;
                    }
                };
                for line in lines.push(&bytes) {
                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let Ok(v) = serde_json::from_str::<serde_json::Value>(data) else {
                        continue;
                    };
                    if v.get("type").and_then(|t| t.as_str()) == Some("error") {
                        let msg = v
                            .pointer("/error/message")
                            .and_then(|m| m.as_str())
                            .unwrap_or("unknown stream error");
                        let _ = tx
                            .send(StreamChunk::Error(MemvraError::Stream(msg.to_string())))
                            .await;
                        return;
                    }
                    if let Some(delta) = v.pointer("/delta/text").and_then(|t| t.as_str()) {
                        if tx.send(StreamChunk::Text(delta.to_string())).await.is_err() {
                            return; // consumer gone
                        }
                    }
                }
            }
        });

        Ok(rx)
    }
}
