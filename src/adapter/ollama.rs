use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{MemvraError, Result};

use super::{
    timed_client, streaming_client, CompletionRequest, LLMAdapter, LineBuffer, ModelInfo,
    StreamChunk, PROVIDER_OLLAMA, STREAM_BUFFER,
};

const DEFAULT_CHAT_MODEL: &str = "llama3.2";

/// A local Ollama instance: line-delimited JSON streaming, local embeddings.
pub struct OllamaAdapter {
    host: String,
    embed_model: String,
    client: reqwest::Client,
    embed_client: reqwest::Client,
}

impl OllamaAdapter {
    pub fn new(host: &str, embed_model: &str) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            embed_model: embed_model.to_string(),
            client: streaming_client(),
            embed_client: timed_client(),
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f64,
    num_predict: u32,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: ChunkMessage,
    #[serde(default)]
    done: bool,
}

#[derive(Deserialize, Default)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl LLMAdapter for OllamaAdapter {
    fn info(&self) -> ModelInfo {
        ModelInfo {
            name: self.embed_model.clone(),
            provider: PROVIDER_OLLAMA,
            max_context_window: 32_768,
            supports_streaming: true,
            embedding_dimension: 768,
        }
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let resp = self
            .embed_client
            .post(format!("{}/api/embed", self.host))
            .json(&EmbedRequest {
                model: &self.embed_model,
                input: texts.to_vec(),
            })
            .send()
            .await
            .map_err(|e| MemvraError::provider(format!("ollama embed: {e}")))?;

        if !resp.status().is_success() {
            return Err(MemvraError::provider(format!(
                "ollama embed: unexpected status {}",
                resp.status()
            )));
        }
        let parsed: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| MemvraError::provider(format!("ollama embed decode: {e}")))?;
        Ok(parsed.embeddings)
    }

    async fn complete(&self, req: CompletionRequest) -> Result<mpsc::Receiver<StreamChunk>> {
        let model = if req.model.is_empty() {
            DEFAULT_CHAT_MODEL.to_string()
        } else {
            req.model.clone()
        };

        let mut messages = Vec::new();
        if !req.system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: req.system_prompt.clone(),
            });
        }
        if !req.context.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: format!("<context>\n{}\n</context>", req.context),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: req.user_message.clone(),
        });

        let body = ChatRequest {
            model: &model,
            messages,
            stream: req.stream,
            options: ChatOptions {
                temperature: req.temperature,
                num_predict: if req.max_tokens == 0 { 4096 } else { req.max_tokens },
            },
        };
        let request = self
            .client
            .post(format!("{}/api/chat", self.host))
            .json(&body);

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);

        tokio::spawn(async move {
            let resp = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    let _ = tx
                        .send(StreamChunk::Error(MemvraError::provider(format!(
                            "ollama: {e}"
                        ))))
                        .await;
                    return;
                }
            };
            if !resp.status().is_success() {
                let _ = tx
                    .send(StreamChunk::Error(MemvraError::provider(format!(
                        "ollama: status {}",
                        resp.status()
                    ))))
                    .await;
                return;
            }

            // Both streaming and non-streaming responses are newline-delimited
            // JSON objects; non-streaming is just a single line.
            let mut stream = resp.bytes_stream();
            let mut lines = LineBuffer::new();

            'outer: while let Some(item) = stream.next().await {
                let bytes = match item {
                    Ok(b) => b,
                    Err(e) => {
                        warn!("ollama stream chunk error: {e}");
                        let _ = tx
                            .send(StreamChunk::Error(MemvraError::Stream(e.to_string())))
                            .await;
                        return;
                    }
                };
                for line in lines.push(&bytes) {
                    if line.is_empty() {
                        continue;
                    }
                    let chunk: ChatChunk = match serde_json::from_str(&line) {
                        Ok(c) => c,
                        Err(e) => {
                            let _ = tx
                                .send(StreamChunk::Error(MemvraError::Stream(format!(
                                    "ollama stream decode: {e}"
                                ))))
                                .await;
                            return;
                        }
                    };
                    if !chunk.message.content.is_empty()
                        && tx
                            .send(StreamChunk::Text(chunk.message.content))
                            .await
                            .is_err()
                    {
                        return;
                    }
                    if chunk.done {
                        break 'outer;
                    }
                }
            }

            // A non-streaming body may end without a trailing newline.
            if let Some(rest) = lines.remainder() {
                if let Ok(chunk) = serde_json::from_str::<ChatChunk>(&rest) {
                    if !chunk.message.content.is_empty() {
                        let _ = tx.send(StreamChunk::Text(chunk.message.content)).await;
                    }
                }
            }
        });

        Ok(rx)
    }
}
