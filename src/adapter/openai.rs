use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{MemvraError, Result};

use super::{
    timed_client, streaming_client, CompletionRequest, LLMAdapter, LineBuffer, ModelInfo,
    StreamChunk, PROVIDER_OPENAI, STREAM_BUFFER,
};

const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const EMBED_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_MODEL: &str = "gpt-4o";
const EMBED_MODEL: &str = "text-embedding-3-small";

/// OpenAI: streaming chat completions plus text-embedding-3-small (1536-d).
pub struct OpenAiAdapter {
    api_key: String,
    client: reqwest::Client,
    embed_client: reqwest::Client,
}

impl OpenAiAdapter {
    /// Empty `api_key` falls back to `OPENAI_API_KEY`.
    pub fn new(api_key: &str) -> Self {
        let key = if api_key.is_empty() {
            std::env::var("OPENAI_API_KEY").unwrap_or_default()
        } else {
            api_key.to_string()
        };
        Self {
            api_key: key,
            client: streaming_client(),
            embed_client: timed_client(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: &'static str,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

fn build_messages(req: &CompletionRequest) -> Vec<ChatMessage> {
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
    messages
}

#[async_trait]
impl LLMAdapter for OpenAiAdapter {
    fn info(&self) -> ModelInfo {
        ModelInfo {
            name: DEFAULT_MODEL.to_string(),
            provider: PROVIDER_OPENAI,
            max_context_window: 128_000,
            supports_streaming: true,
            embedding_dimension: 1536,
        }
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let resp = self
            .embed_client
            .post(EMBED_URL)
            .bearer_auth(&self.api_key)
            .json(&EmbedRequest {
                model: EMBED_MODEL,
                input: texts.to_vec(),
            })
            .send()
            .await
            .map_err(|e| MemvraError::provider(format!("openai embed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(MemvraError::provider(format!(
                "openai embed: {status}: {body}"
            )));
        }

        let parsed: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| MemvraError::provider(format!("openai embed decode: {e}")))?;

        let embeddings: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        if embeddings.len() != texts.len() {
            return Err(MemvraError::provider(format!(
                "openai embed: sent {} texts, got {} embeddings",
                texts.len(),
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }

    async fn complete(&self, req: CompletionRequest) -> Result<mpsc::Receiver<StreamChunk>> {
        let body = ChatRequest {
            model: if req.model.is_empty() {
                DEFAULT_MODEL.to_string()
            } else {
                req.model.clone()
            },
            messages: build_messages(&req),
            max_tokens: if req.max_tokens == 0 { 4096 } else { req.max_tokens },
            temperature: req.temperature,
            stream: req.stream,
        };
        let request = self
            .client
            .post(CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&body);

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let streaming = req.stream;

        tokio::spawn(async move {
            let resp = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    let _ = tx
                        .send(StreamChunk::Error(MemvraError::provider(format!(
                            "openai: request failed: {e}"
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
                        "openai: {status}: {body}"
                    ))))
                    .await;
                return;
            }

            if !streaming {
                match resp.json::<ChatResponse>().await {
                    Ok(cr) => {
                        let text = cr
                            .choices
                            .first()
                            .and_then(|c| c.message.content.clone())
                            .unwrap_or_default();
                        let _ = tx.send(StreamChunk::Text(text)).await;
                    }
                    Err(e) => {
                        let _ = tx
                            .send(StreamChunk::Error(MemvraError::provider(format!(
                                "openai: response parse failed: {e}"
                            ))))
                            .await;
                    }
                }
                return;
            }

            let mut stream = resp.bytes_stream();
            let mut lines = LineBuffer::new();
            while let Some(item) = stream.next().await {
                let bytes = match item {
                    Ok(b) => b,
                    Err(e) => {
                        warn!("openai stream chunk error: {e}");
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
                    if data == "[DONE]" {
                        return;
                    }
                    let Ok(v) = serde_json::from_str::<serde_json::Value>(data) else {
                        continue;
                    };
                    if let Some(delta) = v
                        .pointer("/choices/0/delta/content")
                        .and_then(|c| c.as_str())
                    {
                        if tx.send(StreamChunk::Text(delta.to_string())).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok(rx)
    }
}
