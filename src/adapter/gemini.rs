use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{MemvraError, Result};

use super::{
    timed_client, streaming_client, CompletionRequest, LLMAdapter, LineBuffer, ModelInfo,
    StreamChunk, PROVIDER_GEMINI, STREAM_BUFFER,
};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const EMBED_MODEL: &str = "text-embedding-004";

/// Google Gemini via the REST API: SSE-streamed completions plus
/// text-embedding-004 (768-d, one request per input).
pub struct GeminiAdapter {
    api_key: String,
    client: reqwest::Client,
    embed_client: reqwest::Client,
}

impl GeminiAdapter {
    /// Empty `api_key` falls back to `GEMINI_API_KEY`.
    pub fn new(api_key: &str) -> Self {
        let key = if api_key.is_empty() {
            std::env::var("GEMINI_API_KEY").unwrap_or_default()
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
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Default)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f64,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
}

#[derive(Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Serialize)]
struct EmbedPart {
    text: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbedValues,
}

#[derive(Deserialize)]
struct EmbedValues {
    values: Vec<f32>,
}

fn build_request(req: &CompletionRequest) -> GenerateRequest {
    let mut system_text = req.system_prompt.clone();
    if !req.context.is_empty() {
        system_text.push_str(&format!("\n\n<context>\n{}\n</context>", req.context));
    }
    GenerateRequest {
        contents: vec![Content {
            role: "user".into(),
            parts: vec![Part {
                text: req.user_message.clone(),
            }],
        }],
        system_instruction: if system_text.is_empty() {
            None
        } else {
            Some(Content {
                role: String::new(),
                parts: vec![Part { text: system_text }],
            })
        },
        generation_config: GenerationConfig {
            max_output_tokens: if req.max_tokens == 0 { 4096 } else { req.max_tokens },
            temperature: req.temperature,
        },
    }
}

fn candidate_text(resp: &GenerateResponse) -> String {
    resp.candidates
        .iter()
        .flat_map(|c| c.content.parts.iter())
        .map(|p| p.text.as_str())
        .collect()
}

#[async_trait]
impl LLMAdapter for GeminiAdapter {
    fn info(&self) -> ModelInfo {
        ModelInfo {
            name: DEFAULT_MODEL.to_string(),
            provider: PROVIDER_GEMINI,
            max_context_window: 1_000_000,
            supports_streaming: true,
            embedding_dimension: 768,
        }
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!(
            "{BASE_URL}/{EMBED_MODEL}:embedContent?key={}",
            self.api_key
        );

        // The embedContent endpoint takes one input at a time.
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            let resp = self
                .embed_client
                .post(&url)
                .json(&EmbedRequest {
                    model: format!("models/{EMBED_MODEL}"),
                    content: EmbedContent {
                        parts: vec![EmbedPart { text: text.clone() }],
                    },
                })
                .send()
                .await
                .map_err(|e| MemvraError::provider(format!("gemini embed: {e}")))?;

            if !resp.status().is_success() {
                return Err(MemvraError::provider(format!(
                    "gemini embed: status {}",
                    resp.status()
                )));
            }
            let parsed: EmbedResponse = resp
                .json()
                .await
                .map_err(|e| MemvraError::provider(format!("gemini embed decode: {e}")))?;
            results.push(parsed.embedding.values);
        }
        Ok(results)
    }

    async fn complete(&self, req: CompletionRequest) -> Result<mpsc::Receiver<StreamChunk>> {
        let body = build_request(&req);
        let model = if req.model.is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            req.model.clone()
        };

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);

        if !req.stream {
            let url = format!("{BASE_URL}/{model}:generateContent?key={}", self.api_key);
            let request = self.client.post(&url).json(&body);
            tokio::spawn(async move {
                let result: Result<String> = async {
                    let resp = request
                        .send()
                        .await
                        .map_err(|e| MemvraError::provider(format!("gemini: {e}")))?;
                    if !resp.status().is_success() {
                        let status = resp.status();
                        let text = resp.text().await.unwrap_or_default();
                        return Err(MemvraError::provider(format!("gemini: {status}: {text}")));
                    }
                    let parsed: GenerateResponse = resp
                        .json()
                        .await
                        .map_err(|e| MemvraError::provider(format!("gemini decode: {e}")))?;
                    if let Some(err) = parsed.error {
                        return Err(MemvraError::provider(format!(
                            "gemini api error {}: {}",
                            err.code, err.message
                        )));
                    }
                    Ok(candidate_text(&parsed))
                }
                .await;
                match result {
                    Ok(text) => {
                        let _ = tx.send(StreamChunk::Text(text)).await;
                    }
                    Err(e) => {
                        let _ = tx.send(StreamChunk::Error(e)).await;
                    }
                }
            });
            return Ok(rx);
        }

        // SSE: each event arrives as a "data: {json}" line.
        let url = format!(
            "{BASE_URL}/{model}:streamGenerateContent?alt=sse&key={}",
            self.api_key
        );
        let request = self.client.post(&url).json(&body);

        tokio::spawn(async move {
            let resp = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    let _ = tx
                        .send(StreamChunk::Error(MemvraError::provider(format!(
                            "gemini stream: {e}"
                        ))))
                        .await;
                    return;
                }
            };
            if !resp.status().is_success() {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                let _ = tx
                    .send(StreamChunk::Error(MemvraError::provider(format!(
                        "gemini stream: {status}: {text}"
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
                        warn!("gemini stream chunk error: {e}");
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
                    let parsed: GenerateResponse = match serde_json::from_str(data) {
                        Ok(p) => p,
                        Err(e) => {
                            let _ = tx
                                .send(StreamChunk::Error(MemvraError::Stream(format!(
                                    "gemini stream decode: {e}"
                                ))))
                                .await;
                            return;
                        }
                    };
                    if let Some(err) = parsed.error {
                        let _ = tx
                            .send(StreamChunk::Error(MemvraError::Stream(format!(
                                "gemini api error {}: {}",
                                err.code, err.message
                            ))))
                            .await;
                        return;
                    }
                    let text = candidate_text(&parsed);
                    if !text.is_empty() && tx.send(StreamChunk::Text(text)).await.is_err() {
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}
