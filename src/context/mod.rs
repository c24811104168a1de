//! Token-budgeted context assembly.

mod formatter;
mod tokenizer;

pub use formatter::Formatter;
pub use tokenizer::Tokenizer;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::memory::{
    Chunk, MemoryKind, Orchestrator, Project, RetrievalResult, RetrieveOptions, Store,
};
use crate::scanner::TechStack;

/// Retrieval boundary the builder depends on, so it can be exercised without
/// a live embedder.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, opts: RetrieveOptions) -> Result<RetrievalResult>;
}

#[async_trait]
impl Retriever for Orchestrator {
    async fn retrieve(&self, query: &str, opts: RetrieveOptions) -> Result<RetrievalResult> {
        Orchestrator::retrieve(self, query, opts).await
    }
}

/// Controls how context is assembled.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub question: String,
    /// Used to resolve `extra_files` relative paths.
    pub project_root: String,
    pub max_tokens: usize,
    pub top_k_chunks: usize,
    pub top_k_memories: usize,
    pub similarity_threshold: f64,
    /// Paths to always include, highest priority.
    pub extra_files: Vec<String>,
}

/// Result of a context build.
#[derive(Debug, Default)]
pub struct BuiltContext {
    pub system_prompt: String,
    pub context_text: String,
    pub tokens_used: usize,
    pub chunks_used: usize,
    pub memories_used: usize,
    /// One short label per appended block, for verbose tracing.
    pub sources: Vec<String>,
}

/// Assembles token-budget-aware prompts from project memory.
pub struct Builder<'a> {
    store: &'a Store,
    retriever: &'a dyn Retriever,
    formatter: Formatter,
    tokenizer: &'a Tokenizer,
}

impl<'a> Builder<'a> {
    pub fn new(store: &'a Store, retriever: &'a dyn Retriever, tokenizer: &'a Tokenizer) -> Self {
        Self {
            store,
            retriever,
            formatter: Formatter::new(),
            tokenizer,
        }
    }

    /// Build the context for a question within the token budget.
    ///
    /// The system prompt is a separate string and is not charged against the
    /// budget; every other block is measured before it is appended.
    pub async fn build(&self, mut opts: BuildOptions) -> Result<BuiltContext> {
        if opts.max_tokens == 0 {
            opts.max_tokens = 8000;
        }
        if opts.top_k_chunks == 0 {
            opts.top_k_chunks = 10;
        }
        if opts.top_k_memories == 0 {
            opts.top_k_memories = 5;
        }
        if opts.similarity_threshold == 0.0 {
            opts.similarity_threshold = 0.3;
        }

        let mut remaining = opts.max_tokens;
        let mut sections: Vec<String> = Vec::new();
        let mut sources: Vec<String> = Vec::new();

        // System prompt: profile + conventions + constraints, always present.
        let project = self.store.get_project().unwrap_or_else(|_| Project {
            name: "unknown".into(),
            ..Default::default()
        });
        let ts = TechStack::from_json(&project.tech_stack);

        let conventions = self.store.list_memories(Some(MemoryKind::Convention))?;
        let constraints = self.store.list_memories(Some(MemoryKind::Constraint))?;
        let decisions = self.store.list_memories(Some(MemoryKind::Decision))?;

        let system_prompt =
            self.formatter
                .format_system_prompt(&project, &ts, &conventions, &constraints);

        // Explicitly pinned files, wrapped as synthetic whole-file chunks.
        for rel in &opts.extra_files {
            let abs = if !opts.project_root.is_empty() && !Path::new(rel).is_absolute() {
                Path::new(&opts.project_root).join(rel)
            } else {
                Path::new(rel).to_path_buf()
            };
            let Ok(content) = std::fs::read_to_string(&abs) else {
                continue; // unreadable paths are skipped silently
            };
            let chunk = Chunk {
                end_line: (content.matches('\n').count() + 1) as i64,
                start_line: 1,
                content,
                chunk_type: "code".into(),
                ..Default::default()
            };
            let block = self.formatter.format_chunk(&chunk, rel);
            let tokens = self.tokenizer.count(&block);
            if tokens <= remaining {
                sections.push(block);
                remaining -= tokens;
                sources.push(format!("file (explicit): {rel}"));
            }
        }

        let retrieval = self
            .retriever
            .retrieve(
                &opts.question,
                RetrieveOptions {
                    top_k_chunks: opts.top_k_chunks,
                    top_k_memories: opts.top_k_memories,
                    similarity_threshold: opts.similarity_threshold,
                },
            )
            .await
            .unwrap_or_default();

        // Pinned decision block.
        if !decisions.is_empty() {
            let block = self.formatter.format_memories(MemoryKind::Decision, &decisions);
            let tokens = self.tokenizer.count(&block);
            if tokens <= remaining {
                sections.push(block);
                remaining -= tokens;
                for d in &decisions {
                    sources.push(format!("decision: {}", truncate_label(&d.content, 60)));
                }
            }
        }

        let mut chunks_used = 0usize;
        let mut memories_used = 0usize;

        // Retrieved memories; conventions and constraints already ride in the
        // system prompt.
        for m in &retrieval.memories {
            if matches!(m.kind, MemoryKind::Convention | MemoryKind::Constraint) {
                continue;
            }
            let block = format!("- {}\n", m.content);
            let tokens = self.tokenizer.count(&block);
            if tokens <= remaining {
                sections.push(block);
                remaining -= tokens;
                memories_used += 1;
                sources.push(format!(
                    "memory ({}): {}",
                    m.kind,
                    truncate_label(&m.content, 60)
                ));
            }
        }

        // Retrieved chunks fill whatever budget is left.
        for c in &retrieval.chunks {
            let file_path = self
                .store
                .get_file_by_id(&c.file_id)
                .map(|f| f.path)
                .unwrap_or_default();
            let block = self.formatter.format_chunk(c, &file_path);
            let tokens = self.tokenizer.count(&block);
            if tokens <= remaining {
                sections.push(block);
                remaining -= tokens;
                chunks_used += 1;
                sources.push(format!("chunk: {}:{}-{}", file_path, c.start_line, c.end_line));
            } else if remaining > 100 {
                let mut truncated = c.clone();
                truncated.content = self.tokenizer.truncate(&c.content, remaining - 50);
                sections.push(self.formatter.format_chunk(&truncated, &file_path));
                remaining = 0;
                chunks_used += 1;
                sources.push(format!(
                    "chunk (truncated): {}:{}-{}",
                    file_path, c.start_line, c.end_line
                ));
                break;
            } else {
                break;
            }
        }

        Ok(BuiltContext {
            system_prompt,
            context_text: sections.join("\n"),
            tokens_used: opts.max_tokens - remaining,
            chunks_used,
            memories_used,
            sources,
        })
    }
}

fn truncate_label(s: &str, max: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max {
        return s.to_string();
    }
    format!("{}...", chars[..max].iter().collect::<String>())
}
