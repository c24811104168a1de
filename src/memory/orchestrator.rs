use std::collections::HashMap;

use tracing::warn;

use crate::adapter::Embedder;
use crate::error::{MemvraError, Result};

use super::{
    rank_chunks, rank_memories, Chunk, Memory, MemoryKind, Store, VectorStore,
};

/// How many results to pull back and how similar they must be.
#[derive(Debug, Clone, Copy)]
pub struct RetrieveOptions {
    pub top_k_chunks: usize,
    pub top_k_memories: usize,
    pub similarity_threshold: f64,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            top_k_chunks: 10,
            top_k_memories: 5,
            similarity_threshold: 0.3,
        }
    }
}

/// Ranked retrieval output for context building.
#[derive(Debug, Default)]
pub struct RetrievalResult {
    pub chunks: Vec<Chunk>,
    pub memories: Vec<Memory>,
}

/// Coordinates storage, embedding, and retrieval of memories and chunks.
///
/// Exists for the lifetime of a single command; composes the store and
/// vector store but owns neither.
pub struct Orchestrator {
    store: Store,
    vectors: VectorStore,
    embedder: Option<Embedder>,
}

impl Orchestrator {
    pub fn new(store: Store, vectors: VectorStore, embedder: Option<Embedder>) -> Self {
        Self {
            store,
            vectors,
            embedder,
        }
    }

    /// Embed the query and return ranked chunks and memories.
    ///
    /// With no embedder (or a failing one) retrieval degrades to listing all
    /// memories so downstream context building still has something to work
    /// with. Stale vector hits whose rows are gone are skipped.
    pub async fn retrieve(&self, query: &str, opts: RetrieveOptions) -> Result<RetrievalResult> {
        let query_vec = match &self.embedder {
            Some(embedder) => match embedder.embed(&[query.to_string()]).await {
                Ok(mut vecs) if !vecs.is_empty() => vecs.remove(0),
                Ok(_) => return self.fallback(),
                Err(e) => {
                    warn!("query embedding failed, falling back to memory listing: {e}");
                    return self.fallback();
                }
            },
            None => return self.fallback(),
        };

        let chunk_matches =
            self.vectors
                .search_chunks(&query_vec, opts.top_k_chunks, opts.similarity_threshold);
        let memory_matches = self.vectors.search_memories(
            &query_vec,
            opts.top_k_memories,
            opts.similarity_threshold,
        );

        let mut chunk_sims: HashMap<String, f64> = HashMap::with_capacity(chunk_matches.len());
        let mut chunks = Vec::with_capacity(chunk_matches.len());
        for m in &chunk_matches {
            chunk_sims.insert(m.id.clone(), m.similarity());
            match self.store.get_chunk_by_id(&m.id) {
                Ok(c) => chunks.push(c),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }

        let mut memory_sims: HashMap<String, f64> = HashMap::with_capacity(memory_matches.len());
        let mut memories = Vec::with_capacity(memory_matches.len());
        for m in &memory_matches {
            memory_sims.insert(m.id.clone(), m.similarity());
            match self.store.get_memory_by_id(&m.id) {
                Ok(mem) => memories.push(mem),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(RetrievalResult {
            chunks: rank_chunks(chunks, &chunk_sims)
                .into_iter()
                .map(|rc| rc.chunk)
                .collect(),
            memories: rank_memories(memories, &memory_sims)
                .into_iter()
                .map(|rm| rm.memory)
                .collect(),
        })
    }

    fn fallback(&self) -> Result<RetrievalResult> {
        Ok(RetrievalResult {
            chunks: Vec::new(),
            memories: self.store.list_memories(None)?,
        })
    }

    /// Store a memory with its embedding. Embedding failure is logged, not
    /// propagated.
    pub async fn remember(
        &self,
        content: &str,
        kind: MemoryKind,
        source: &str,
    ) -> Result<Memory> {
        let mut memory = Memory {
            id: String::new(),
            content: content.to_string(),
            kind,
            importance: kind.default_importance(),
            source: source.to_string(),
            related_files: Vec::new(),
            created_at: Default::default(),
            updated_at: Default::default(),
        };

        memory.id = self.store.insert_memory(&memory)?;

        if let Some(embedder) = &self.embedder {
            match embedder.embed(&[content.to_string()]).await {
                Ok(vecs) if !vecs.is_empty() => {
                    if let Err(e) = self.vectors.upsert_memory_embedding(&memory.id, &vecs[0]) {
                        warn!("memory embedding upsert failed: {e}");
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("memory embedding failed: {e}"),
            }
        }

        Ok(memory)
    }

    /// Remove a memory and its vector. The vector delete is best-effort.
    pub fn forget(&self, id: &str) -> Result<()> {
        self.store.delete_memory(id)?;
        if let Err(e) = self.vectors.delete_memory_embedding(id) {
            warn!("memory vector delete failed: {e}");
        }
        Ok(())
    }

    /// Remove every memory of a kind. Returns the deleted count.
    pub fn forget_by_kind(&self, kind_name: &str) -> Result<usize> {
        let kind: MemoryKind = kind_name
            .parse()
            .map_err(|_| MemvraError::InvalidInput(format!("unknown memory type {kind_name:?}")))?;
        self.store.delete_memories_by_kind(kind)
    }
}
