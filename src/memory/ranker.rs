use std::collections::HashMap;

use super::{Chunk, Memory};

/// Score weight applied to test chunks; everything else counts fully.
const TEST_CHUNK_WEIGHT: f64 = 0.3;

/// A chunk paired with its retrieval score.
#[derive(Debug, Clone)]
pub struct RankedChunk {
    pub chunk: Chunk,
    pub final_score: f64,
}

/// A memory paired with its retrieval score.
#[derive(Debug, Clone)]
pub struct RankedMemory {
    pub memory: Memory,
    pub final_score: f64,
}

/// Score and sort chunks by similarity × type weight, highest first.
/// `similarity_by_id` maps chunk id → similarity in (0, 1]. Ties keep
/// insertion order.
pub fn rank_chunks(chunks: Vec<Chunk>, similarity_by_id: &HashMap<String, f64>) -> Vec<RankedChunk> {
    let mut ranked: Vec<RankedChunk> = chunks
        .into_iter()
        .map(|c| {
            let sim = similarity_by_id.get(&c.id).copied().unwrap_or(0.0);
            let weight = if c.chunk_type == "test" { TEST_CHUNK_WEIGHT } else { 1.0 };
            RankedChunk {
                final_score: sim * weight,
                chunk: c,
            }
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

/// Score and sort memories by similarity × importance, highest first.
/// Zero importance is treated as 0.5 so unsourced rows still surface.
pub fn rank_memories(
    memories: Vec<Memory>,
    similarity_by_id: &HashMap<String, f64>,
) -> Vec<RankedMemory> {
    let mut ranked: Vec<RankedMemory> = memories
        .into_iter()
        .map(|m| {
            let sim = similarity_by_id.get(&m.id).copied().unwrap_or(0.0);
            let importance = m.importance.max(0.5);
            RankedMemory {
                final_score: sim * importance,
                memory: m,
            }
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

#[cfg(test)]
#[path = "ranker_tests.rs"]
mod tests;
