use std::collections::HashMap;

use super::*;
use crate::memory::MemoryKind;

fn chunk(id: &str, chunk_type: &str) -> Chunk {
    Chunk {
        id: id.into(),
        file_id: "f1".into(),
        content: "fn demo() {}".into(),
        start_line: 1,
        end_line: 1,
        chunk_type: chunk_type.into(),
    }
}

fn memory(id: &str, importance: f64) -> Memory {
    Memory {
        id: id.into(),
        content: "remember this".into(),
        kind: MemoryKind::Note,
        importance,
        source: "user".into(),
        related_files: vec![],
        created_at: Default::default(),
        updated_at: Default::default(),
    }
}

fn sims(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[test]
fn test_chunks_are_deprioritised() {
    let ranked = rank_chunks(
        vec![chunk("t", "test"), chunk("c", "code")],
        &sims(&[("t", 0.9), ("c", 0.5)]),
    );
    // 0.9 * 0.3 = 0.27 loses to 0.5 * 1.0.
    assert_eq!(ranked[0].chunk.id, "c");
    assert!((ranked[0].final_score - 0.5).abs() < 1e-9);
    assert!((ranked[1].final_score - 0.27).abs() < 1e-9);
}

#[test]
fn config_and_docs_chunks_count_fully() {
    let ranked = rank_chunks(
        vec![chunk("cfg", "config"), chunk("doc", "docs")],
        &sims(&[("cfg", 0.4), ("doc", 0.6)]),
    );
    assert_eq!(ranked[0].chunk.id, "doc");
    assert!((ranked[0].final_score - 0.6).abs() < 1e-9);
    assert!((ranked[1].final_score - 0.4).abs() < 1e-9);
}

#[test]
fn memories_weighted_by_importance() {
    let ranked = rank_memories(
        vec![memory("low", 0.5), memory("high", 1.0)],
        &sims(&[("low", 0.8), ("high", 0.5)]),
    );
    // 0.5 * 1.0 = 0.5 beats 0.8 * 0.5 = 0.4.
    assert_eq!(ranked[0].memory.id, "high");
}

#[test]
fn zero_importance_is_floored() {
    let ranked = rank_memories(vec![memory("z", 0.0)], &sims(&[("z", 0.6)]));
    assert!((ranked[0].final_score - 0.3).abs() < 1e-9);
}

#[test]
fn missing_similarity_scores_zero() {
    let ranked = rank_chunks(vec![chunk("a", "code")], &HashMap::new());
    assert_eq!(ranked[0].final_score, 0.0);
}

#[test]
fn ties_keep_insertion_order() {
    let ranked = rank_chunks(
        vec![chunk("first", "code"), chunk("second", "code")],
        &sims(&[("first", 0.5), ("second", 0.5)]),
    );
    assert_eq!(ranked[0].chunk.id, "first");
    assert_eq!(ranked[1].chunk.id, "second");
}
