use std::sync::Arc;

use rusqlite::params;

use crate::db::Db;
use crate::error::{MemvraError, Result};

/// A single similarity-search hit: id plus raw L2 distance, ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub id: String,
    pub distance: f64,
}

impl VectorMatch {
    /// Distance mapped into (0, 1]: `1 / (1 + distance)`.
    pub fn similarity(&self) -> f64 {
        1.0 / (1.0 + self.distance)
    }
}

/// Similarity search over the vec0 indices (`vec_chunks`, `vec_memories`).
///
/// Borrows the same connection as the relational store. When the vec
/// extension is unavailable, searches return empty results instead of
/// erroring, so retrieval falls through to full-memory listing.
#[derive(Clone)]
pub struct VectorStore {
    db: Arc<Db>,
}

impl VectorStore {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        let want = self.db.embedding_dimension();
        if embedding.len() != want {
            return Err(MemvraError::Vector(format!(
                "embedding dimension {} does not match index dimension {want} — \
                 the store was created for a different embedding model",
                embedding.len()
            )));
        }
        Ok(())
    }

    fn upsert(&self, table: &str, id: &str, embedding: &[f32]) -> Result<()> {
        if embedding.is_empty() {
            return Ok(());
        }
        if !self.db.vec_available() {
            return Err(MemvraError::Vector("extension not loaded".into()));
        }
        self.check_dimension(embedding)?;

        let blob = f32s_to_blob(embedding);
        // vec0 virtual tables reject ON CONFLICT clauses; delete-then-insert
        // gives the same idempotency per id.
        let conn = self.db.conn()?;
        conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), [id])?;
        conn.execute(
            &format!("INSERT INTO {table} (id, embedding) VALUES (?1, ?2)"),
            params![id, blob],
        )?;
        Ok(())
    }

    pub fn upsert_chunk_embedding(&self, id: &str, embedding: &[f32]) -> Result<()> {
        self.upsert("vec_chunks", id, embedding)
    }

    pub fn upsert_memory_embedding(&self, id: &str, embedding: &[f32]) -> Result<()> {
        self.upsert("vec_memories", id, embedding)
    }

    pub fn delete_chunk_embedding(&self, id: &str) -> Result<()> {
        if !self.db.vec_available() {
            return Ok(());
        }
        self.db
            .conn()?
            .execute("DELETE FROM vec_chunks WHERE id = ?1", [id])?;
        Ok(())
    }

    pub fn delete_memory_embedding(&self, id: &str) -> Result<()> {
        if !self.db.vec_available() {
            return Ok(());
        }
        self.db
            .conn()?
            .execute("DELETE FROM vec_memories WHERE id = ?1", [id])?;
        Ok(())
    }

    fn search(
        &self,
        table: &str,
        query: &[f32],
        top_k: usize,
        min_similarity: f64,
    ) -> Vec<VectorMatch> {
        if query.is_empty() || top_k == 0 || !self.db.vec_available() {
            return Vec::new();
        }
        let blob = f32s_to_blob(query);
        let Ok(conn) = self.db.conn() else {
            return Vec::new();
        };
        let Ok(mut stmt) = conn.prepare(&format!(
            "SELECT id, distance FROM {table}
             WHERE embedding MATCH ?1 AND k = ?2
             ORDER BY distance"
        )) else {
            return Vec::new();
        };

        let rows = stmt.query_map(params![blob, top_k as i64], |row| {
            Ok(VectorMatch {
                id: row.get(0)?,
                distance: row.get(1)?,
            })
        });
        match rows {
            Ok(iter) => iter
                .filter_map(|r| r.ok())
                .filter(|m| m.similarity() >= min_similarity)
                .collect(),
            // Query shape or extension mismatch: degrade, don't fail.
            Err(_) => Vec::new(),
        }
    }

    /// Top-k chunk matches by ascending L2 distance, filtered by
    /// `similarity >= min_similarity`.
    pub fn search_chunks(
        &self,
        query: &[f32],
        top_k: usize,
        min_similarity: f64,
    ) -> Vec<VectorMatch> {
        self.search("vec_chunks", query, top_k, min_similarity)
    }

    pub fn search_memories(
        &self,
        query: &[f32],
        top_k: usize,
        min_similarity: f64,
    ) -> Vec<VectorMatch> {
        self.search("vec_memories", query, top_k, min_similarity)
    }
}

/// Serialize an f32 vector to the little-endian blob layout sqlite-vec
/// expects (4 bytes per element).
pub fn f32s_to_blob(v: &[f32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(v.len() * 4);
    for &f in v {
        buf.extend_from_slice(&f.to_le_bytes());
    }
    buf
}

/// Deserialize a little-endian blob back to f32s.
pub fn blob_to_f32s(b: &[u8]) -> Vec<f32> {
    b.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().expect("4-byte chunk")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_round_trip_is_byte_identical() {
        let v = vec![0.0f32, 1.5, -2.25, f32::MIN_POSITIVE, 1e30];
        let blob = f32s_to_blob(&v);
        assert_eq!(blob.len(), v.len() * 4);
        let back = blob_to_f32s(&blob);
        assert_eq!(back, v);
        assert_eq!(f32s_to_blob(&back), blob);
    }

    #[test]
    fn similarity_transform() {
        let zero = VectorMatch { id: "a".into(), distance: 0.0 };
        assert_eq!(zero.similarity(), 1.0);
        let one = VectorMatch { id: "b".into(), distance: 1.0 };
        assert_eq!(one.similarity(), 0.5);
        // threshold 0.3 keeps distance <= 7/3
        let edge = VectorMatch { id: "c".into(), distance: 7.0 / 3.0 };
        assert!(edge.similarity() >= 0.3 - 1e-12);
        let beyond = VectorMatch { id: "d".into(), distance: 7.0 / 3.0 + 0.01 };
        assert!(beyond.similarity() < 0.3);
    }
}
