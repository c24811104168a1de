use std::sync::Arc;

use memvra::db::Db;
use memvra::error::MemvraError;
use memvra::memory::{blob_to_f32s, f32s_to_blob, VectorStore};

const DIM: usize = 768;

fn test_vectors() -> (Arc<Db>, VectorStore) {
    let db = Arc::new(Db::open_in_memory().unwrap());
    assert!(db.vec_available(), "bundled sqlite-vec should load in tests");
    let vectors = VectorStore::new(db.clone());
    (db, vectors)
}

/// A unit vector with a single non-zero component.
fn basis(i: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    v[i] = 1.0;
    v
}

#[test]
fn upsert_and_exact_match() {
    let (_db, vectors) = test_vectors();
    vectors.upsert_chunk_embedding("c1", &basis(0)).unwrap();
    vectors.upsert_chunk_embedding("c2", &basis(1)).unwrap();

    let matches = vectors.search_chunks(&basis(0), 5, 0.0);
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].id, "c1");
    assert!(matches[0].distance < 1e-6);
    assert!((matches[0].similarity() - 1.0).abs() < 1e-6);
    // The orthogonal vector sits at L2 distance sqrt(2).
    assert!((matches[1].distance - std::f64::consts::SQRT_2).abs() < 1e-5);
}

#[test]
fn search_orders_by_ascending_distance_and_truncates() {
    let (_db, vectors) = test_vectors();
    for i in 0..6 {
        let mut v = basis(0);
        v[1] = i as f32 * 0.1;
        vectors
            .upsert_memory_embedding(&format!("m{i}"), &v)
            .unwrap();
    }

    let matches = vectors.search_memories(&basis(0), 3, 0.0);
    assert_eq!(matches.len(), 3);
    assert_eq!(matches[0].id, "m0");
    assert!(matches.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[test]
fn threshold_filters_low_similarity() {
    let (_db, vectors) = test_vectors();
    vectors.upsert_chunk_embedding("near", &basis(0)).unwrap();
    let mut far = vec![0.0f32; DIM];
    far[2] = 10.0;
    vectors.upsert_chunk_embedding("far", &far).unwrap();

    // "far" sits at distance sqrt(101) ≈ 10.05 → similarity ≈ 0.09.
    let matches = vectors.search_chunks(&basis(0), 5, 0.3);
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, "near");
}

#[test]
fn upsert_is_idempotent_per_id() {
    let (_db, vectors) = test_vectors();
    vectors.upsert_chunk_embedding("c1", &basis(0)).unwrap();
    vectors.upsert_chunk_embedding("c1", &basis(1)).unwrap();

    // Only the latest embedding remains for the id.
    let matches = vectors.search_chunks(&basis(1), 5, 0.0);
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, "c1");
    assert!(matches[0].distance < 1e-6);
}

#[test]
fn delete_removes_from_index() {
    let (_db, vectors) = test_vectors();
    vectors.upsert_memory_embedding("m1", &basis(0)).unwrap();
    vectors.delete_memory_embedding("m1").unwrap();
    assert!(vectors.search_memories(&basis(0), 5, 0.0).is_empty());

    // Deleting an absent id is fine.
    vectors.delete_memory_embedding("m1").unwrap();
}

#[test]
fn dimension_mismatch_is_rejected_loudly() {
    let (_db, vectors) = test_vectors();
    let err = vectors
        .upsert_chunk_embedding("bad", &vec![0.5f32; 1536])
        .unwrap_err();
    assert!(matches!(err, MemvraError::Vector(_)));
    assert!(err.to_string().contains("1536"));
    assert!(err.to_string().contains("768"));
}

#[test]
fn empty_inputs_are_noops() {
    let (_db, vectors) = test_vectors();
    vectors.upsert_chunk_embedding("c1", &[]).unwrap();
    assert!(vectors.search_chunks(&[], 5, 0.0).is_empty());
    assert!(vectors.search_chunks(&basis(0), 0, 0.0).is_empty());
}

#[test]
fn blob_layout_is_little_endian_f32() {
    let v = vec![1.0f32, -0.5];
    let blob = f32s_to_blob(&v);
    assert_eq!(blob, vec![0x00, 0x00, 0x80, 0x3f, 0x00, 0x00, 0x00, 0xbf]);
    assert_eq!(blob_to_f32s(&blob), v);
}
