use std::sync::Arc;

use memvra::db::Db;
use memvra::memory::{Memory, MemoryKind, Orchestrator, RetrieveOptions, Store, VectorStore};

fn setup() -> (Store, Orchestrator) {
    let db = Arc::new(Db::open_in_memory().unwrap());
    let store = Store::new(db.clone());
    let vectors = VectorStore::new(db.clone());
    let orchestrator = Orchestrator::new(store.clone(), vectors, None);
    (store, orchestrator)
}

fn memory(kind: MemoryKind, content: &str) -> Memory {
    Memory {
        id: String::new(),
        content: content.into(),
        kind,
        importance: kind.default_importance(),
        source: "user".into(),
        related_files: vec![],
        created_at: Default::default(),
        updated_at: Default::default(),
    }
}

#[tokio::test]
async fn retrieve_without_embedder_falls_back_to_all_memories() {
    let (store, orchestrator) = setup();
    store
        .insert_memory(&memory(MemoryKind::Decision, "use sqlite"))
        .unwrap();
    store
        .insert_memory(&memory(MemoryKind::Note, "port 8080"))
        .unwrap();

    let result = orchestrator
        .retrieve("anything", RetrieveOptions::default())
        .await
        .unwrap();

    assert!(result.chunks.is_empty());
    assert_eq!(result.memories.len(), 2);
}

#[tokio::test]
async fn remember_persists_without_embedder() {
    let (store, orchestrator) = setup();
    let m = orchestrator
        .remember("we decided to use PostgreSQL", MemoryKind::Decision, "user")
        .await
        .unwrap();

    assert!(!m.id.is_empty());
    assert_eq!(m.kind, MemoryKind::Decision);
    assert_eq!(m.importance, 0.8);

    let loaded = store.get_memory_by_id(&m.id).unwrap();
    assert_eq!(loaded.content, "we decided to use PostgreSQL");
    assert_eq!(loaded.source, "user");
}

#[tokio::test]
async fn forget_removes_memory_and_reports_missing() {
    let (store, orchestrator) = setup();
    let m = orchestrator
        .remember("temp", MemoryKind::Note, "user")
        .await
        .unwrap();

    orchestrator.forget(&m.id).unwrap();
    assert!(store.get_memory_by_id(&m.id).unwrap_err().is_not_found());
    assert!(orchestrator.forget(&m.id).unwrap_err().is_not_found());
}

#[tokio::test]
async fn forget_by_kind_validates_input() {
    let (store, orchestrator) = setup();
    store
        .insert_memory(&memory(MemoryKind::Todo, "one"))
        .unwrap();
    store
        .insert_memory(&memory(MemoryKind::Todo, "two"))
        .unwrap();

    assert!(orchestrator.forget_by_kind("episodic").is_err());
    assert_eq!(orchestrator.forget_by_kind("todo").unwrap(), 2);
}
