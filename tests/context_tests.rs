use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use memvra::context::{Builder, BuildOptions, Retriever, Tokenizer};
use memvra::db::Db;
use memvra::error::Result;
use memvra::memory::{
    Chunk, File, Memory, MemoryKind, Project, RetrievalResult, RetrieveOptions, Store,
};

/// Canned retrieval results, so the builder can be exercised without a live
/// embedder or vector index.
struct StubRetriever {
    chunks: Mutex<Vec<Chunk>>,
    memories: Mutex<Vec<Memory>>,
}

impl StubRetriever {
    fn new(chunks: Vec<Chunk>, memories: Vec<Memory>) -> Self {
        Self {
            chunks: Mutex::new(chunks),
            memories: Mutex::new(memories),
        }
    }

    fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

#[async_trait]
impl Retriever for StubRetriever {
    async fn retrieve(&self, _query: &str, _opts: RetrieveOptions) -> Result<RetrievalResult> {
        Ok(RetrievalResult {
            chunks: self.chunks.lock().unwrap().clone(),
            memories: self.memories.lock().unwrap().clone(),
        })
    }
}

fn test_store() -> Store {
    let store = Store::new(Arc::new(Db::open_in_memory().unwrap()));
    store
        .upsert_project(&Project {
            name: "demo".into(),
            tech_stack: r#"{"project_name":"demo","language":"Rust","framework":"Axum"}"#.into(),
            ..Default::default()
        })
        .unwrap();
    store
}

fn memory(kind: MemoryKind, content: &str) -> Memory {
    Memory {
        id: format!("{kind}-{}", content.len()),
        content: content.into(),
        kind,
        importance: kind.default_importance(),
        source: "user".into(),
        related_files: vec![],
        created_at: Default::default(),
        updated_at: Default::default(),
    }
}

/// Repeat a phrase until the block measures at least `tokens` tokens.
fn text_of_tokens(tokenizer: &Tokenizer, tokens: usize) -> String {
    let mut s = String::from("alpha");
    while tokenizer.count(&s) < tokens {
        s.push_str(" alpha beta gamma");
    }
    s
}

#[tokio::test]
async fn defaults_fill_in() {
    let store = test_store();
    let retriever = StubRetriever::empty();
    let tokenizer = Tokenizer::new().unwrap();
    let builder = Builder::new(&store, &retriever, &tokenizer);

    let built = builder
        .build(BuildOptions {
            question: "how does auth work?".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(built.system_prompt.contains("demo"));
    assert!(built.system_prompt.contains("Rust"));
    assert!(built.tokens_used <= 8000);
}

#[tokio::test]
async fn conventions_ride_in_system_prompt_not_context() {
    let store = test_store();
    store
        .insert_memory(&memory(MemoryKind::Convention, "snake_case names"))
        .unwrap();
    store
        .insert_memory(&memory(MemoryKind::Constraint, "never block the executor"))
        .unwrap();

    // Retrieval also returns the convention; the builder must skip it.
    let retriever = StubRetriever::new(
        Vec::new(),
        vec![
            memory(MemoryKind::Convention, "snake_case names"),
            memory(MemoryKind::Note, "uses port 8080"),
        ],
    );
    let tokenizer = Tokenizer::new().unwrap();
    let builder = Builder::new(&store, &retriever, &tokenizer);

    let built = builder
        .build(BuildOptions {
            question: "q".into(),
            max_tokens: 500,
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(built.system_prompt.contains("snake_case names"));
    assert!(built.system_prompt.contains("never block the executor"));
    assert!(!built.context_text.contains("snake_case names"));
    assert!(built.context_text.contains("uses port 8080"));
    assert_eq!(built.memories_used, 1);
    assert!(built
        .sources
        .iter()
        .any(|s| s.starts_with("memory (note):")));
}

#[tokio::test]
async fn budget_excludes_oversized_chunk() {
    let store = test_store();
    store
        .insert_memory(&memory(MemoryKind::Convention, "thirty tokens of convention text here"))
        .unwrap();
    store
        .insert_memory(&memory(MemoryKind::Decision, "we decided to keep sqlite"))
        .unwrap();

    let tokenizer = Tokenizer::new().unwrap();
    let file_id = store
        .upsert_file(&File {
            path: "src/big.rs".into(),
            language: "rust".into(),
            content_hash: "h".into(),
            ..Default::default()
        })
        .unwrap();
    let big_chunk = Chunk {
        id: "big".into(),
        file_id,
        content: text_of_tokens(&tokenizer, 80),
        start_line: 1,
        end_line: 40,
        chunk_type: "code".into(),
    };

    let retriever = StubRetriever::new(vec![big_chunk], Vec::new());
    let builder = Builder::new(&store, &retriever, &tokenizer);

    let built = builder
        .build(BuildOptions {
            question: "q".into(),
            max_tokens: 100,
            ..Default::default()
        })
        .await
        .unwrap();

    // Convention lives in the (uncharged) system prompt; the decision block
    // fits; the 80-token chunk does not, and remaining <= 100 forbids
    // truncation.
    assert!(built.system_prompt.contains("convention text"));
    assert!(built.context_text.contains("keep sqlite"));
    assert_eq!(built.chunks_used, 0);
    assert!(!built.context_text.contains("src/big.rs"));
    assert!(built.tokens_used <= 100);
}

#[tokio::test]
async fn oversized_chunk_is_truncated_when_room_remains() {
    let store = test_store();
    let tokenizer = Tokenizer::new().unwrap();
    let file_id = store
        .upsert_file(&File {
            path: "src/huge.rs".into(),
            language: "rust".into(),
            content_hash: "h".into(),
            ..Default::default()
        })
        .unwrap();
    let huge_chunk = Chunk {
        id: "huge".into(),
        file_id,
        content: text_of_tokens(&tokenizer, 5000),
        start_line: 1,
        end_line: 900,
        chunk_type: "code".into(),
    };

    let retriever = StubRetriever::new(vec![huge_chunk], Vec::new());
    let builder = Builder::new(&store, &retriever, &tokenizer);

    let built = builder
        .build(BuildOptions {
            question: "q".into(),
            max_tokens: 400,
            ..Default::default()
        })
        .await
        .unwrap();

    // remaining (400) > 100, so the chunk is truncated to remaining - 50 and
    // the budget is fully consumed.
    assert_eq!(built.chunks_used, 1);
    assert_eq!(built.tokens_used, 400);
    assert!(built
        .sources
        .iter()
        .any(|s| s.starts_with("chunk (truncated): src/huge.rs")));
}

#[tokio::test]
async fn tokens_used_never_exceeds_budget() {
    let store = test_store();
    store
        .insert_memory(&memory(MemoryKind::Decision, "decision one"))
        .unwrap();

    let retriever = StubRetriever::new(
        Vec::new(),
        vec![
            memory(MemoryKind::Note, "note one"),
            memory(MemoryKind::Note, "note two"),
            memory(MemoryKind::Todo, "todo one"),
        ],
    );
    let tokenizer = Tokenizer::new().unwrap();
    let builder = Builder::new(&store, &retriever, &tokenizer);

    for budget in [10usize, 30, 60, 200] {
        let built = builder
            .build(BuildOptions {
                question: "q".into(),
                max_tokens: budget,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(built.tokens_used <= budget, "budget {budget}");
        let measured = tokenizer.count(&built.context_text);
        assert!(measured <= budget + 8, "measured {measured} vs budget {budget}");
    }
}

#[tokio::test]
async fn explicit_files_are_pinned_first() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("pinned.rs"), "fn pinned() {}\n").unwrap();

    let store = test_store();
    let retriever = StubRetriever::empty();
    let tokenizer = Tokenizer::new().unwrap();
    let builder = Builder::new(&store, &retriever, &tokenizer);

    let built = builder
        .build(BuildOptions {
            question: "q".into(),
            project_root: dir.path().display().to_string(),
            extra_files: vec!["pinned.rs".into(), "missing.rs".into()],
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(built.context_text.contains("fn pinned()"));
    assert_eq!(built.sources, vec!["file (explicit): pinned.rs"]);
    // missing.rs was skipped silently
    assert!(!built.context_text.contains("missing.rs"));
}

#[tokio::test]
async fn chunk_sources_cite_file_and_lines() {
    let store = test_store();
    let tokenizer = Tokenizer::new().unwrap();
    let file_id = store
        .upsert_file(&File {
            path: "src/auth.rs".into(),
            language: "rust".into(),
            content_hash: "h".into(),
            ..Default::default()
        })
        .unwrap();
    let chunk = Chunk {
        id: "c".into(),
        file_id,
        content: "fn login() {}".into(),
        start_line: 12,
        end_line: 30,
        chunk_type: "code".into(),
    };

    let retriever = StubRetriever::new(vec![chunk], Vec::new());
    let builder = Builder::new(&store, &retriever, &tokenizer);

    let built = builder
        .build(BuildOptions {
            question: "q".into(),
            max_tokens: 500,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(built.chunks_used, 1);
    assert!(built.context_text.contains("### src/auth.rs (lines 12-30)"));
    assert!(built.sources.contains(&"chunk: src/auth.rs:12-30".to_string()));
}
