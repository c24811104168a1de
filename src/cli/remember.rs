use std::path::Path;

use crate::config;
use crate::error::Result;
use crate::memory::{classify_memory_kind, MemoryKind, Orchestrator, VectorStore};

use super::{auto_export, build_embedder, open_store};

/// `memvra remember` — store a memory, classifying it when no type is given.
pub async fn remember(root: &Path, content: &str, kind_flag: Option<&str>) -> Result<()> {
    let (db, store) = open_store(root)?;
    let vectors = VectorStore::new(db.clone());
    let (gcfg, _) = config::load(root);

    let kind: MemoryKind = match kind_flag {
        Some(k) => k.parse()?,
        None => classify_memory_kind(content),
    };

    let orchestrator = Orchestrator::new(store.clone(), vectors, build_embedder(&gcfg));
    let memory = orchestrator.remember(content, kind, "user").await?;

    println!("Remembered as {} (id: {})", memory.kind, memory.id);
    auto_export(root, &store);
    Ok(())
}
