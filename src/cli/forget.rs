use std::path::Path;

use crate::config;
use crate::error::{MemvraError, Result};
use crate::memory::{Orchestrator, VectorStore};

use super::{auto_export, build_embedder, open_store};

#[derive(Debug, Default)]
pub struct ForgetArgs {
    /// Memory id to delete.
    pub id: Option<String>,
    /// Delete every memory of this kind.
    pub kind: Option<String>,
    /// Delete all memories.
    pub all: bool,
}

/// `memvra forget` — delete memories by id, kind, or wholesale.
pub async fn forget(root: &Path, args: ForgetArgs) -> Result<()> {
    let (db, store) = open_store(root)?;
    let vectors = VectorStore::new(db.clone());
    let (gcfg, _) = config::load(root);
    let orchestrator = Orchestrator::new(store.clone(), vectors.clone(), build_embedder(&gcfg));

    if args.all {
        let memories = store.list_memories(None)?;
        for m in &memories {
            let _ = vectors.delete_memory_embedding(&m.id);
        }
        let n = store.delete_all_memories()?;
        println!("Deleted {n} memories.");
    } else if let Some(kind) = &args.kind {
        let parsed = kind.parse()?;
        let memories = store.list_memories(Some(parsed))?;
        for m in &memories {
            let _ = vectors.delete_memory_embedding(&m.id);
        }
        let n = orchestrator.forget_by_kind(kind)?;
        println!("Deleted {n} {kind} memories.");
    } else if let Some(id) = &args.id {
        orchestrator.forget(id)?;
        println!("Forgot memory {id}.");
    } else {
        return Err(MemvraError::InvalidInput(
            "pass a memory id, --type <kind>, or --all".into(),
        ));
    }

    auto_export(root, &store);
    Ok(())
}
