//! Command implementations and the plumbing they share.

mod ask;
mod context;
mod diff;
mod export_cmd;
mod forget;
mod hook;
mod init;
mod prune;
mod remember;
mod status;
mod update;

pub use ask::{ask, AskArgs};
pub use context::context;
pub use diff::{diff, DiffArgs};
pub use export_cmd::export;
pub use forget::{forget, ForgetArgs};
pub use hook::{hook_install, hook_status, hook_uninstall};
pub use init::init;
pub use prune::{prune, PruneArgs};
pub use remember::remember;
pub use status::status;
pub use update::{update, UpdateArgs};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use crate::adapter::{new_adapter, Embedder};
use crate::config::{self, GlobalConfig};
use crate::db::Db;
use crate::error::{MemvraError, Result};
use crate::export::{format_filename, ExportData};
use crate::git;
use crate::memory::{Store, VectorStore};
use crate::scanner::{self, ScannedFile, TechStack};

/// Locate the project root from the current directory.
pub fn find_root() -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(scanner::find_project_root(&cwd))
}

/// Fail with `NotInitialized` unless `.memvra/memvra.db` exists.
pub fn ensure_initialized(root: &Path) -> Result<PathBuf> {
    let db_path = config::project_db_path(root);
    if !db_path.exists() {
        return Err(MemvraError::NotInitialized);
    }
    Ok(db_path)
}

/// Open the store for an initialized project.
pub fn open_store(root: &Path) -> Result<(Arc<Db>, Store)> {
    let db_path = ensure_initialized(root)?;
    let db = Arc::new(Db::open(&db_path)?);
    let store = Store::new(db.clone());
    Ok((db, store))
}

/// Adapter used for embeddings, per the configured default embedder.
/// Returns None when construction fails (e.g. unknown provider name).
pub fn build_embedder(cfg: &GlobalConfig) -> Option<Embedder> {
    let name = cfg.default_embedder.as_str();
    new_adapter(name, &cfg.ollama.embed_model, cfg.api_key(name), &cfg.ollama.host).ok()
}

/// What happened when a scanned file was upserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Unchanged,
    Added,
    Modified,
}

/// Index a single scanned file: upsert the file row and replace its chunks.
/// `force` re-indexes even when the content hash is unchanged.
pub fn upsert_scanned_file(
    store: &Store,
    sf: &ScannedFile,
    force: bool,
) -> Result<(String, FileStatus)> {
    let existing = match store.get_file_by_path(&sf.file.path) {
        Ok(f) => Some(f),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e),
    };

    let status = match &existing {
        None => FileStatus::Added,
        Some(f) if force || f.content_hash != sf.file.content_hash => FileStatus::Modified,
        Some(f) => return Ok((f.id.clone(), FileStatus::Unchanged)),
    };

    let file_id = store.upsert_file(&sf.file)?;
    store.delete_chunks_by_file_id(&file_id)?;
    for chunk in &sf.chunks {
        let mut c = chunk.clone();
        c.file_id = file_id.clone();
        store.insert_chunk(&c)?;
    }
    Ok((file_id, status))
}

/// Remove a file plus the vectors of all of its chunks.
pub fn prune_deleted_file(store: &Store, vectors: &VectorStore, file_id: &str) {
    if let Ok(chunks) = store.list_chunks_by_file_id(file_id) {
        for c in &chunks {
            let _ = vectors.delete_chunk_embedding(&c.id);
        }
    }
    if let Err(e) = store.delete_file(file_id) {
        warn!("prune file {file_id}: {e}");
    }
}

/// Embed all chunks of the given files, 32 at a time. Returns the number of
/// chunks embedded; failures stop the file but not the batch run.
pub async fn embed_file_chunks(
    store: &Store,
    vectors: &VectorStore,
    embedder: &Embedder,
    file_ids: &[String],
) -> usize {
    const BATCH_SIZE: usize = 32;
    let mut embedded = 0usize;

    for file_id in file_ids {
        let Ok(chunks) = store.list_chunks_by_file_id(file_id) else {
            continue;
        };
        for batch in chunks.chunks(BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vecs = match embedder.embed(&texts).await {
                Ok(v) => v,
                Err(e) => {
                    warn!("embed batch failed: {e}");
                    break;
                }
            };
            for (chunk, vec) in batch.iter().zip(vecs.iter()) {
                match vectors.upsert_chunk_embedding(&chunk.id, vec) {
                    Ok(()) => embedded += 1,
                    Err(e) => warn!("chunk embedding upsert failed: {e}"),
                }
            }
        }
    }
    embedded
}

/// Update the file and chunk counts on the project row.
pub fn refresh_project_counts(store: &Store) {
    let Ok(mut project) = store.get_project() else {
        return;
    };
    if let (Ok(files), Ok(chunks)) = (store.count_files(), store.count_chunks()) {
        project.file_count = files;
        project.chunk_count = chunks;
        if let Err(e) = store.upsert_project(&project) {
            warn!("refresh project counts: {e}");
        }
    }
}

/// Regenerate all configured export files at the project root.
///
/// Best-effort: per-format failures are logged with a `warn:` prefix and
/// never abort the caller.
pub fn auto_export(root: &Path, store: &Store) {
    let (gcfg, _) = config::load(root);
    if !gcfg.auto_export.enabled || gcfg.auto_export.formats.is_empty() {
        return;
    }

    let Ok(project) = store.get_project() else {
        return;
    };
    let stack = TechStack::from_json(&project.tech_stack);
    let Ok(memories) = store.list_memories(None) else {
        return;
    };
    let sessions = store
        .get_last_n_sessions(gcfg.auto_export.max_sessions)
        .unwrap_or_default();
    let git_state = git::capture_working_state(root);

    let data = ExportData {
        project,
        stack,
        memories,
        sessions,
        git_state,
    };

    for format in &gcfg.auto_export.formats {
        let exporter = match crate::export::get(format) {
            Ok(e) => e,
            Err(_) => continue,
        };
        let output = match exporter.export(&data) {
            Ok(o) => o,
            Err(e) => {
                eprintln!("warn: auto-export {format} failed: {e}");
                continue;
            }
        };
        let Some(filename) = format_filename(format) else {
            continue;
        };
        if let Err(e) = write_atomic(&root.join(filename), &output) {
            eprintln!("warn: write {filename} failed: {e}");
        }
    }
}

/// Write via a temp file + rename so readers never observe a half-written
/// export.
fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)
}

/// Truncate to `max` characters for display labels.
pub fn truncate_label(s: &str, max: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max {
        return s.to_string();
    }
    format!("{}...", chars[..max].iter().collect::<String>())
}
