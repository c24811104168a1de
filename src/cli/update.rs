use std::collections::HashSet;
use std::path::Path;

use crate::config;
use crate::error::Result;
use crate::memory::VectorStore;
use crate::scanner::{self, ScanOptions};

use super::{
    auto_export, build_embedder, embed_file_chunks, open_store, prune_deleted_file,
    refresh_project_counts, upsert_scanned_file, FileStatus,
};

#[derive(Debug, Default)]
pub struct UpdateArgs {
    /// Re-index all files, ignoring content hashes.
    pub force: bool,
    /// Suppress output (used by git hooks).
    pub quiet: bool,
}

/// `memvra update` — rescan the tree and reconcile the index incrementally.
pub async fn update(root: &Path, args: UpdateArgs) -> Result<()> {
    let (db, store) = open_store(root)?;
    let vectors = VectorStore::new(db.clone());
    let (gcfg, _) = config::load(root);

    let result = scanner::scan(&ScanOptions {
        root: root.to_path_buf(),
        max_chunk_lines: gcfg.context.chunk_max_lines,
    });

    let mut added = 0usize;
    let mut modified = 0usize;
    let mut skipped = 0usize;
    let mut changed_file_ids = Vec::new();

    for sf in &result.files {
        match upsert_scanned_file(&store, sf, args.force) {
            Ok((id, FileStatus::Added)) => {
                added += 1;
                changed_file_ids.push(id);
            }
            Ok((id, FileStatus::Modified)) => {
                modified += 1;
                changed_file_ids.push(id);
            }
            Ok((_, FileStatus::Unchanged)) => skipped += 1,
            Err(e) => eprintln!("  warning: {}: {e}", sf.file.path),
        }
    }

    // Prune rows whose files are no longer on disk.
    let mut deleted = 0usize;
    if let Ok(db_files) = store.list_files() {
        let scanned: HashSet<&str> = result.files.iter().map(|sf| sf.file.path.as_str()).collect();
        for f in &db_files {
            if !scanned.contains(f.path.as_str()) {
                prune_deleted_file(&store, &vectors, &f.id);
                deleted += 1;
            }
        }
    }

    refresh_project_counts(&store);

    if !args.quiet {
        println!("Modified: {modified} files");
        println!("Added:    {added} files");
        println!("Deleted:  {deleted} files");
        println!("Skipped:  {skipped} files (unchanged)");
        println!(
            "Total:    {} files, {} chunks",
            store.count_files().unwrap_or(0),
            store.count_chunks().unwrap_or(0)
        );
    }

    if !changed_file_ids.is_empty() {
        if let Some(embedder) = build_embedder(&gcfg) {
            let n = embed_file_chunks(&store, &vectors, &embedder, &changed_file_ids).await;
            if !args.quiet && n > 0 {
                println!("{n} chunks re-embedded");
            }
        }
    }

    auto_export(root, &store);
    Ok(())
}
