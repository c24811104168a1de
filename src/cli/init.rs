use std::path::Path;
use std::sync::Arc;

use crate::config;
use crate::db::Db;
use crate::error::Result;
use crate::export::format_filename;
use crate::memory::{Project, Store, VectorStore};
use crate::scanner::{self, ScanOptions};

use super::{auto_export, build_embedder, embed_file_chunks, upsert_scanned_file};

/// `memvra init` — create `.memvra/`, scan the project, and index it.
pub async fn init(root: &Path) -> Result<()> {
    let memvra_dir = config::project_dir(root);
    std::fs::create_dir_all(&memvra_dir)?;

    let db = Arc::new(Db::open(&config::project_db_path(root))?);
    let store = Store::new(db.clone());
    let vectors = VectorStore::new(db.clone());
    let (gcfg, pcfg) = config::load(root);

    println!("Scanning {}...", root.display());
    let result = scanner::scan(&ScanOptions {
        root: root.to_path_buf(),
        max_chunk_lines: gcfg.context.chunk_max_lines,
    });
    for err in &result.errors {
        eprintln!("  warning: {err}");
    }

    let name = if pcfg.project.name.is_empty() {
        result.stack.project_name.clone()
    } else {
        pcfg.project.name.clone()
    };

    store.upsert_project(&Project {
        name,
        root_path: root.display().to_string(),
        tech_stack: result.stack.to_json(),
        file_count: result.files.len() as i64,
        chunk_count: result.files.iter().map(|sf| sf.chunks.len() as i64).sum(),
        ..Default::default()
    })?;

    let mut file_ids = Vec::with_capacity(result.files.len());
    for sf in &result.files {
        let (id, _) = upsert_scanned_file(&store, sf, true)?;
        file_ids.push(id);
    }

    append_gitignore_entries(root)?;

    println!(
        "Indexed {} files ({} chunks).",
        result.files.len(),
        result.files.iter().map(|sf| sf.chunks.len()).sum::<usize>()
    );
    if !result.stack.language.is_empty() {
        println!(
            "Detected: {}{}",
            result.stack.language,
            if result.stack.framework.is_empty() {
                String::new()
            } else {
                format!(" / {}", result.stack.framework)
            }
        );
    }

    if let Some(embedder) = build_embedder(&gcfg) {
        println!("Generating embeddings...");
        let n = embed_file_chunks(&store, &vectors, &embedder, &file_ids).await;
        if n > 0 {
            println!("{n} chunks embedded.");
        }
    }

    auto_export(root, &store);
    println!("Done. Try `memvra ask \"how does this project work?\"`");
    Ok(())
}

/// Add `.memvra/` and the auto-export filenames to the project .gitignore,
/// skipping entries that are already present.
fn append_gitignore_entries(root: &Path) -> Result<()> {
    let path = root.join(".gitignore");
    let existing = std::fs::read_to_string(&path).unwrap_or_default();

    let mut wanted: Vec<&str> = vec![".memvra/"];
    for format in crate::export::valid_formats() {
        if let Some(name) = format_filename(format) {
            wanted.push(name);
        }
    }

    let missing: Vec<&str> = wanted
        .into_iter()
        .filter(|entry| !existing.lines().any(|line| line.trim() == *entry))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }

    let mut out = existing;
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("\n# memvra\n");
    for entry in missing {
        out.push_str(entry);
        out.push('\n');
    }
    std::fs::write(&path, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gitignore_entries_added_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "target/\nCLAUDE.md\n").unwrap();

        append_gitignore_entries(dir.path()).unwrap();
        let content = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert!(content.contains(".memvra/"));
        assert!(content.contains(".cursorrules"));
        assert_eq!(content.matches("CLAUDE.md").count(), 1);

        // Second run changes nothing.
        let before = content.clone();
        append_gitignore_entries(dir.path()).unwrap();
        let after = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(before, after);
    }
}
