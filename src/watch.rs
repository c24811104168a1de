//! Debounced filesystem watcher: batches change events and reconciles the
//! index incrementally, producing the same outcome as a full rescan.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use walkdir::WalkDir;

use crate::cli::{
    auto_export, build_embedder, embed_file_chunks, open_store, prune_deleted_file,
    refresh_project_counts, upsert_scanned_file, FileStatus,
};
use crate::config;
use crate::error::{MemvraError, Result};
use crate::memory::VectorStore;
use crate::scanner::{self, hard_ignore, language_for_file, skip_file, IgnoreMatcher};

pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Change type tracked per pending path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Write,
    Remove,
}

/// Run the watcher loop until SIGINT/SIGTERM.
///
/// Single cooperative loop multiplexing filesystem events, the debounce
/// timer, and the shutdown flag. Runs on the caller's thread; `handle` is
/// used to drive embedding calls.
pub fn run(root: &Path, debounce_ms: u64, handle: tokio::runtime::Handle) -> Result<()> {
    let (db, store) = open_store(root)?;
    let vectors = VectorStore::new(db.clone());
    let (gcfg, _) = config::load(root);
    let ignore = IgnoreMatcher::new(root);

    let debounce = Duration::from_millis(if debounce_ms == 0 {
        DEFAULT_DEBOUNCE_MS
    } else {
        debounce_ms
    });

    let shutdown = Arc::new(AtomicBool::new(false));
    for sig in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(sig, shutdown.clone())
            .map_err(|e| MemvraError::Internal(format!("signal handler: {e}")))?;
    }

    let (tx, rx) = mpsc::channel::<Event>();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        },
        notify::Config::default(),
    )
    .map_err(|e| MemvraError::Internal(format!("create watcher: {e}")))?;

    add_watch_dirs(&mut watcher, root, &ignore)?;

    println!(
        "Watching {} for changes (debounce {}ms). Press Ctrl-C to stop.",
        root.display(),
        debounce.as_millis()
    );

    let mut pending: HashMap<String, Op> = HashMap::new();
    let mut deadline: Option<Instant> = None;

    loop {
        if shutdown.load(Ordering::Relaxed) {
            println!("\nStopping watcher.");
            return Ok(());
        }

        // Wake at the debounce deadline when a batch is pending; otherwise
        // poll so shutdown stays responsive.
        let timeout = match deadline {
            Some(d) => d.saturating_duration_since(Instant::now()),
            None => Duration::from_millis(200),
        };

        match rx.recv_timeout(timeout) {
            Ok(event) => {
                if apply_event(&event, root, &ignore, &mut watcher, &mut pending) {
                    deadline = Some(Instant::now() + debounce);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                let due = deadline.is_some_and(|d| Instant::now() >= d);
                if due && !pending.is_empty() {
                    let batch = std::mem::take(&mut pending);
                    deadline = None;
                    process_batch(root, batch, &store, &vectors, &ignore, &gcfg, &handle);
                } else if due {
                    deadline = None;
                }
            }
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        }
    }
}

/// Watch every non-ignored directory under the root.
fn add_watch_dirs(
    watcher: &mut RecommendedWatcher,
    root: &Path,
    ignore: &IgnoreMatcher,
) -> Result<()> {
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if entry.depth() > 0 && hard_ignore(&name) {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .map(|r| r.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        if !rel.is_empty() && (rel.split('/').any(hard_ignore) || ignore.matches(&rel)) {
            continue;
        }
        let _ = watcher.watch(entry.path(), RecursiveMode::NonRecursive);
    }
    Ok(())
}

/// Filter one filesystem event into the pending map. Returns true when the
/// debounce timer should reset.
fn apply_event(
    event: &Event,
    root: &Path,
    ignore: &IgnoreMatcher,
    watcher: &mut RecommendedWatcher,
    pending: &mut HashMap<String, Op>,
) -> bool {
    let op = match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => Op::Write,
        EventKind::Remove(_) => Op::Remove,
        _ => return false,
    };

    let mut accepted = false;
    for path in &event.paths {
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        let rel = rel.to_string_lossy().replace('\\', "/");
        if rel.is_empty() {
            continue;
        }

        // Skip anything inside a hard-ignored or gitignored subtree.
        if rel.split('/').any(hard_ignore) || ignore.matches(&rel) {
            continue;
        }

        // A freshly created directory joins the watch set.
        if matches!(event.kind, EventKind::Create(_)) && path.is_dir() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if !hard_ignore(&name) {
                let _ = watcher.watch(path, RecursiveMode::NonRecursive);
            }
            continue;
        }

        let name = rel.rsplit('/').next().unwrap_or(&rel);
        if skip_file(name) || language_for_file(&rel).is_empty() {
            continue;
        }

        pending.insert(rel, op);
        accepted = true;
    }
    accepted
}

/// Reconcile one debounced batch: prune vanished files, rescan the rest,
/// refresh counts, embed changed chunks. Per-path failures never stop the
/// batch.
fn process_batch(
    root: &Path,
    batch: HashMap<String, Op>,
    store: &crate::memory::Store,
    vectors: &VectorStore,
    ignore: &IgnoreMatcher,
    gcfg: &config::GlobalConfig,
    handle: &tokio::runtime::Handle,
) {
    let mut added = 0usize;
    let mut modified = 0usize;
    let mut deleted = 0usize;
    let mut changed_file_ids: Vec<String> = Vec::new();

    for (rel, _op) in &batch {
        let abs: PathBuf = root.join(rel);

        // Gone from disk (removed, or renamed away): prune if we have it.
        if !abs.exists() {
            if let Ok(existing) = store.get_file_by_path(rel) {
                prune_deleted_file(store, vectors, &existing.id);
                deleted += 1;
            }
            continue;
        }

        let sf = match scanner::scan_file(root, rel, gcfg.context.chunk_max_lines, ignore) {
            Ok(Some(sf)) => sf,
            Ok(None) | Err(_) => continue,
        };

        match upsert_scanned_file(store, &sf, false) {
            Ok((id, FileStatus::Added)) => {
                added += 1;
                changed_file_ids.push(id);
            }
            Ok((id, FileStatus::Modified)) => {
                modified += 1;
                changed_file_ids.push(id);
            }
            Ok((_, FileStatus::Unchanged)) => {}
            Err(e) => eprintln!("  warning: {rel}: {e}"),
        }
    }

    if added + modified + deleted == 0 {
        return;
    }

    refresh_project_counts(store);

    let ts = chrono::Local::now().format("%H:%M:%S");
    print!("[{ts}] +{added} ~{modified} -{deleted}");

    if !changed_file_ids.is_empty() {
        if let Some(embedder) = build_embedder(gcfg) {
            let n = handle.block_on(embed_file_chunks(
                store,
                vectors,
                &embedder,
                &changed_file_ids,
            ));
            if n > 0 {
                print!(" ({n} chunks embedded)");
            }
        }
    }
    println!();

    auto_export(root, store);
}
