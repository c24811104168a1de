//! Project tree scanning: walk, hash, classify, chunk.

pub mod chunker;
mod detector;
mod ignore;
mod languages;

pub use self::chunker::{chunk_file, RawChunk, DEFAULT_MAX_LINES, DEFAULT_OVERLAP};
pub use self::detector::{detect_tech_stack, TechStack};
pub use self::ignore::{hard_ignore, skip_file, IgnoreMatcher};
pub use self::languages::{chunk_type_for_file, language_for_file};

use std::path::{Path, PathBuf};

use chrono::DateTime;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::{MemvraError, Result};
use crate::memory::{Chunk, File};

/// A file record paired with its chunks. `file_id` on the chunks is empty
/// until the file is stored.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub file: File,
    pub chunks: Vec<Chunk>,
}

/// Output of a full project scan.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub stack: TechStack,
    pub files: Vec<ScannedFile>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub root: PathBuf,
    pub max_chunk_lines: usize,
}

/// Walk the project tree, hash files, and split them into chunks.
///
/// Does NOT write to the database — that is the caller's job. Per-file
/// errors are collected into the result; the walk never aborts.
pub fn scan(opts: &ScanOptions) -> ScanResult {
    let root = &opts.root;
    let max_lines = if opts.max_chunk_lines == 0 {
        DEFAULT_MAX_LINES
    } else {
        opts.max_chunk_lines
    };

    let ignore = IgnoreMatcher::new(root);
    let mut result = ScanResult {
        stack: detect_tech_stack(root),
        ..Default::default()
    };

    let walker = WalkDir::new(root).into_iter().filter_entry(|e| {
        // Prune hard-ignored directories entirely; the root itself passes.
        !(e.file_type().is_dir()
            && e.depth() > 0
            && e.file_name().to_str().is_some_and(hard_ignore))
    });

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                result.errors.push(format!("walk: {err}"));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = match entry.path().strip_prefix(root) {
            Ok(r) => rel_path_string(r),
            Err(_) => continue,
        };
        let name = entry.file_name().to_string_lossy();

        if skip_file(&name) || ignore.matches(&rel) {
            continue;
        }
        if language_for_file(&rel).is_empty() {
            continue;
        }

        match read_and_chunk(root, &rel, max_lines) {
            Ok(sf) => result.files.push(sf),
            Err(err) => result.errors.push(format!("read {rel}: {err}")),
        }
    }

    result.stack.file_count = result.files.len();
    result.stack.chunk_count = result.files.iter().map(|sf| sf.chunks.len()).sum();
    result
}

/// Scan a single file for incremental updates.
///
/// Returns `Ok(None)` when any skip rule applies (hard-ignored path segment,
/// skip-by-name, gitignore, unrecognised language).
pub fn scan_file(
    root: &Path,
    rel_path: &str,
    max_chunk_lines: usize,
    ignore: &IgnoreMatcher,
) -> Result<Option<ScannedFile>> {
    let max_lines = if max_chunk_lines == 0 {
        DEFAULT_MAX_LINES
    } else {
        max_chunk_lines
    };

    let rel = rel_path.replace('\\', "/");
    if rel
        .split('/')
        .take(rel.split('/').count().saturating_sub(1))
        .any(hard_ignore)
    {
        return Ok(None);
    }

    let name = rel.rsplit('/').next().unwrap_or(&rel);
    if skip_file(name) || ignore.matches(&rel) || language_for_file(&rel).is_empty() {
        return Ok(None);
    }

    read_and_chunk(root, &rel, max_lines).map(Some)
}

fn read_and_chunk(root: &Path, rel: &str, max_lines: usize) -> Result<ScannedFile> {
    let abs = root.join(rel);
    let bytes = std::fs::read(&abs).map_err(MemvraError::Io)?;

    let hash = {
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        format!("{:x}", hasher.finalize())
    };

    let last_modified = std::fs::metadata(&abs)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| {
            let d = t.duration_since(std::time::UNIX_EPOCH).ok()?;
            DateTime::from_timestamp(d.as_secs() as i64, d.subsec_nanos())
                .map(|dt| dt.naive_utc())
        });

    let chunk_type = chunk_type_for_file(rel);
    let content = String::from_utf8_lossy(&bytes);

    let chunks = chunk_file(&content, chunk_type, max_lines)
        .into_iter()
        .map(|rc| Chunk {
            id: String::new(),
            file_id: String::new(),
            content: rc.content,
            start_line: rc.start_line as i64,
            end_line: rc.end_line as i64,
            chunk_type: rc.chunk_type,
        })
        .collect();

    Ok(ScannedFile {
        file: File {
            id: String::new(),
            path: rel.to_string(),
            language: language_for_file(rel).to_string(),
            last_modified,
            content_hash: hash,
            indexed_at: None,
        },
        chunks,
    })
}

/// Project-relative path with forward slashes, regardless of OS separator.
fn rel_path_string(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Walk up from `start_dir` looking for a project root marker. Falls back to
/// `start_dir` itself when nothing matches.
pub fn find_project_root(start_dir: &Path) -> PathBuf {
    const MARKERS: [&str; 9] = [
        ".git",
        "go.mod",
        "package.json",
        "Gemfile",
        "Cargo.toml",
        "pyproject.toml",
        "requirements.txt",
        "pom.xml",
        "build.gradle",
    ];

    let start = start_dir
        .canonicalize()
        .unwrap_or_else(|_| start_dir.to_path_buf());
    let mut dir = start.clone();

    loop {
        if MARKERS.iter().any(|m| dir.join(m).exists()) {
            return dir;
        }
        match dir.parent() {
            Some(parent) => dir = parent.to_path_buf(),
            None => return start,
        }
    }
}
