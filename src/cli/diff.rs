use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{Duration, NaiveDateTime, Utc};

use crate::config;
use crate::error::{MemvraError, Result};
use crate::memory::{File, Memory, MemoryKind, Session};
use crate::scanner::{self, ScanOptions, ScannedFile};

use super::{open_store, truncate_label};

#[derive(Debug, Default)]
pub struct DiffArgs {
    /// Only show file index changes.
    pub files_only: bool,
    /// Only show memory changes.
    pub memories_only: bool,
    /// Only show session changes.
    pub sessions_only: bool,
    /// Override the time anchor (e.g. "24h", "7d", "2h30m").
    pub since: Option<String>,
    /// Skip the filesystem scan.
    pub no_scan: bool,
}

/// ANSI color set; all-empty when color output is off.
struct Palette {
    reset: &'static str,
    green: &'static str,
    yellow: &'static str,
    red: &'static str,
    cyan: &'static str,
    bold: &'static str,
    dim: &'static str,
}

impl Palette {
    fn colored() -> Self {
        Self {
            reset: "\x1b[0m",
            green: "\x1b[32m",
            yellow: "\x1b[33m",
            red: "\x1b[31m",
            cyan: "\x1b[36m",
            bold: "\x1b[1m",
            dim: "\x1b[2m",
        }
    }

    fn plain() -> Self {
        Self {
            reset: "",
            green: "",
            yellow: "",
            red: "",
            cyan: "",
            bold: "",
            dim: "",
        }
    }
}

/// `memvra diff` — compare the current project state against the index.
///
/// Three sections: file index changes from a fresh scan, memories changed
/// since the anchor, and sessions recorded since the anchor. The anchor is
/// the project's last update unless `--since` overrides it.
pub fn diff(root: &Path, args: DiffArgs) -> Result<()> {
    let (_db, store) = open_store(root)?;
    let (gcfg, _) = config::load(root);

    let colors = if gcfg.output.color && std::env::var("NO_COLOR").unwrap_or_default().is_empty() {
        Palette::colored()
    } else {
        Palette::plain()
    };

    let project = store.get_project()?;
    let anchor = match &args.since {
        Some(s) => {
            let dur = parse_duration(s)?;
            Utc::now().naive_utc() - dur
        }
        None => project.updated_at.unwrap_or_default(),
    };

    let show_all = !args.files_only && !args.memories_only && !args.sessions_only;
    let mut show_files = show_all || args.files_only;
    let show_memories = show_all || args.memories_only;
    let show_sessions = show_all || args.sessions_only;

    if args.no_scan && !args.files_only {
        show_files = false;
    }

    if show_files {
        let result = scanner::scan(&ScanOptions {
            root: root.to_path_buf(),
            max_chunk_lines: gcfg.context.chunk_max_lines,
        });
        let db_files = store.list_files()?;
        let (added, modified, deleted) = file_diff(&result.files, &db_files);
        print_file_diff(&added, &modified, &deleted, &colors);
    }

    if show_memories {
        let memories = store.list_memories_since(anchor)?;
        print_memory_diff(&memories, anchor, &colors);
    }

    if show_sessions {
        let sessions = store.list_sessions_since(anchor)?;
        print_session_diff(&sessions, anchor, &colors);
    }

    println!();
    Ok(())
}

/// Compare a fresh scan against the indexed file rows. Returns sorted
/// (added, modified, deleted) path lists.
fn file_diff(
    scanned: &[ScannedFile],
    db_files: &[File],
) -> (Vec<String>, Vec<String>, Vec<String>) {
    let db_by_path: HashMap<&str, &File> =
        db_files.iter().map(|f| (f.path.as_str(), f)).collect();
    let scanned_paths: HashSet<&str> = scanned.iter().map(|sf| sf.file.path.as_str()).collect();

    let mut added = Vec::new();
    let mut modified = Vec::new();
    for sf in scanned {
        match db_by_path.get(sf.file.path.as_str()) {
            None => added.push(sf.file.path.clone()),
            Some(db_file) if db_file.content_hash != sf.file.content_hash => {
                modified.push(sf.file.path.clone())
            }
            Some(_) => {}
        }
    }

    let mut deleted: Vec<String> = db_files
        .iter()
        .filter(|f| !scanned_paths.contains(f.path.as_str()))
        .map(|f| f.path.clone())
        .collect();

    added.sort();
    modified.sort();
    deleted.sort();
    (added, modified, deleted)
}

fn print_file_diff(added: &[String], modified: &[String], deleted: &[String], c: &Palette) {
    println!("\n{}=== File Index ==={}", c.bold, c.reset);

    if added.is_empty() && modified.is_empty() && deleted.is_empty() {
        println!("  {}(no changes){}", c.dim, c.reset);
        return;
    }

    for p in added {
        println!("  {}+ {p}{}", c.green, c.reset);
    }
    for p in modified {
        println!("  {}~ {p}{}", c.yellow, c.reset);
    }
    for p in deleted {
        println!("  {}- {p}{}", c.red, c.reset);
    }

    println!(
        "\n  {} added, {} modified, {} deleted",
        added.len(),
        modified.len(),
        deleted.len()
    );
}

fn print_memory_diff(memories: &[Memory], since: NaiveDateTime, c: &Palette) {
    println!(
        "\n{}=== Memories (since {}) ==={}",
        c.bold,
        since.format("%Y-%m-%d %H:%M"),
        c.reset
    );

    if memories.is_empty() {
        println!("  {}(none){}", c.dim, c.reset);
        return;
    }

    for kind in MemoryKind::ALL {
        let group: Vec<&Memory> = memories.iter().filter(|m| m.kind == kind).collect();
        if group.is_empty() {
            continue;
        }
        println!(
            "  {}{}s{} ({})",
            c.cyan,
            capitalize(kind.as_str()),
            c.reset,
            group.len()
        );
        for m in group {
            println!("    {}+ {}{}", c.green, truncate_label(&m.content, 77), c.reset);
        }
    }
}

fn print_session_diff(sessions: &[Session], since: NaiveDateTime, c: &Palette) {
    println!(
        "\n{}=== Sessions (since {}) ==={}",
        c.bold,
        since.format("%Y-%m-%d %H:%M"),
        c.reset
    );

    if sessions.is_empty() {
        println!("  {}(none){}", c.dim, c.reset);
        return;
    }

    for s in sessions {
        let ts = s
            .created_at
            .map(|t| t.format("%b %d %H:%M").to_string())
            .unwrap_or_default();
        println!("  {}[{ts}]{} {}", c.dim, c.reset, truncate_label(&s.question, 67));
        if !s.response_summary.is_empty() {
            println!("    {}{}{}", c.dim, truncate_label(&s.response_summary, 97), c.reset);
        }
    }

    println!(
        "\n  {} session{}",
        sessions.len(),
        if sessions.len() == 1 { "" } else { "s" }
    );
}

/// Parse durations like "30s", "45m", "24h", "7d", and combinations such as
/// "2h30m".
fn parse_duration(s: &str) -> Result<Duration> {
    let invalid =
        || MemvraError::InvalidInput(format!("invalid duration {s:?} (expected e.g. 24h, 7d, 2h30m)"));

    if s.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::zero();
    let mut digits = String::new();
    let mut matched = false;

    for ch in s.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let n: i64 = digits.parse().map_err(|_| invalid())?;
        digits.clear();
        total = total
            + match ch {
                's' => Duration::seconds(n),
                'm' => Duration::minutes(n),
                'h' => Duration::hours(n),
                'd' => Duration::days(n),
                _ => return Err(invalid()),
            };
        matched = true;
    }

    if !digits.is_empty() || !matched {
        return Err(invalid());
    }
    Ok(total)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
