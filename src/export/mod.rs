//! Render combined project state into formats other AI tools read natively.

mod claude;
mod json;
mod markdown;

pub use claude::{ClaudeMdExporter, CursorRulesExporter};
pub use json::JsonExporter;
pub use markdown::MarkdownExporter;

use std::fmt::Write;

use crate::error::{MemvraError, Result};
use crate::git::WorkingState;
use crate::memory::{Memory, MemoryKind, Project, Session};
use crate::scanner::TechStack;

/// Everything an exporter needs; assembled once by the caller.
#[derive(Debug, Default)]
pub struct ExportData {
    pub project: Project,
    pub stack: TechStack,
    pub memories: Vec<Memory>,
    /// Newest first, as returned by the store.
    pub sessions: Vec<Session>,
    pub git_state: WorkingState,
}

/// Renders [`ExportData`] to a string in one format. Pure.
pub trait Exporter {
    fn export(&self, data: &ExportData) -> Result<String>;
}

/// Memory sections in their fixed render order.
pub(crate) const MEMORY_SECTIONS: [(&str, MemoryKind); 5] = [
    ("Architectural Decisions", MemoryKind::Decision),
    ("Coding Conventions", MemoryKind::Convention),
    ("Constraints", MemoryKind::Constraint),
    ("Notes", MemoryKind::Note),
    ("TODOs", MemoryKind::Todo),
];

/// Look up the exporter for a format name.
pub fn get(name: &str) -> Result<Box<dyn Exporter>> {
    match name {
        "claude" => Ok(Box::new(ClaudeMdExporter)),
        "cursor" => Ok(Box::new(CursorRulesExporter)),
        "markdown" => Ok(Box::new(MarkdownExporter)),
        "json" => Ok(Box::new(JsonExporter)),
        other => Err(MemvraError::InvalidInput(format!(
            "unknown export format {other:?} (valid: claude, cursor, markdown, json)"
        ))),
    }
}

/// Canonical output filename for a format, at the project root.
pub fn format_filename(format: &str) -> Option<&'static str> {
    match format {
        "claude" => Some("CLAUDE.md"),
        "cursor" => Some(".cursorrules"),
        "markdown" => Some("PROJECT_CONTEXT.md"),
        "json" => Some("memvra-context.json"),
        _ => None,
    }
}

pub fn valid_formats() -> [&'static str; 4] {
    ["claude", "cursor", "markdown", "json"]
}

/// Memories of one kind as a markdown list block; empty kinds render nothing.
pub(crate) fn memory_section(heading: &str, kind: MemoryKind, memories: &[Memory]) -> String {
    let items: Vec<&Memory> = memories.iter().filter(|m| m.kind == kind).collect();
    if items.is_empty() {
        return String::new();
    }
    let mut out = format!("## {heading}\n\n");
    for m in items {
        let _ = writeln!(out, "- {}", m.content);
    }
    out.push('\n');
    out
}

/// "Work in Progress" markdown section; empty when there is nothing to show.
pub(crate) fn render_git_state_markdown(gs: &WorkingState) -> String {
    if gs.is_empty() || !gs.has_changes() {
        return String::new();
    }

    let mut b = String::from("## Work in Progress\n\n");
    if !gs.branch.is_empty() {
        let _ = writeln!(b, "**Branch:** `{}`\n", gs.branch);
    }
    if !gs.staged.is_empty() {
        b.push_str("**Staged for commit:**\n");
        for f in &gs.staged {
            let _ = writeln!(b, "- `{f}`");
        }
        b.push('\n');
    }
    if !gs.modified.is_empty() {
        b.push_str("**Modified (unstaged):**\n");
        for f in &gs.modified {
            let _ = writeln!(b, "- `{f}`");
        }
        b.push('\n');
    }
    if !gs.untracked.is_empty() {
        b.push_str("**New files (untracked):**\n");
        for f in &gs.untracked {
            let _ = writeln!(b, "- `{f}`");
        }
        b.push('\n');
    }
    if !gs.diff_stat.is_empty() {
        let _ = write!(b, "**Change summary:**\n```\n{}\n```\n\n", gs.diff_stat);
    }
    b
}

/// "Recent Activity" markdown section. Input is newest-first; rendered
/// chronologically.
pub(crate) fn render_sessions_markdown(sessions: &[Session]) -> String {
    if sessions.is_empty() {
        return String::new();
    }

    let mut b = String::from("## Recent Activity\n\n");
    for s in sessions.iter().rev() {
        let ts = s
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let model = if s.model_used.is_empty() {
            String::new()
        } else {
            format!(" ({})", s.model_used)
        };
        let _ = writeln!(b, "**[{ts}]{model}** {}", s.question);
        if !s.response_summary.is_empty() {
            let _ = writeln!(b, "{}", s.response_summary);
        }
        b.push('\n');
    }
    b
}

/// Plain-text variants for .cursorrules.
pub(crate) fn render_git_state_plain(gs: &WorkingState) -> String {
    if gs.is_empty() || !gs.has_changes() {
        return String::new();
    }

    let mut b = String::from("# Work in Progress\n");
    if !gs.branch.is_empty() {
        let _ = writeln!(b, "Current branch: {}", gs.branch);
    }
    if !gs.staged.is_empty() {
        b.push_str("Staged for commit:\n");
        for f in &gs.staged {
            let _ = writeln!(b, "  - {f}");
        }
    }
    if !gs.modified.is_empty() {
        b.push_str("Modified (unstaged):\n");
        for f in &gs.modified {
            let _ = writeln!(b, "  - {f}");
        }
    }
    if !gs.untracked.is_empty() {
        b.push_str("New files (untracked):\n");
        for f in &gs.untracked {
            let _ = writeln!(b, "  - {f}");
        }
    }
    b.push('\n');
    b
}

pub(crate) fn render_sessions_plain(sessions: &[Session]) -> String {
    if sessions.is_empty() {
        return String::new();
    }

    let mut b = String::from("# Recent Activity\n");
    for s in sessions.iter().rev() {
        let ts = s
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let model = if s.model_used.is_empty() {
            String::new()
        } else {
            format!(" ({})", s.model_used)
        };
        let _ = writeln!(b, "[{ts}]{model} {}", s.question);
        if !s.response_summary.is_empty() {
            let _ = writeln!(b, "  {}", s.response_summary);
        }
    }
    b.push('\n');
    b
}
