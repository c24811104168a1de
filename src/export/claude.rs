use std::fmt::Write;

use crate::error::Result;

use super::{
    memory_section, render_git_state_markdown, render_git_state_plain, render_sessions_markdown,
    render_sessions_plain, ExportData, Exporter, MEMORY_SECTIONS,
};

/// CLAUDE.md: project-oriented markdown read natively by Claude Code.
pub struct ClaudeMdExporter;

impl Exporter for ClaudeMdExporter {
    fn export(&self, data: &ExportData) -> Result<String> {
        let ts = &data.stack;
        let mut b = String::new();

        let _ = writeln!(b, "# {}\n", data.project.name);
        b.push_str("> Project memory maintained by Memvra. Regenerated automatically — do not edit by hand.\n\n");

        // Active work first so the assistant picks up where things left off.
        b.push_str(&render_git_state_markdown(&data.git_state));
        b.push_str(&render_sessions_markdown(&data.sessions));

        b.push_str("## Project Profile\n\n");
        if !ts.language.is_empty() {
            let _ = writeln!(b, "- **Language:** {}", ts.language);
        }
        if !ts.framework.is_empty() {
            let _ = writeln!(b, "- **Framework:** {}", ts.framework);
        }
        if !ts.database.is_empty() {
            let _ = writeln!(b, "- **Database:** {}", ts.database);
        }
        if !ts.architecture.is_empty() {
            let _ = writeln!(b, "- **Architecture:** {}", ts.architecture);
        }
        if !ts.test_framework.is_empty() {
            let _ = writeln!(b, "- **Tests:** {}", ts.test_framework);
        }
        if !ts.ci.is_empty() {
            let _ = writeln!(b, "- **CI:** {}", ts.ci);
        }
        let _ = writeln!(
            b,
            "- **Indexed:** {} files, {} chunks",
            data.project.file_count, data.project.chunk_count
        );
        b.push('\n');

        for (heading, kind) in MEMORY_SECTIONS {
            b.push_str(&memory_section(heading, kind, &data.memories));
        }

        Ok(b)
    }
}

/// .cursorrules: the plain-text equivalent for Cursor.
pub struct CursorRulesExporter;

impl Exporter for CursorRulesExporter {
    fn export(&self, data: &ExportData) -> Result<String> {
        let ts = &data.stack;
        let mut b = String::new();

        let _ = writeln!(b, "# AI Rules for {}", data.project.name);
        b.push_str("# Maintained by Memvra — regenerated automatically.\n\n");

        b.push_str(&render_git_state_plain(&data.git_state));
        b.push_str(&render_sessions_plain(&data.sessions));

        b.push_str("# Tech Stack\n");
        if !ts.language.is_empty() {
            let _ = writeln!(b, "Language: {}", ts.language);
        }
        if !ts.framework.is_empty() {
            let _ = writeln!(b, "Framework: {}", ts.framework);
        }
        if !ts.database.is_empty() {
            let _ = writeln!(b, "Database: {}", ts.database);
        }
        if !ts.test_framework.is_empty() {
            let _ = writeln!(b, "Tests: {}", ts.test_framework);
        }
        b.push('\n');

        for (heading, kind) in MEMORY_SECTIONS {
            let section = memory_section(heading, kind, &data.memories);
            if !section.is_empty() {
                // Plain-text flavor: single-# headings, no markdown emphasis.
                b.push_str(&section.replacen("## ", "# ", 1));
            }
        }

        Ok(b)
    }
}
