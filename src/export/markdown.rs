use std::fmt::Write;

use crate::error::Result;

use super::{
    memory_section, render_git_state_markdown, render_sessions_markdown, ExportData, Exporter,
    MEMORY_SECTIONS,
};

/// PROJECT_CONTEXT.md: tool-agnostic markdown rendering.
pub struct MarkdownExporter;

impl Exporter for MarkdownExporter {
    fn export(&self, data: &ExportData) -> Result<String> {
        let ts = &data.stack;
        let mut b = String::new();

        let _ = writeln!(b, "# {} — Project Context\n", data.project.name);

        b.push_str(&render_git_state_markdown(&data.git_state));
        b.push_str(&render_sessions_markdown(&data.sessions));

        b.push_str("## Tech Stack\n\n");
        if !ts.language.is_empty() {
            let _ = writeln!(b, "| Language | {} |", ts.language);
        }
        if !ts.framework.is_empty() {
            let _ = writeln!(b, "| Framework | {} |", ts.framework);
        }
        if !ts.database.is_empty() {
            let _ = writeln!(b, "| Database | {} |", ts.database);
        }
        if !ts.architecture.is_empty() {
            let _ = writeln!(b, "| Architecture | {} |", ts.architecture);
        }
        if !ts.test_framework.is_empty() {
            let _ = writeln!(b, "| Tests | {} |", ts.test_framework);
        }
        b.push('\n');

        for (heading, kind) in MEMORY_SECTIONS {
            b.push_str(&memory_section(heading, kind, &data.memories));
        }

        Ok(b)
    }
}
