use std::fmt::Write;

use crate::memory::{Chunk, Memory, MemoryKind, Project};
use crate::scanner::TechStack;

/// Render project profile, memories, and chunks as markdown prompt blocks.
pub struct Formatter;

impl Formatter {
    pub fn new() -> Self {
        Formatter
    }

    pub fn format_project_profile(&self, project: &Project, ts: &TechStack) -> String {
        let mut b = String::new();
        let _ = writeln!(b, "## Project Profile\n");
        let _ = writeln!(b, "- **Project:** {}", project.name);
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
        if !ts.detected_patterns.is_empty() {
            let _ = writeln!(b, "- **Patterns:** {}", ts.detected_patterns.join(", "));
        }
        b
    }

    /// A memory list under a pluralized kind heading.
    pub fn format_memories(&self, kind: MemoryKind, items: &[Memory]) -> String {
        if items.is_empty() {
            return String::new();
        }
        let mut b = String::new();
        let label = match kind {
            MemoryKind::Decision => "Decisions",
            MemoryKind::Convention => "Conventions",
            MemoryKind::Constraint => "Constraints",
            MemoryKind::Note => "Notes",
            MemoryKind::Todo => "Todos",
        };
        let _ = writeln!(b, "## {label}\n");
        for m in items {
            let _ = writeln!(b, "- {}", m.content);
        }
        b.push('\n');
        b
    }

    /// A single code chunk with its source location.
    pub fn format_chunk(&self, chunk: &Chunk, file_path: &str) -> String {
        let mut b = String::new();
        if !file_path.is_empty() {
            let _ = writeln!(
                b,
                "### {} (lines {}-{})",
                file_path, chunk.start_line, chunk.end_line
            );
        }
        let lang = match chunk.chunk_type.as_str() {
            "config" => "yaml",
            "docs" => "markdown",
            _ => "",
        };
        let _ = write!(b, "```{lang}\n{}\n```\n\n", chunk.content);
        b
    }

    /// The system prompt: profile plus conventions and constraints, with
    /// standing instructions for the answering model.
    pub fn format_system_prompt(
        &self,
        project: &Project,
        ts: &TechStack,
        conventions: &[Memory],
        constraints: &[Memory],
    ) -> String {
        let mut b = String::new();
        let _ = writeln!(
            b,
            "You are an AI assistant working on the project {:?}.\n",
            project.name
        );
        b.push_str(&self.format_project_profile(project, ts));
        if !conventions.is_empty() {
            b.push_str(&self.format_memories(MemoryKind::Convention, conventions));
        }
        if !constraints.is_empty() {
            b.push_str(&self.format_memories(MemoryKind::Constraint, constraints));
        }
        b.push_str("\nWhen answering:\n");
        b.push_str("1. Respect established conventions and constraints\n");
        b.push_str("2. Reference specific files and line numbers when relevant\n");
        b.push_str("3. Be consistent with existing patterns in the codebase\n");
        b.push_str("4. Flag if a suggestion contradicts stored decisions or constraints\n");
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(kind: MemoryKind, content: &str) -> Memory {
        Memory {
            id: "id".into(),
            content: content.into(),
            kind,
            importance: kind.default_importance(),
            source: "user".into(),
            related_files: vec![],
            created_at: Default::default(),
            updated_at: Default::default(),
        }
    }

    #[test]
    fn profile_skips_empty_fields() {
        let f = Formatter::new();
        let project = Project {
            name: "shop".into(),
            ..Default::default()
        };
        let ts = TechStack {
            language: "Ruby".into(),
            framework: "Rails".into(),
            ..Default::default()
        };
        let out = f.format_project_profile(&project, &ts);
        assert!(out.contains("**Project:** shop"));
        assert!(out.contains("**Language:** Ruby"));
        assert!(!out.contains("**Database:**"));
    }

    #[test]
    fn memory_list_rendering() {
        let f = Formatter::new();
        let out = f.format_memories(
            MemoryKind::Decision,
            &[memory(MemoryKind::Decision, "use sqlite")],
        );
        assert!(out.starts_with("## Decisions"));
        assert!(out.contains("- use sqlite"));
        assert!(f.format_memories(MemoryKind::Decision, &[]).is_empty());
    }

    #[test]
    fn chunk_block_has_location_and_fence() {
        let f = Formatter::new();
        let chunk = Chunk {
            content: "fn main() {}".into(),
            start_line: 10,
            end_line: 12,
            chunk_type: "code".into(),
            ..Default::default()
        };
        let out = f.format_chunk(&chunk, "src/main.rs");
        assert!(out.contains("### src/main.rs (lines 10-12)"));
        assert!(out.contains("```\nfn main() {}\n```"));

        let docs = Chunk {
            chunk_type: "docs".into(),
            ..chunk.clone()
        };
        assert!(f.format_chunk(&docs, "README.md").contains("```markdown"));
    }

    #[test]
    fn system_prompt_includes_rules_and_memories() {
        let f = Formatter::new();
        let project = Project {
            name: "shop".into(),
            ..Default::default()
        };
        let out = f.format_system_prompt(
            &project,
            &TechStack::default(),
            &[memory(MemoryKind::Convention, "snake_case everywhere")],
            &[memory(MemoryKind::Constraint, "never log secrets")],
        );
        assert!(out.contains("## Conventions"));
        assert!(out.contains("snake_case everywhere"));
        assert!(out.contains("## Constraints"));
        assert!(out.contains("never log secrets"));
        assert!(out.contains("When answering:"));
    }
}
