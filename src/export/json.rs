use serde::Serialize;

use crate::error::{MemvraError, Result};
use crate::memory::Memory;

use super::{ExportData, Exporter};

/// memvra-context.json: structured output for programmatic consumers.
pub struct JsonExporter;

#[derive(Serialize)]
struct JsonOutput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    work_in_progress: Option<JsonGitState<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    recent_activity: Vec<JsonSession>,
    project: JsonProject<'a>,
    stack: JsonStack<'a>,
    memories: std::collections::BTreeMap<&'static str, Vec<JsonMemory<'a>>>,
}

#[derive(Serialize)]
struct JsonGitState<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    branch: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    staged: Vec<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    modified: Vec<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    untracked: Vec<&'a str>,
    #[serde(skip_serializing_if = "str::is_empty")]
    diff_stat: &'a str,
}

#[derive(Serialize)]
struct JsonSession {
    timestamp: String,
    question: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    summary: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    model: String,
}

#[derive(Serialize)]
struct JsonProject<'a> {
    name: &'a str,
    file_count: i64,
    chunk_count: i64,
}

#[derive(Serialize)]
struct JsonStack<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    language: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    framework: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    database: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    architecture: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    test_framework: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    ci: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    patterns: Vec<&'a str>,
}

#[derive(Serialize)]
struct JsonMemory<'a> {
    id: &'a str,
    content: &'a str,
    importance: f64,
    source: &'a str,
}

fn group_memories(memories: &[Memory]) -> std::collections::BTreeMap<&'static str, Vec<JsonMemory>> {
    let mut groups: std::collections::BTreeMap<&'static str, Vec<JsonMemory>> = Default::default();
    for m in memories {
        groups.entry(m.kind.as_str()).or_default().push(JsonMemory {
            id: &m.id,
            content: &m.content,
            importance: m.importance,
            source: &m.source,
        });
    }
    groups
}

impl Exporter for JsonExporter {
    fn export(&self, data: &ExportData) -> Result<String> {
        let gs = &data.git_state;
        let work_in_progress = if !gs.is_empty() && gs.has_changes() {
            Some(JsonGitState {
                branch: &gs.branch,
                staged: gs.staged.iter().map(String::as_str).collect(),
                modified: gs.modified.iter().map(String::as_str).collect(),
                untracked: gs.untracked.iter().map(String::as_str).collect(),
                diff_stat: &gs.diff_stat,
            })
        } else {
            None
        };

        // Sessions arrive newest-first; export chronologically.
        let recent_activity = data
            .sessions
            .iter()
            .rev()
            .map(|s| JsonSession {
                timestamp: s
                    .created_at
                    .map(|t| t.and_utc().to_rfc3339())
                    .unwrap_or_default(),
                question: s.question.clone(),
                summary: s.response_summary.clone(),
                model: s.model_used.clone(),
            })
            .collect();

        let out = JsonOutput {
            work_in_progress,
            recent_activity,
            project: JsonProject {
                name: &data.project.name,
                file_count: data.project.file_count,
                chunk_count: data.project.chunk_count,
            },
            stack: JsonStack {
                language: &data.stack.language,
                framework: &data.stack.framework,
                database: &data.stack.database,
                architecture: &data.stack.architecture,
                test_framework: &data.stack.test_framework,
                ci: &data.stack.ci,
                patterns: data.stack.detected_patterns.iter().map(String::as_str).collect(),
            },
            memories: group_memories(&data.memories),
        };

        let rendered = serde_json::to_string_pretty(&out)
            .map_err(|e| MemvraError::Internal(format!("json export: {e}")))?;
        Ok(format!("{rendered}\n"))
    }
}
