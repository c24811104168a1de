//! Persistent memory types and the store/vector/retrieval layers.

mod extractor;
mod orchestrator;
mod ranker;
mod store;
mod summarizer;
mod vector;

pub use extractor::{extract_memories, ExtractedMemory};
pub use orchestrator::{Orchestrator, RetrievalResult, RetrieveOptions};
pub use ranker::{rank_chunks, rank_memories, RankedChunk, RankedMemory};
pub use store::Store;
pub use summarizer::summarize_session;
pub use vector::{blob_to_f32s, f32s_to_blob, VectorMatch, VectorStore};

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::MemvraError;

/// Classification of a stored memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    Decision,
    Convention,
    Constraint,
    Note,
    Todo,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 5] = [
        MemoryKind::Decision,
        MemoryKind::Convention,
        MemoryKind::Constraint,
        MemoryKind::Note,
        MemoryKind::Todo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Decision => "decision",
            MemoryKind::Convention => "convention",
            MemoryKind::Constraint => "constraint",
            MemoryKind::Note => "note",
            MemoryKind::Todo => "todo",
        }
    }

    /// Default importance assigned when a memory is stored without one.
    pub fn default_importance(&self) -> f64 {
        match self {
            MemoryKind::Decision | MemoryKind::Constraint => 0.8,
            MemoryKind::Convention => 0.7,
            MemoryKind::Todo => 0.6,
            MemoryKind::Note => 0.5,
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryKind {
    type Err = MemvraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "decision" => Ok(MemoryKind::Decision),
            "convention" => Ok(MemoryKind::Convention),
            "constraint" => Ok(MemoryKind::Constraint),
            "note" => Ok(MemoryKind::Note),
            "todo" => Ok(MemoryKind::Todo),
            other => Err(MemvraError::InvalidInput(format!(
                "unknown memory type {other:?} (valid: decision, convention, constraint, note, todo)"
            ))),
        }
    }
}

/// A single stored memory record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub content: String,
    pub kind: MemoryKind,
    pub importance: f64,
    /// "user" or "extracted".
    pub source: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_files: Vec<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// The top-level project record. Exactly one row per knowledge store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub root_path: String,
    /// JSON blob — see [`crate::scanner::TechStack`].
    pub tech_stack: String,
    pub architecture: String,
    pub conventions: String,
    pub file_count: i64,
    pub chunk_count: i64,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
}

/// An indexed source file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct File {
    pub id: String,
    /// Project-relative, forward slashes.
    pub path: String,
    pub language: String,
    pub last_modified: Option<NaiveDateTime>,
    pub content_hash: String,
    pub indexed_at: Option<NaiveDateTime>,
}

/// A content slice of a [`File`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub file_id: String,
    pub content: String,
    /// 1-based.
    pub start_line: i64,
    /// 1-based, inclusive.
    pub end_line: i64,
    /// "code", "config", "test", or "docs".
    pub chunk_type: String,
}

/// One recorded interaction (an `ask` call or a wrapped tool session).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub question: String,
    /// Opaque JSON listing the context source labels.
    pub context_used: String,
    pub response_summary: String,
    pub model_used: String,
    pub tokens_used: i64,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

/// Stored-state summary for `memvra status`.
#[derive(Debug, Default)]
pub struct Stats {
    pub project_name: String,
    pub tech_stack: String,
    pub file_count: i64,
    pub chunk_count: i64,
    pub memories: HashMap<MemoryKind, i64>,
    pub sessions: i64,
    pub last_updated: Option<NaiveDateTime>,
    pub db_size_bytes: i64,
}

/// Best-guess kind for a statement, used when the extractor's model emits an
/// invalid type and when `remember` is called without one.
pub fn classify_memory_kind(statement: &str) -> MemoryKind {
    let lower = statement.to_lowercase();
    if lower.starts_with("todo") || lower.contains("need to ") || lower.contains("should ") {
        MemoryKind::Todo
    } else if lower.contains("decided")
        || lower.contains("switched")
        || lower.contains("chose")
        || lower.contains("migrated")
    {
        MemoryKind::Decision
    } else if lower.contains("must ")
        || lower.contains("never ")
        || lower.contains("always ")
        || lower.contains("only ")
    {
        MemoryKind::Constraint
    } else if lower.contains("convention")
        || lower.contains("pattern")
        || lower.contains("style")
        || lower.contains("format")
    {
        MemoryKind::Convention
    } else {
        MemoryKind::Note
    }
}

/// Parse the timestamp layouts SQLite hands back, depending on how the value
/// was written (CURRENT_TIMESTAMP vs. bound strings).
pub(crate) fn parse_sqlite_time(s: &str) -> Option<NaiveDateTime> {
    const LAYOUTS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.fZ",
    ];
    LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(s, layout).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trip() {
        for kind in MemoryKind::ALL {
            assert_eq!(kind.as_str().parse::<MemoryKind>().unwrap(), kind);
        }
        assert!("episodic".parse::<MemoryKind>().is_err());
        assert!("".parse::<MemoryKind>().is_err());
    }

    #[test]
    fn default_importance_by_kind() {
        assert_eq!(MemoryKind::Decision.default_importance(), 0.8);
        assert_eq!(MemoryKind::Constraint.default_importance(), 0.8);
        assert_eq!(MemoryKind::Convention.default_importance(), 0.7);
        assert_eq!(MemoryKind::Todo.default_importance(), 0.6);
        assert_eq!(MemoryKind::Note.default_importance(), 0.5);
    }

    #[test]
    fn classifier_phrases() {
        assert_eq!(
            classify_memory_kind("we decided to use PostgreSQL"),
            MemoryKind::Decision
        );
        assert_eq!(
            classify_memory_kind("never commit secrets to the repo"),
            MemoryKind::Constraint
        );
        assert_eq!(
            classify_memory_kind("TODO: add rate limiting"),
            MemoryKind::Todo
        );
        assert_eq!(
            classify_memory_kind("use snake_case naming style"),
            MemoryKind::Convention
        );
        assert_eq!(classify_memory_kind("the API lives on port 8080"), MemoryKind::Note);
    }

    #[test]
    fn sqlite_time_layouts() {
        assert!(parse_sqlite_time("2026-08-02 10:30:00").is_some());
        assert!(parse_sqlite_time("2026-08-02T10:30:00").is_some());
        assert!(parse_sqlite_time("not a time").is_none());
    }
}
