use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::Db;
use crate::error::{MemvraError, Result};

use super::{parse_sqlite_time, Chunk, File, Memory, MemoryKind, Project, Session, Stats};

/// Read/write access to the memvra knowledge store.
///
/// Owns nothing beyond a handle to the shared [`Db`]; all returned records
/// are value copies.
#[derive(Clone)]
pub struct Store {
    db: Arc<Db>,
}

impl Store {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Arc<Db> {
        &self.db
    }

    // ---- project ----

    /// Insert or replace the single project row.
    pub fn upsert_project(&self, p: &Project) -> Result<()> {
        self.db.conn()?.execute(
            "INSERT INTO project (id, name, root_path, tech_stack, architecture, conventions, file_count, chunk_count, updated_at)
             VALUES (COALESCE((SELECT id FROM project LIMIT 1), lower(hex(randomblob(16)))),
                     ?1, ?2, ?3, ?4, ?5, ?6, ?7, CURRENT_TIMESTAMP)
             ON CONFLICT(id) DO UPDATE SET
                 name         = excluded.name,
                 root_path    = excluded.root_path,
                 tech_stack   = excluded.tech_stack,
                 architecture = excluded.architecture,
                 conventions  = excluded.conventions,
                 file_count   = excluded.file_count,
                 chunk_count  = excluded.chunk_count,
                 updated_at   = CURRENT_TIMESTAMP",
            params![
                p.name,
                p.root_path,
                p.tech_stack,
                p.architecture,
                p.conventions,
                p.file_count,
                p.chunk_count
            ],
        )?;
        Ok(())
    }

    /// The single project record. `NotFound` when init hasn't run.
    pub fn get_project(&self) -> Result<Project> {
        let conn = self.db.conn()?;
        conn.query_row(
            "SELECT id, name, root_path, tech_stack, COALESCE(architecture,''),
                    COALESCE(conventions,''), file_count, chunk_count, created_at, updated_at
             FROM project LIMIT 1",
            [],
            |row| {
                Ok(Project {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    root_path: row.get(2)?,
                    tech_stack: row.get(3)?,
                    architecture: row.get(4)?,
                    conventions: row.get(5)?,
                    file_count: row.get(6)?,
                    chunk_count: row.get(7)?,
                    created_at: time_col(row, 8),
                    updated_at: time_col(row, 9),
                })
            },
        )
        .optional()?
        .ok_or_else(|| MemvraError::not_found("project"))
    }

    // ---- files ----

    /// Insert or update a file record by path. Returns the file id.
    pub fn upsert_file(&self, f: &File) -> Result<String> {
        let last_modified = f
            .last_modified
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string());
        let id = self.db.conn()?.query_row(
            "INSERT INTO files (id, path, language, last_modified, content_hash)
             VALUES (lower(hex(randomblob(16))), ?1, ?2, ?3, ?4)
             ON CONFLICT(path) DO UPDATE SET
                 language      = excluded.language,
                 last_modified = excluded.last_modified,
                 content_hash  = excluded.content_hash,
                 indexed_at    = CURRENT_TIMESTAMP
             RETURNING id",
            params![f.path, f.language, last_modified, f.content_hash],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn get_file_by_path(&self, path: &str) -> Result<File> {
        self.db
            .conn()?
            .query_row(
                "SELECT id, path, language, last_modified, content_hash, indexed_at
                 FROM files WHERE path = ?1",
                [path],
                row_to_file,
            )
            .optional()?
            .ok_or_else(|| MemvraError::not_found(format!("file {path:?}")))
    }

    pub fn get_file_by_id(&self, id: &str) -> Result<File> {
        self.db
            .conn()?
            .query_row(
                "SELECT id, path, language, last_modified, content_hash, indexed_at
                 FROM files WHERE id = ?1",
                [id],
                row_to_file,
            )
            .optional()?
            .ok_or_else(|| MemvraError::not_found(format!("file {id:?}")))
    }

    /// Every indexed file, ordered by path.
    pub fn list_files(&self) -> Result<Vec<File>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, path, language, last_modified, content_hash, indexed_at
             FROM files ORDER BY path",
        )?;
        let files = stmt
            .query_map([], row_to_file)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(files)
    }

    /// Delete a file row. Chunks cascade; the caller is responsible for
    /// deleting chunk vectors beforehand.
    pub fn delete_file(&self, id: &str) -> Result<()> {
        self.db
            .conn()?
            .execute("DELETE FROM files WHERE id = ?1", [id])?;
        Ok(())
    }

    pub fn count_files(&self) -> Result<i64> {
        let n = self
            .db
            .conn()?
            .query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))?;
        Ok(n)
    }

    // ---- chunks ----

    /// Store a new chunk. `file_id` must reference an existing file.
    pub fn insert_chunk(&self, c: &Chunk) -> Result<()> {
        self.db.conn()?.execute(
            "INSERT INTO chunks (id, file_id, content, start_line, end_line, chunk_type)
             VALUES (lower(hex(randomblob(16))), ?1, ?2, ?3, ?4, ?5)",
            params![c.file_id, c.content, c.start_line, c.end_line, c.chunk_type],
        )?;
        Ok(())
    }

    pub fn get_chunk_by_id(&self, id: &str) -> Result<Chunk> {
        self.db
            .conn()?
            .query_row(
                "SELECT id, file_id, content, start_line, end_line, COALESCE(chunk_type,'code')
                 FROM chunks WHERE id = ?1",
                [id],
                row_to_chunk,
            )
            .optional()?
            .ok_or_else(|| MemvraError::not_found(format!("chunk {id:?}")))
    }

    pub fn list_chunks_by_file_id(&self, file_id: &str) -> Result<Vec<Chunk>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, file_id, content, start_line, end_line, COALESCE(chunk_type,'code')
             FROM chunks WHERE file_id = ?1",
        )?;
        let chunks = stmt
            .query_map([file_id], row_to_chunk)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(chunks)
    }

    /// Every chunk in the database (bulk embedding).
    pub fn list_all_chunks(&self) -> Result<Vec<Chunk>> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, file_id, content, start_line, end_line, COALESCE(chunk_type,'code')
             FROM chunks",
        )?;
        let chunks = stmt
            .query_map([], row_to_chunk)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(chunks)
    }

    /// Remove all chunks of a file, used before re-inserting on re-index.
    pub fn delete_chunks_by_file_id(&self, file_id: &str) -> Result<()> {
        self.db
            .conn()?
            .execute("DELETE FROM chunks WHERE file_id = ?1", [file_id])?;
        Ok(())
    }

    pub fn count_chunks(&self) -> Result<i64> {
        let n = self
            .db
            .conn()?
            .query_row("SELECT COUNT(*) FROM chunks", [], |r| r.get(0))?;
        Ok(n)
    }

    // ---- memories ----

    /// Persist a new memory and return its generated id.
    ///
    /// Empty source defaults to "user".
    pub fn insert_memory(&self, m: &Memory) -> Result<String> {
        let related = if m.related_files.is_empty() {
            "[]".to_string()
        } else {
            serde_json::to_string(&m.related_files).unwrap_or_else(|_| "[]".into())
        };
        let source = if m.source.is_empty() { "user" } else { &m.source };

        let id = self.db.conn()?.query_row(
            "INSERT INTO memories (id, content, memory_type, importance, source, related_files)
             VALUES (lower(hex(randomblob(16))), ?1, ?2, ?3, ?4, ?5)
             RETURNING id",
            params![m.content, m.kind.as_str(), m.importance, source, related],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn get_memory_by_id(&self, id: &str) -> Result<Memory> {
        self.db
            .conn()?
            .query_row(
                "SELECT id, content, memory_type, importance, source, related_files, created_at, updated_at
                 FROM memories WHERE id = ?1",
                [id],
                row_to_memory,
            )
            .optional()?
            .ok_or_else(|| MemvraError::not_found(format!("memory {id:?}")))
    }

    /// Delete a memory by id. `NotFound` when no row matches.
    pub fn delete_memory(&self, id: &str) -> Result<()> {
        let n = self
            .db
            .conn()?
            .execute("DELETE FROM memories WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(MemvraError::not_found(format!("memory {id:?}")));
        }
        Ok(())
    }

    /// Delete every memory of a kind. Returns the deleted count.
    pub fn delete_memories_by_kind(&self, kind: MemoryKind) -> Result<usize> {
        let n = self.db.conn()?.execute(
            "DELETE FROM memories WHERE memory_type = ?1",
            [kind.as_str()],
        )?;
        Ok(n)
    }

    pub fn delete_all_memories(&self) -> Result<usize> {
        let n = self.db.conn()?.execute("DELETE FROM memories", [])?;
        Ok(n)
    }

    /// All memories, optionally filtered by kind, ordered by importance then
    /// recency.
    pub fn list_memories(&self, kind: Option<MemoryKind>) -> Result<Vec<Memory>> {
        let conn = self.db.conn()?;
        let mut out = Vec::new();
        match kind {
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, content, memory_type, importance, source, related_files, created_at, updated_at
                     FROM memories ORDER BY importance DESC, created_at DESC",
                )?;
                for m in stmt.query_map([], row_to_memory)? {
                    out.push(m?);
                }
            }
            Some(k) => {
                let mut stmt = conn.prepare(
                    "SELECT id, content, memory_type, importance, source, related_files, created_at, updated_at
                     FROM memories WHERE memory_type = ?1
                     ORDER BY importance DESC, created_at DESC",
                )?;
                for m in stmt.query_map([k.as_str()], row_to_memory)? {
                    out.push(m?);
                }
            }
        }
        Ok(out)
    }

    /// Memories created or updated since `since` (diff/watch support).
    pub fn list_memories_since(&self, since: NaiveDateTime) -> Result<Vec<Memory>> {
        let ts = since.format("%Y-%m-%d %H:%M:%S").to_string();
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, content, memory_type, importance, source, related_files, created_at, updated_at
             FROM memories
             WHERE created_at >= ?1 OR updated_at >= ?1
             ORDER BY memory_type, created_at DESC",
        )?;
        let memories = stmt
            .query_map([ts], row_to_memory)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(memories)
    }

    pub fn count_memories_by_kind(&self) -> Result<HashMap<MemoryKind, i64>> {
        let conn = self.db.conn()?;
        let mut stmt =
            conn.prepare("SELECT memory_type, COUNT(*) FROM memories GROUP BY memory_type")?;
        let mut counts = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (kind, n) = row?;
            if let Ok(k) = kind.parse::<MemoryKind>() {
                counts.insert(k, n);
            }
        }
        Ok(counts)
    }

    // ---- sessions ----

    pub fn insert_session(&self, s: &Session) -> Result<()> {
        self.db.conn()?.execute(
            "INSERT INTO sessions (id, question, context_used, response_summary, model_used, tokens_used)
             VALUES (lower(hex(randomblob(16))), ?1, ?2, ?3, ?4, ?5)",
            params![s.question, s.context_used, s.response_summary, s.model_used, s.tokens_used],
        )?;
        Ok(())
    }

    pub fn insert_session_returning_id(&self, s: &Session) -> Result<String> {
        let id = self.db.conn()?.query_row(
            "INSERT INTO sessions (id, question, context_used, response_summary, model_used, tokens_used)
             VALUES (lower(hex(randomblob(16))), ?1, ?2, ?3, ?4, ?5)
             RETURNING id",
            params![s.question, s.context_used, s.response_summary, s.model_used, s.tokens_used],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn update_session_summary(&self, id: &str, summary: &str) -> Result<()> {
        self.db.conn()?.execute(
            "UPDATE sessions SET response_summary = ?1 WHERE id = ?2",
            params![summary, id],
        )?;
        Ok(())
    }

    /// The N most recent sessions, newest first. `n <= 0` yields nothing.
    pub fn get_last_n_sessions(&self, n: i64) -> Result<Vec<Session>> {
        if n <= 0 {
            return Ok(Vec::new());
        }
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, question, context_used, response_summary, model_used, tokens_used, created_at
             FROM sessions ORDER BY created_at DESC, id LIMIT ?1",
        )?;
        let sessions = stmt
            .query_map([n], row_to_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    pub fn list_sessions_since(&self, since: NaiveDateTime) -> Result<Vec<Session>> {
        let ts = since.format("%Y-%m-%d %H:%M:%S").to_string();
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, question, context_used, response_summary, model_used, tokens_used, created_at
             FROM sessions WHERE created_at >= ?1 ORDER BY created_at DESC",
        )?;
        let sessions = stmt
            .query_map([ts], row_to_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    pub fn count_sessions(&self) -> Result<i64> {
        let n = self
            .db
            .conn()?
            .query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))?;
        Ok(n)
    }

    /// Delete sessions older than the given number of days. Returns the
    /// deleted count.
    pub fn prune_sessions(&self, older_than_days: i64) -> Result<usize> {
        let n = self.db.conn()?.execute(
            "DELETE FROM sessions WHERE created_at < datetime('now', '-' || ?1 || ' days')",
            [older_than_days],
        )?;
        Ok(n)
    }

    /// Delete all but the latest `keep` sessions. Returns the deleted count.
    pub fn prune_sessions_keep_latest(&self, keep: i64) -> Result<usize> {
        let n = self.db.conn()?.execute(
            "DELETE FROM sessions WHERE id NOT IN (
                SELECT id FROM sessions ORDER BY created_at DESC, id LIMIT ?1
            )",
            [keep],
        )?;
        Ok(n)
    }

    // ---- stats ----

    pub fn stats(&self) -> Result<Stats> {
        let project = self.get_project()?;
        Ok(Stats {
            project_name: project.name,
            tech_stack: project.tech_stack,
            file_count: self.count_files()?,
            chunk_count: self.count_chunks()?,
            memories: self.count_memories_by_kind()?,
            sessions: self.count_sessions()?,
            last_updated: project.updated_at,
            db_size_bytes: self.db.size_bytes(),
        })
    }
}

// ---- row mappers ----

fn time_col(row: &Row, idx: usize) -> Option<NaiveDateTime> {
    row.get::<_, String>(idx)
        .ok()
        .and_then(|s| parse_sqlite_time(&s))
}

fn row_to_file(row: &Row) -> rusqlite::Result<File> {
    Ok(File {
        id: row.get(0)?,
        path: row.get(1)?,
        language: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        last_modified: time_col(row, 3),
        content_hash: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        indexed_at: time_col(row, 5),
    })
}

fn row_to_chunk(row: &Row) -> rusqlite::Result<Chunk> {
    Ok(Chunk {
        id: row.get(0)?,
        file_id: row.get(1)?,
        content: row.get(2)?,
        start_line: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
        end_line: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
        chunk_type: row.get(5)?,
    })
}

fn row_to_memory(row: &Row) -> rusqlite::Result<Memory> {
    let kind_str: String = row.get(2)?;
    let related: Option<String> = row.get(5)?;
    Ok(Memory {
        id: row.get(0)?,
        content: row.get(1)?,
        kind: kind_str.parse().unwrap_or(MemoryKind::Note),
        importance: row.get(3)?,
        source: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        related_files: related
            .and_then(|r| serde_json::from_str(&r).ok())
            .unwrap_or_default(),
        created_at: time_col(row, 6).unwrap_or_default(),
        updated_at: time_col(row, 7).unwrap_or_default(),
    })
}

fn row_to_session(row: &Row) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        question: row.get(1)?,
        context_used: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        response_summary: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        model_used: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        tokens_used: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
        created_at: time_col(row, 6),
    })
}
