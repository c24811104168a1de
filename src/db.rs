//! SQLite storage: connection pool, migrations, and vector tables.

use std::path::Path;
use std::sync::Once;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use sqlite_vec::sqlite3_vec_init;

use crate::error::{MemvraError, Result};

/// Dimension used when creating the vec0 virtual tables. Matches the default
/// local embedder (nomic-embed-text, 768-d). OpenAI's text-embedding-3-small
/// is 1536-d; mixing dimensions is rejected at write time.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

static SQLITE_VEC_INIT: Once = Once::new();

/// Register sqlite-vec as an auto-extension so every new connection gets the
/// vec0 module. Safe to call repeatedly.
fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Ordered migration list. Each entry is applied once and recorded by index
/// in `schema_migrations`. Append only — never reorder or edit.
const MIGRATIONS: &[&str] = &[
    // 0: project (at most one row)
    "CREATE TABLE IF NOT EXISTS project (
        id           TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
        name         TEXT NOT NULL,
        root_path    TEXT NOT NULL,
        tech_stack   TEXT NOT NULL DEFAULT '{}',
        architecture TEXT,
        conventions  TEXT,
        file_count   INTEGER DEFAULT 0,
        chunk_count  INTEGER DEFAULT 0,
        created_at   DATETIME DEFAULT CURRENT_TIMESTAMP,
        updated_at   DATETIME DEFAULT CURRENT_TIMESTAMP
    )",
    // 1: files
    "CREATE TABLE IF NOT EXISTS files (
        id            TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
        path          TEXT NOT NULL UNIQUE,
        language      TEXT,
        last_modified DATETIME,
        content_hash  TEXT,
        indexed_at    DATETIME DEFAULT CURRENT_TIMESTAMP
    )",
    // 2: chunks (cascade with their file)
    "CREATE TABLE IF NOT EXISTS chunks (
        id         TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
        file_id    TEXT NOT NULL REFERENCES files(id) ON DELETE CASCADE,
        content    TEXT NOT NULL,
        start_line INTEGER,
        end_line   INTEGER,
        chunk_type TEXT DEFAULT 'code',
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )",
    // 3: memories
    "CREATE TABLE IF NOT EXISTS memories (
        id            TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
        content       TEXT NOT NULL,
        memory_type   TEXT NOT NULL,
        importance    REAL DEFAULT 0.5,
        source        TEXT,
        related_files TEXT,
        created_at    DATETIME DEFAULT CURRENT_TIMESTAMP,
        updated_at    DATETIME DEFAULT CURRENT_TIMESTAMP
    )",
    // 4: sessions
    "CREATE TABLE IF NOT EXISTS sessions (
        id               TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
        question         TEXT NOT NULL,
        context_used     TEXT,
        response_summary TEXT,
        model_used       TEXT,
        tokens_used      INTEGER,
        created_at       DATETIME DEFAULT CURRENT_TIMESTAMP
    )",
    // 5-8: indexes
    "CREATE INDEX IF NOT EXISTS idx_memories_type ON memories(memory_type)",
    "CREATE INDEX IF NOT EXISTS idx_chunks_file ON chunks(file_id)",
    "CREATE INDEX IF NOT EXISTS idx_sessions_created ON sessions(created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_files_path ON files(path)",
];

/// Per-connection pragmas: busy_timeout so writers wait instead of failing
/// with SQLITE_BUSY, and foreign_keys which SQLite scopes to the connection.
#[derive(Debug)]
struct ConnCustomizer;

impl r2d2::CustomizeConnection<rusqlite::Connection, rusqlite::Error> for ConnCustomizer {
    fn on_acquire(&self, conn: &mut rusqlite::Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }
}

pub type PooledConn = r2d2::PooledConnection<SqliteConnectionManager>;

/// The embedded knowledge store.
///
/// One connection (single writer — readers ride along in WAL mode through
/// the same handle, serialized by the pool).
pub struct Db {
    pool: Pool<SqliteConnectionManager>,
    vec_available: bool,
    dimension: usize,
}

impl Db {
    /// Open (or create) the database at `path` and apply migrations.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_dimension(path, DEFAULT_EMBEDDING_DIMENSION)
    }

    pub fn open_with_dimension(path: &Path, dimension: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        load_sqlite_vec();

        let manager = SqliteConnectionManager::file(path);
        Self::build(manager, dimension)
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self> {
        load_sqlite_vec();
        Self::build(SqliteConnectionManager::memory(), DEFAULT_EMBEDDING_DIMENSION)
    }

    fn build(manager: SqliteConnectionManager, dimension: usize) -> Result<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .connection_customizer(Box::new(ConnCustomizer))
            .build(manager)?;

        let conn = pool.get()?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        apply_migrations(&conn)?;

        // vec0 tables are best-effort: without the extension, vector search
        // degrades to empty results rather than failing commands.
        let vec_available = apply_vector_tables(&conn, dimension).is_ok();
        if !vec_available {
            tracing::warn!("sqlite-vec unavailable — semantic search disabled");
        }
        drop(conn);

        Ok(Self {
            pool,
            vec_available,
            dimension,
        })
    }

    pub fn conn(&self) -> Result<PooledConn> {
        Ok(self.pool.get()?)
    }

    /// True when the vec0 virtual tables exist and can be queried.
    pub fn vec_available(&self) -> bool {
        self.vec_available
    }

    /// Dimension the vector tables were created with.
    pub fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    /// Database file size in bytes, via pragma.
    pub fn size_bytes(&self) -> i64 {
        self.conn()
            .ok()
            .and_then(|c| {
                c.query_row(
                    "SELECT page_count * page_size FROM pragma_page_count, pragma_page_size",
                    [],
                    |r| r.get(0),
                )
                .ok()
            })
            .unwrap_or(0)
    }
}

fn apply_migrations(conn: &rusqlite::Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    for (i, stmt) in MIGRATIONS.iter().enumerate() {
        let applied: i64 = conn.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?1",
            [i as i64],
            |r| r.get(0),
        )?;
        if applied > 0 {
            continue;
        }
        conn.execute(stmt, []).map_err(|e| {
            MemvraError::Internal(format!("migration {i} failed: {e}"))
        })?;
        conn.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [i as i64],
        )?;
    }
    Ok(())
}

fn apply_vector_tables(
    conn: &rusqlite::Connection,
    dimension: usize,
) -> std::result::Result<(), rusqlite::Error> {
    conn.execute(
        &format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS vec_chunks USING vec0(
                id TEXT PRIMARY KEY,
                embedding float[{dimension}]
            )"
        ),
        [],
    )?;
    conn.execute(
        &format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS vec_memories USING vec0(
                id TEXT PRIMARY KEY,
                embedding float[{dimension}]
            )"
        ),
        [],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let db = Db::open_in_memory().unwrap();
        let conn = db.conn().unwrap();
        // Re-running against an already-migrated connection is a no-op.
        apply_migrations(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count as usize, MIGRATIONS.len());
    }

    #[test]
    fn open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".memvra").join("memvra.db");
        let db = Db::open(&path).unwrap();
        assert!(path.exists());
        assert!(db.size_bytes() > 0);
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let db = Db::open_in_memory().unwrap();
        let conn = db.conn().unwrap();
        let err = conn.execute(
            "INSERT INTO chunks (file_id, content) VALUES ('nope', 'x')",
            [],
        );
        assert!(err.is_err());
    }
}
