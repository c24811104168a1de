use std::fmt;

/// Error kinds surfaced by the memvra core.
///
/// Store and context-builder errors propagate to the caller; embedding,
/// extraction, summarization, and auto-export failures are best-effort and
/// are logged rather than returned.
#[derive(Debug, thiserror::Error)]
pub enum MemvraError {
    #[error("memvra not initialized — run `memvra init` first")]
    NotInitialized,

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    /// Vector extension unavailable or misconfigured. Search paths degrade
    /// to empty results instead of surfacing this; only writes raise it.
    #[error("vector index: {0}")]
    Vector(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MemvraError {
    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<r2d2::Error> for MemvraError {
    fn from(e: r2d2::Error) -> Self {
        Self::Internal(format!("pool: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, MemvraError>;
