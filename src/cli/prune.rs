use std::path::Path;

use crate::error::{MemvraError, Result};

use super::open_store;

#[derive(Debug, Default)]
pub struct PruneArgs {
    /// Delete sessions older than this many days.
    pub older_than_days: Option<i64>,
    /// Keep only the latest N sessions.
    pub keep: Option<i64>,
}

/// `memvra prune` — trim old sessions from the store.
pub fn prune(root: &Path, args: PruneArgs) -> Result<()> {
    let (_db, store) = open_store(root)?;

    let deleted = match (args.older_than_days, args.keep) {
        (Some(days), None) => {
            if days <= 0 {
                return Err(MemvraError::InvalidInput(
                    "--older-than must be a positive number of days".into(),
                ));
            }
            store.prune_sessions(days)?
        }
        (None, Some(keep)) => {
            if keep < 0 {
                return Err(MemvraError::InvalidInput("--keep must be non-negative".into()));
            }
            store.prune_sessions_keep_latest(keep)?
        }
        _ => {
            return Err(MemvraError::InvalidInput(
                "pass exactly one of --older-than <days> or --keep <n>".into(),
            ))
        }
    };

    println!(
        "Pruned {deleted} session{}.",
        if deleted == 1 { "" } else { "s" }
    );
    Ok(())
}
