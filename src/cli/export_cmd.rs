use std::path::Path;

use crate::config;
use crate::error::Result;
use crate::export::{self, ExportData};
use crate::git;
use crate::scanner::TechStack;

use super::open_store;

/// `memvra export` — render one format to stdout or a file.
pub fn export(root: &Path, format: &str, output: Option<&Path>) -> Result<()> {
    let (_db, store) = open_store(root)?;
    let (gcfg, _) = config::load(root);

    let exporter = export::get(format)?;

    let project = store.get_project()?;
    let stack = TechStack::from_json(&project.tech_stack);
    let data = ExportData {
        stack,
        memories: store.list_memories(None)?,
        sessions: store.get_last_n_sessions(gcfg.auto_export.max_sessions)?,
        git_state: git::capture_working_state(root),
        project,
    };

    let rendered = exporter.export(&data)?;
    match output {
        Some(path) => {
            std::fs::write(path, rendered)?;
            println!("Wrote {}", path.display());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}
