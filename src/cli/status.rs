use std::path::Path;

use crate::error::Result;
use crate::memory::MemoryKind;
use crate::scanner::TechStack;

use super::open_store;

/// `memvra status` — print what the knowledge store currently holds.
pub fn status(root: &Path) -> Result<()> {
    let (_db, store) = open_store(root)?;
    let stats = store.stats()?;
    let ts = TechStack::from_json(&stats.tech_stack);

    println!("Project:  {}", stats.project_name);
    if !ts.language.is_empty() {
        let framework = if ts.framework.is_empty() {
            String::new()
        } else {
            format!(" / {}", ts.framework)
        };
        println!("Stack:    {}{framework}", ts.language);
    }
    println!("Files:    {}", stats.file_count);
    println!("Chunks:   {}", stats.chunk_count);

    let total: i64 = stats.memories.values().sum();
    println!("Memories: {total}");
    for kind in MemoryKind::ALL {
        if let Some(n) = stats.memories.get(&kind) {
            println!("  {:<12} {n}", format!("{kind}:"));
        }
    }
    println!("Sessions: {}", stats.sessions);
    if let Some(updated) = stats.last_updated {
        println!("Updated:  {}", updated.format("%Y-%m-%d %H:%M:%S"));
    }
    println!("DB size:  {} KB", stats.db_size_bytes / 1024);
    Ok(())
}
