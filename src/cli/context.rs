use std::path::Path;

use crate::config;
use crate::context::{Builder, BuildOptions, Tokenizer};
use crate::error::Result;
use crate::memory::{Orchestrator, VectorStore};

use super::{build_embedder, open_store};

/// `memvra context` — print the context that would be injected for a
/// question, without calling any model. With `save`, the rendered context
/// also lands in `.memvra/context.md` for hand editing.
pub async fn context(root: &Path, question: &str, files: Vec<String>, save: bool) -> Result<()> {
    let (gcfg, pcfg) = config::load(root);
    let (db, store) = open_store(root)?;
    let vectors = VectorStore::new(db.clone());

    let mut extra = pcfg.always_include.clone();
    extra.extend(files);

    let orchestrator = Orchestrator::new(store.clone(), vectors, build_embedder(&gcfg));
    let tokenizer = Tokenizer::new()?;
    let builder = Builder::new(&store, &orchestrator, &tokenizer);

    let built = builder
        .build(BuildOptions {
            question: question.to_string(),
            project_root: root.display().to_string(),
            max_tokens: gcfg.context.max_tokens,
            top_k_chunks: gcfg.context.top_k_chunks,
            top_k_memories: gcfg.context.top_k_memories,
            similarity_threshold: gcfg.context.similarity_threshold,
            extra_files: extra,
        })
        .await?;

    println!("=== System Prompt ===");
    println!("{}", built.system_prompt);
    println!("=== Context ===");
    println!("{}", built.context_text);
    println!(
        "\n--- {} tokens, {} chunks, {} memories ---",
        built.tokens_used, built.chunks_used, built.memories_used
    );

    if save {
        let path = config::project_dir(root).join("context.md");
        std::fs::write(
            &path,
            format!("{}\n\n{}", built.system_prompt, built.context_text),
        )?;
        println!("Saved to {}", path.display());
    }
    Ok(())
}
