use std::io::Write as _;
use std::path::Path;

use crate::adapter::{new_adapter, CompletionRequest, StreamChunk};
use crate::config;
use crate::context::{Builder, BuildOptions, Tokenizer};
use crate::error::{MemvraError, Result};
use crate::memory::{self, Orchestrator, Session, VectorStore};

use super::{auto_export, build_embedder, open_store, truncate_label};

#[derive(Debug, Default)]
pub struct AskArgs {
    pub question: String,
    /// Provider override: claude, openai, gemini, ollama.
    pub model: String,
    /// Files to always include in context.
    pub files: Vec<String>,
    /// Skip memory retrieval entirely.
    pub no_memory: bool,
    /// Print the injected context without calling the LLM.
    pub context_only: bool,
    pub verbose: bool,
    /// Force memory extraction from the response.
    pub extract: bool,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// `memvra ask` — answer a question with project context injected.
pub async fn ask(root: &Path, args: AskArgs) -> Result<()> {
    let (gcfg, pcfg) = config::load(root);
    let (db, store) = open_store(root)?;
    let vectors = VectorStore::new(db.clone());

    // always_include paths from project config come before CLI -f files.
    let mut files = pcfg.always_include.clone();
    files.extend(args.files.iter().cloned());

    let provider = if args.model.is_empty() {
        gcfg.default_model.clone()
    } else {
        args.model.clone()
    };

    let embedder = if args.no_memory {
        None
    } else {
        build_embedder(&gcfg)
    };
    let orchestrator = Orchestrator::new(store.clone(), vectors, embedder);
    let tokenizer = Tokenizer::new()?;
    let builder = Builder::new(&store, &orchestrator, &tokenizer);

    let built = builder
        .build(BuildOptions {
            question: args.question.clone(),
            project_root: root.display().to_string(),
            max_tokens: gcfg.context.max_tokens,
            top_k_chunks: gcfg.context.top_k_chunks,
            top_k_memories: gcfg.context.top_k_memories,
            similarity_threshold: gcfg.context.similarity_threshold,
            extra_files: files,
        })
        .await?;

    if args.verbose && !built.sources.is_empty() {
        eprintln!("=== Sources included ===");
        for s in &built.sources {
            eprintln!("  • {s}");
        }
        eprintln!();
    }

    if args.context_only {
        println!("=== System Prompt ===");
        println!("{}", built.system_prompt);
        println!("=== Context ===");
        println!("{}", built.context_text);
        println!("\n--- {} tokens ---", built.tokens_used);
        return Ok(());
    }

    let llm = new_adapter(
        &provider,
        &gcfg.ollama.completion_model,
        gcfg.api_key(&provider),
        &gcfg.ollama.host,
    )?;

    let mut rx = llm
        .complete(CompletionRequest {
            system_prompt: built.system_prompt.clone(),
            context: built.context_text.clone(),
            user_message: args.question.clone(),
            model: String::new(),
            max_tokens: if args.max_tokens == 0 { 4096 } else { args.max_tokens },
            temperature: if args.temperature == 0.0 { 0.7 } else { args.temperature },
            stream: gcfg.output.stream,
        })
        .await?;

    let mut response = String::new();
    let mut stdout = std::io::stdout();
    while let Some(chunk) = rx.recv().await {
        match chunk {
            StreamChunk::Text(t) => {
                print!("{t}");
                let _ = stdout.flush();
                response.push_str(&t);
            }
            StreamChunk::Error(e) => {
                println!();
                return Err(MemvraError::Stream(e.to_string()));
            }
        }
    }
    println!();

    // Record the session; non-fatal on failure.
    let sources_json = serde_json::to_string(&built.sources).unwrap_or_else(|_| "[]".into());
    let _ = store.insert_session(&Session {
        question: args.question.clone(),
        context_used: sources_json,
        response_summary: truncate_label(&response, 300),
        model_used: provider.clone(),
        tokens_used: built.tokens_used as i64,
        ..Default::default()
    });

    // Optional extraction of memorable statements from the response.
    if gcfg.extraction.enabled || args.extract {
        match memory::extract_memories(llm.as_ref(), &response, gcfg.extraction.max_extracts).await
        {
            Err(e) => eprintln!("warn: memory extraction failed: {e}"),
            Ok(extracted) => {
                let mut saved = 0usize;
                for m in &extracted {
                    match orchestrator.remember(&m.content, m.kind, "extracted").await {
                        Ok(mem) => {
                            saved += 1;
                            if args.verbose {
                                eprintln!(
                                    "  extracted ({}): {}",
                                    mem.kind,
                                    truncate_label(&mem.content, 60)
                                );
                            }
                        }
                        Err(_) => continue,
                    }
                }
                if saved > 0 && !args.verbose {
                    eprintln!(
                        "  {saved} memor{} extracted and stored.",
                        if saved == 1 { "y" } else { "ies" }
                    );
                }
                if saved > 0 {
                    auto_export(root, &store);
                }
            }
        }
    }

    Ok(())
}
