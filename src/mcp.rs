//! MCP tool server: exposes memory operations to external AI clients over
//! stdio.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler, ServiceExt};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::cli::{auto_export, build_embedder, open_store, truncate_label};
use crate::config;
use crate::context::{Builder, BuildOptions, Tokenizer};
use crate::db::Db;
use crate::error::Result as MemvraResult;
use crate::memory::{
    classify_memory_kind, MemoryKind, Orchestrator, RetrieveOptions, Session, Store, VectorStore,
};
use crate::scanner::TechStack;

/// Start the MCP server on stdio. Blocks until the client disconnects.
pub async fn serve_stdio(root: PathBuf) -> MemvraResult<()> {
    let (db, store) = open_store(&root)?;
    tracing::info!(root = %root.display(), "starting memvra MCP server on stdio");

    let tools = MemvraTools::new(root, db, store);
    let server = tools
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|e| crate::error::MemvraError::Internal(format!("mcp serve: {e}")))?;

    server
        .waiting()
        .await
        .map_err(|e| crate::error::MemvraError::Internal(format!("mcp wait: {e}")))?;
    tracing::info!("MCP server shut down");
    Ok(())
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SaveProgressParams {
    /// Short label for the task that was worked on.
    pub task: String,
    /// What was done and what remains.
    pub summary: String,
    /// Which model/tool did the work.
    pub model: String,
    /// Paths touched during the task.
    pub files_touched: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RememberParams {
    /// The fact to remember.
    pub content: String,
    /// decision, convention, constraint, note, or todo. Classified from the
    /// content when omitted.
    pub r#type: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetContextParams {
    /// Question to retrieve context for; empty returns the standing context.
    pub question: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Natural-language search query.
    pub query: String,
    /// Maximum results per category (default 10).
    pub top_k: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ForgetParams {
    /// Id of the memory to delete.
    pub id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ProjectStatusParams {}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListMemoriesParams {
    /// Filter by kind; all kinds when omitted.
    pub r#type: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListSessionsParams {
    /// Maximum sessions to return (default 10).
    pub limit: Option<i64>,
}

/// The memvra MCP tool handler: shared state plus the fixed tool surface.
#[derive(Clone)]
pub struct MemvraTools {
    tool_router: ToolRouter<Self>,
    root: PathBuf,
    db: Arc<Db>,
    store: Store,
}

#[tool_router]
impl MemvraTools {
    pub fn new(root: PathBuf, db: Arc<Db>, store: Store) -> Self {
        Self {
            tool_router: Self::tool_router(),
            root,
            db,
            store,
        }
    }

    fn orchestrator(&self) -> Orchestrator {
        let (gcfg, _) = config::load(&self.root);
        Orchestrator::new(
            self.store.clone(),
            VectorStore::new(self.db.clone()),
            build_embedder(&gcfg),
        )
    }

    /// Record progress on a task so other AI tools pick it up.
    #[tool(
        description = "Save progress on a task. Records a session and regenerates CLAUDE.md, .cursorrules, and PROJECT_CONTEXT.md so other AI tools see it."
    )]
    async fn save_progress(
        &self,
        Parameters(params): Parameters<SaveProgressParams>,
    ) -> std::result::Result<String, String> {
        let mut summary = params.summary;
        if let Some(files) = &params.files_touched {
            if !files.is_empty() {
                summary.push_str("\n\nFiles touched: ");
                summary.push_str(&files.join(", "));
            }
        }

        self.store
            .insert_session(&Session {
                question: params.task,
                response_summary: summary,
                model_used: params.model,
                ..Default::default()
            })
            .map_err(|e| format!("failed to save progress: {e}"))?;

        auto_export(&self.root, &self.store);
        Ok("Progress saved. Other AI tools will see this context in CLAUDE.md, .cursorrules, and PROJECT_CONTEXT.md.".into())
    }

    /// Store a memory, classifying untyped content.
    #[tool(
        description = "Store a long-lived memory. Types: decision, convention, constraint, note, todo. Untyped content is classified automatically."
    )]
    async fn remember(
        &self,
        Parameters(params): Parameters<RememberParams>,
    ) -> std::result::Result<String, String> {
        let kind: MemoryKind = match params.r#type.as_deref() {
            Some(t) if !t.is_empty() => t.parse().map_err(|e| format!("{e}"))?,
            _ => classify_memory_kind(&params.content),
        };

        let memory = self
            .orchestrator()
            .remember(&params.content, kind, "user")
            .await
            .map_err(|e| format!("failed to store memory: {e}"))?;

        auto_export(&self.root, &self.store);
        Ok(format!("Remembered as {} (id: {})", memory.kind, memory.id))
    }

    /// Token-budgeted context for a question.
    #[tool(
        description = "Build the project context block for a question: profile, conventions, constraints, decisions, and semantically relevant code."
    )]
    async fn get_context(
        &self,
        Parameters(params): Parameters<GetContextParams>,
    ) -> std::result::Result<String, String> {
        let (gcfg, _) = config::load(&self.root);
        let orchestrator = self.orchestrator();
        let tokenizer = Tokenizer::new().map_err(|e| e.to_string())?;
        let builder = Builder::new(&self.store, &orchestrator, &tokenizer);

        let built = builder
            .build(BuildOptions {
                question: params.question.unwrap_or_default(),
                project_root: self.root.display().to_string(),
                max_tokens: gcfg.context.max_tokens,
                top_k_chunks: gcfg.context.top_k_chunks,
                top_k_memories: gcfg.context.top_k_memories,
                similarity_threshold: gcfg.context.similarity_threshold,
                extra_files: Vec::new(),
            })
            .await
            .map_err(|e| format!("failed to build context: {e}"))?;

        let mut out = String::new();
        if !built.system_prompt.is_empty() {
            out.push_str(&built.system_prompt);
            out.push_str("\n\n");
        }
        out.push_str(&built.context_text);
        Ok(out)
    }

    /// Semantic search over memories and code.
    #[tool(description = "Search stored memories and indexed code by semantic similarity.")]
    async fn search(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> std::result::Result<String, String> {
        let (gcfg, _) = config::load(&self.root);
        let top_k = params.top_k.unwrap_or(10);

        let result = self
            .orchestrator()
            .retrieve(
                &params.query,
                RetrieveOptions {
                    top_k_chunks: top_k,
                    top_k_memories: top_k,
                    similarity_threshold: gcfg.context.similarity_threshold,
                },
            )
            .await
            .map_err(|e| format!("search failed: {e}"))?;

        let mut out = String::new();
        if !result.memories.is_empty() {
            out.push_str("## Matching Memories\n\n");
            for m in &result.memories {
                let _ = writeln!(out, "- [{}] {} (id: {})", m.kind, m.content, m.id);
            }
            out.push('\n');
        }
        if !result.chunks.is_empty() {
            out.push_str("## Matching Code\n\n");
            for c in &result.chunks {
                let label = self
                    .store
                    .get_file_by_id(&c.file_id)
                    .map(|f| f.path)
                    .unwrap_or_else(|_| c.file_id.clone());
                let _ = write!(
                    out,
                    "### {label} (lines {}-{})\n```\n{}\n```\n\n",
                    c.start_line, c.end_line, c.content
                );
            }
        }

        if out.is_empty() {
            Ok("No results found.".into())
        } else {
            Ok(out)
        }
    }

    /// Delete a memory by id.
    #[tool(description = "Delete a stored memory by id.")]
    async fn forget(
        &self,
        Parameters(params): Parameters<ForgetParams>,
    ) -> std::result::Result<String, String> {
        self.orchestrator()
            .forget(&params.id)
            .map_err(|e| format!("failed to delete memory: {e}"))?;
        auto_export(&self.root, &self.store);
        Ok(format!("Forgot memory {}.", params.id))
    }

    /// Short status block for the project store.
    #[tool(description = "Current project status: stack, index counts, memory counts.")]
    async fn project_status(
        &self,
        Parameters(_params): Parameters<ProjectStatusParams>,
    ) -> std::result::Result<String, String> {
        let stats = self.store.stats().map_err(|e| e.to_string())?;
        let ts = TechStack::from_json(&stats.tech_stack);

        let mut out = String::new();
        let _ = writeln!(out, "Project: {}", stats.project_name);
        if !ts.language.is_empty() {
            let _ = writeln!(out, "Stack: {} {}", ts.language, ts.framework);
        }
        let _ = writeln!(out, "Indexed: {} files, {} chunks", stats.file_count, stats.chunk_count);
        let total: i64 = stats.memories.values().sum();
        let _ = writeln!(out, "Memories: {total}");
        let _ = writeln!(out, "Sessions: {}", stats.sessions);
        Ok(out)
    }

    /// Textual listing of stored memories.
    #[tool(description = "List stored memories, optionally filtered by type.")]
    async fn list_memories(
        &self,
        Parameters(params): Parameters<ListMemoriesParams>,
    ) -> std::result::Result<String, String> {
        let kind = match params.r#type.as_deref() {
            Some(t) if !t.is_empty() => {
                Some(t.parse::<MemoryKind>().map_err(|e| format!("{e}"))?)
            }
            _ => None,
        };

        let memories = self.store.list_memories(kind).map_err(|e| e.to_string())?;
        if memories.is_empty() {
            return Ok("No memories stored.".into());
        }
        let mut out = String::new();
        for m in &memories {
            let _ = writeln!(
                out,
                "- [{}] {} (importance {:.1}, id: {})",
                m.kind, m.content, m.importance, m.id
            );
        }
        Ok(out)
    }

    /// Textual listing of recent sessions.
    #[tool(description = "List recent recorded sessions in chronological order, oldest first.")]
    async fn list_sessions(
        &self,
        Parameters(params): Parameters<ListSessionsParams>,
    ) -> std::result::Result<String, String> {
        let limit = params.limit.unwrap_or(10);
        let sessions = self
            .store
            .get_last_n_sessions(limit)
            .map_err(|e| e.to_string())?;
        if sessions.is_empty() {
            return Ok("No sessions recorded.".into());
        }

        // The store hands sessions back newest-first; display chronologically.
        let mut out = String::new();
        for s in sessions.iter().rev() {
            let ts = s
                .created_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            let _ = writeln!(out, "[{ts}] ({}) {}", s.model_used, s.question);
            if !s.response_summary.is_empty() {
                let _ = writeln!(out, "  {}", truncate_label(&s.response_summary, 200));
            }
        }
        Ok(out)
    }
}

#[tool_handler]
impl ServerHandler for MemvraTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Memvra is a persistent project memory. Use get_context before starting work, \
                 remember to store decisions, and save_progress when finishing a task."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
