//! memvra — persistent, model-agnostic AI memory layer for software projects.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use memvra::cli::{self, AskArgs, DiffArgs, ForgetArgs, PruneArgs, UpdateArgs};
use memvra::error::Result;
use memvra::{mcp, watch, wrap};

#[derive(Parser)]
#[command(
    name = "memvra",
    version,
    about = "Persistent, model-agnostic AI memory layer for software projects",
    long_about = "Memvra gives AI coding assistants a persistent memory of your project.\n\n\
        It indexes your codebase, stores architectural decisions, and automatically\n\
        injects relevant context into any LLM call — so your AI finally remembers\n\
        your project across sessions.\n\n\
        Run `memvra init` in any project directory to get started."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize memvra for this project and build the index
    Init,

    /// Ask a question with full project context injected
    Ask {
        /// The question to ask
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
        /// LLM provider override: claude, openai, gemini, ollama
        #[arg(short, long, default_value = "")]
        model: String,
        /// Files to always include in context
        #[arg(short, long)]
        files: Vec<String>,
        /// Skip memory retrieval, use the raw question only
        #[arg(long)]
        no_memory: bool,
        /// Print the injected context without calling the LLM
        #[arg(long)]
        context_only: bool,
        /// Show which memories and chunks were included
        #[arg(short, long)]
        verbose: bool,
        /// Auto-extract decisions and constraints from the response
        #[arg(short, long)]
        extract: bool,
        /// Maximum response tokens
        #[arg(long, default_value_t = 4096)]
        max_tokens: u32,
        /// Sampling temperature
        #[arg(long, default_value_t = 0.7)]
        temperature: f64,
    },

    /// Store a memory (decision, convention, constraint, note, todo)
    Remember {
        /// The fact to remember
        #[arg(required = true, num_args = 1..)]
        content: Vec<String>,
        /// Memory type; classified from content when omitted
        #[arg(short = 't', long = "type")]
        memory_type: Option<String>,
    },

    /// Delete memories by id, type, or wholesale
    Forget {
        /// Memory id to delete
        id: Option<String>,
        /// Delete every memory of this type
        #[arg(short = 't', long = "type")]
        memory_type: Option<String>,
        /// Delete all memories
        #[arg(long)]
        all: bool,
    },

    /// Print the context that would be injected for a question
    Context {
        /// The question to build context for
        #[arg(default_value = "")]
        question: String,
        /// Files to always include
        #[arg(short, long)]
        files: Vec<String>,
        /// Also write the rendered context to .memvra/context.md
        #[arg(long)]
        save: bool,
    },

    /// Show what the knowledge store currently holds
    Status,

    /// Show changes since the last update
    Diff {
        /// Only show file index changes
        #[arg(long)]
        files_only: bool,
        /// Only show memory changes
        #[arg(long)]
        memories_only: bool,
        /// Only show session changes
        #[arg(long)]
        sessions_only: bool,
        /// Override the time anchor (e.g. 24h, 7d, 2h30m)
        #[arg(long)]
        since: Option<String>,
        /// Skip the filesystem scan (only memory/session changes)
        #[arg(long)]
        no_scan: bool,
    },

    /// Re-scan the project and update the index incrementally
    Update {
        /// Re-index all files, ignoring content hashes
        #[arg(long)]
        force: bool,
        /// Suppress output (used by git hooks)
        #[arg(long)]
        quiet: bool,
    },

    /// Watch the project for file changes and auto-reindex
    Watch {
        /// Debounce interval in milliseconds
        #[arg(long, default_value_t = 500)]
        debounce: u64,
    },

    /// Render project memory in a specific format
    Export {
        /// Format: claude, cursor, markdown, json
        format: String,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Wrap an AI CLI tool and record the session
    #[command(trailing_var_arg = true)]
    Wrap {
        /// Tool to launch, followed by its arguments
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        tool: Vec<String>,
        /// LLM provider for summarization (claude, openai, gemini, ollama)
        #[arg(short, long, default_value = "")]
        model: String,
        /// Force session summarization
        #[arg(short, long)]
        summarize: bool,
        /// Force memory extraction from the session
        #[arg(short, long)]
        extract: bool,
        /// Skip injecting project context into the wrapped tool
        #[arg(long)]
        no_inject: bool,
    },

    /// Serve memory operations over MCP (stdio transport)
    Serve,

    /// Manage the post-commit git hook for automatic re-indexing
    Hook {
        #[command(subcommand)]
        action: HookAction,
    },

    /// Trim old sessions from the store
    Prune {
        /// Delete sessions older than this many days
        #[arg(long)]
        older_than: Option<i64>,
        /// Keep only the latest N sessions
        #[arg(long)]
        keep: Option<i64>,
    },
}

#[derive(Subcommand)]
enum HookAction {
    /// Install the post-commit hook
    Install,
    /// Remove the post-commit hook
    Uninstall,
    /// Check if the post-commit hook is installed
    Status,
}

fn main() -> ExitCode {
    // Log to stderr so stdout stays clean for streamed answers and MCP.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command, &runtime) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, runtime: &tokio::runtime::Runtime) -> Result<()> {
    let root = cli::find_root()?;

    match command {
        Command::Init => runtime.block_on(cli::init(&root)),

        Command::Ask {
            question,
            model,
            files,
            no_memory,
            context_only,
            verbose,
            extract,
            max_tokens,
            temperature,
        } => runtime.block_on(cli::ask(
            &root,
            AskArgs {
                question: question.join(" "),
                model,
                files,
                no_memory,
                context_only,
                verbose,
                extract,
                max_tokens,
                temperature,
            },
        )),

        Command::Remember {
            content,
            memory_type,
        } => runtime.block_on(cli::remember(
            &root,
            &content.join(" "),
            memory_type.as_deref(),
        )),

        Command::Forget {
            id,
            memory_type,
            all,
        } => runtime.block_on(cli::forget(
            &root,
            ForgetArgs {
                id,
                kind: memory_type,
                all,
            },
        )),

        Command::Context {
            question,
            files,
            save,
        } => runtime.block_on(cli::context(&root, &question, files, save)),

        Command::Status => cli::status(&root),

        Command::Diff {
            files_only,
            memories_only,
            sessions_only,
            since,
            no_scan,
        } => cli::diff(
            &root,
            DiffArgs {
                files_only,
                memories_only,
                sessions_only,
                since,
                no_scan,
            },
        ),

        Command::Update { force, quiet } => {
            runtime.block_on(cli::update(&root, UpdateArgs { force, quiet }))
        }

        Command::Watch { debounce } => watch::run(&root, debounce, runtime.handle().clone()),

        Command::Export { format, output } => cli::export(&root, &format, output.as_deref()),

        Command::Wrap {
            tool,
            model,
            summarize,
            extract,
            no_inject,
        } => wrap::run(
            &root,
            &tool[0],
            &tool[1..],
            wrap::WrapArgs {
                model,
                summarize,
                extract,
                no_inject,
            },
            runtime.handle().clone(),
        ),

        Command::Serve => runtime.block_on(mcp::serve_stdio(root)),

        Command::Hook { action } => match action {
            HookAction::Install => cli::hook_install(&root),
            HookAction::Uninstall => cli::hook_uninstall(&root),
            HookAction::Status => cli::hook_status(&root),
        },

        Command::Prune { older_than, keep } => cli::prune(
            &root,
            PruneArgs {
                older_than_days: older_than,
                keep,
            },
        ),
    }
}
