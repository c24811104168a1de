//! Transparent PTY proxy around a child AI CLI, with context injection and
//! post-hoc session capture.

use std::fmt::Write as _;
use std::io::{IsTerminal, Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use regex::Regex;

use crate::adapter::new_adapter;
use crate::cli::{auto_export, build_embedder, truncate_label};
use crate::config;
use crate::db::Db;
use crate::error::{MemvraError, Result};
use crate::memory::{
    self, MemoryKind, Orchestrator, Session, Store, VectorStore,
};

/// Sessions shorter than this after cleanup are not worth recording.
const MIN_CAPTURE_CHARS: usize = 50;

/// Delay before the context preamble is typed into the child, giving the
/// wrapped tool time to initialize.
const PREAMBLE_DELAY: Duration = Duration::from_millis(800);

#[derive(Debug, Default)]
pub struct WrapArgs {
    /// LLM provider for summarization/extraction.
    pub model: String,
    /// Force session summarization.
    pub summarize: bool,
    /// Force memory extraction.
    pub extract: bool,
    /// Skip injecting project context into the wrapped tool.
    pub no_inject: bool,
}

/// `memvra wrap <tool> [args...]` — proxy the tool, record the session.
///
/// Works without an initialized store; capture and injection are then
/// skipped and the tool runs plainly.
pub fn run(
    root: &Path,
    tool: &str,
    tool_args: &[String],
    args: WrapArgs,
    handle: tokio::runtime::Handle,
) -> Result<()> {
    let (gcfg, _) = config::load(root);

    let db_path = config::project_db_path(root);
    let db = if db_path.exists() {
        Db::open(&db_path).ok().map(Arc::new)
    } else {
        None
    };
    let store = db.as_ref().map(|db| Store::new(db.clone()));

    let preamble = if args.no_inject {
        String::new()
    } else {
        store.as_ref().map(build_wrap_context).unwrap_or_default()
    };
    if !preamble.is_empty() {
        eprintln!("[memvra] injecting project context into {tool}...");
    }

    let mut capture: Vec<u8> = Vec::new();
    let run_result = if std::io::stdin().is_terminal() {
        run_in_pty(tool, tool_args, &mut capture, &preamble)
    } else {
        run_without_pty(tool, tool_args, &mut capture, &preamble)
    };
    if let Err(e) = &run_result {
        eprintln!("\n[memvra wrap] {tool} exited: {e}");
    }

    let (Some(db), Some(store)) = (db, store) else {
        return Ok(());
    };
    if capture.is_empty() {
        return Ok(());
    }

    let cleaned = clean_capture(&String::from_utf8_lossy(&capture));
    if cleaned.len() < MIN_CAPTURE_CHARS {
        return Ok(());
    }

    eprintln!("\n[memvra wrap] recording session...");
    let session_id = store
        .insert_session_returning_id(&Session {
            question: format!("wrap: {tool} session"),
            response_summary: truncate_label(&cleaned, 300),
            model_used: tool.to_string(),
            ..Default::default()
        })
        .unwrap_or_default();

    // Summarization and extraction are both best-effort.
    let provider = if args.model.is_empty() {
        gcfg.default_model.clone()
    } else {
        args.model.clone()
    };
    let llm = new_adapter(
        &provider,
        &gcfg.ollama.completion_model,
        gcfg.api_key(&provider),
        &gcfg.ollama.host,
    );

    if (gcfg.summarization.enabled || args.summarize) && !session_id.is_empty() {
        if let Ok(llm) = &llm {
            match handle.block_on(memory::summarize_session(
                llm.as_ref(),
                &format!("Session with {tool}"),
                &cleaned,
                gcfg.summarization.max_tokens,
            )) {
                Ok(summary) if !summary.is_empty() => {
                    let _ = store.update_session_summary(&session_id, &summary);
                    eprintln!("[memvra wrap] session summarized");
                }
                Ok(_) => {}
                Err(e) => eprintln!("warn: summarization failed: {e}"),
            }
        }
    }

    if gcfg.extraction.enabled || args.extract {
        if let Ok(llm) = &llm {
            match handle.block_on(memory::extract_memories(
                llm.as_ref(),
                &cleaned,
                gcfg.extraction.max_extracts,
            )) {
                Ok(extracted) if !extracted.is_empty() => {
                    let vectors = VectorStore::new(db.clone());
                    let orchestrator =
                        Orchestrator::new(store.clone(), vectors, build_embedder(&gcfg));
                    let mut saved = 0usize;
                    for m in &extracted {
                        if handle
                            .block_on(orchestrator.remember(&m.content, m.kind, "extracted"))
                            .is_ok()
                        {
                            saved += 1;
                        }
                    }
                    eprintln!(
                        "[memvra wrap] {saved} memor{} extracted",
                        if saved == 1 { "y" } else { "ies" }
                    );
                }
                Ok(_) => {}
                Err(e) => eprintln!("warn: memory extraction failed: {e}"),
            }
        }
    }

    auto_export(root, &store);
    Ok(())
}

/// Launch the tool in a pseudo-terminal, proxying all I/O.
///
/// Raw mode sends every keystroke (including Ctrl-C) to the child; SIGWINCH
/// is forwarded as a pty resize; child output is teed into `capture`.
fn run_in_pty(
    tool: &str,
    tool_args: &[String],
    capture: &mut Vec<u8>,
    preamble: &str,
) -> Result<()> {
    let pty_system = native_pty_system();
    let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));
    let pair = pty_system
        .openpty(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| MemvraError::Internal(format!("pty open: {e}")))?;

    let mut cmd = CommandBuilder::new(tool);
    cmd.args(tool_args);
    if let Ok(cwd) = std::env::current_dir() {
        cmd.cwd(cwd);
    }
    let mut child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| MemvraError::Internal(format!("pty spawn: {e}")))?;
    drop(pair.slave);

    let master = Arc::new(Mutex::new(pair.master));
    let mut reader = master
        .lock()
        .expect("pty master")
        .try_clone_reader()
        .map_err(|e| MemvraError::Internal(format!("pty reader: {e}")))?;
    let mut writer = master
        .lock()
        .expect("pty master")
        .take_writer()
        .map_err(|e| MemvraError::Internal(format!("pty writer: {e}")))?;

    // Forward terminal resizes to the child's pty.
    let resize_master = master.clone();
    let mut signals = signal_hook::iterator::Signals::new([signal_hook::consts::SIGWINCH])
        .map_err(|e| MemvraError::Internal(format!("signal handler: {e}")))?;
    let signals_handle = signals.handle();
    std::thread::spawn(move || {
        for _ in signals.forever() {
            if let Ok((cols, rows)) = crossterm::terminal::size() {
                let _ = resize_master.lock().expect("pty master").resize(PtySize {
                    rows,
                    cols,
                    pixel_width: 0,
                    pixel_height: 0,
                });
            }
        }
    });

    crossterm::terminal::enable_raw_mode()
        .map_err(|e| MemvraError::Internal(format!("raw mode: {e}")))?;

    // stdin → child, with the optional delayed preamble first.
    let preamble_owned = preamble.to_string();
    std::thread::spawn(move || {
        if !preamble_owned.is_empty() {
            std::thread::sleep(PREAMBLE_DELAY);
            let _ = writer.write_all(preamble_owned.as_bytes());
            let _ = writer.flush();
        }
        let mut stdin = std::io::stdin();
        let mut buf = [0u8; 4096];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if writer.write_all(&buf[..n]).is_err() {
                        break;
                    }
                    let _ = writer.flush();
                }
            }
        }
    });

    // child → stdout, teed into the capture buffer.
    let mut stdout = std::io::stdout();
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let _ = stdout.write_all(&buf[..n]);
                let _ = stdout.flush();
                capture.extend_from_slice(&buf[..n]);
            }
        }
    }

    let status = child.wait();
    signals_handle.close();
    let _ = crossterm::terminal::disable_raw_mode();

    match status {
        Ok(s) if s.success() => Ok(()),
        Ok(s) => Err(MemvraError::Internal(format!("exit code {}", s.exit_code()))),
        Err(e) => Err(MemvraError::Internal(format!("wait: {e}"))),
    }
}

/// Run the tool without a pty (stdin is not a terminal), plumbing the
/// preamble ahead of piped stdin.
fn run_without_pty(
    tool: &str,
    tool_args: &[String],
    capture: &mut Vec<u8>,
    preamble: &str,
) -> Result<()> {
    use std::process::{Command, Stdio};

    let mut child = Command::new(tool)
        .args(tool_args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()?;

    let mut child_stdin = child.stdin.take().expect("piped stdin");
    let preamble_owned = preamble.to_string();
    std::thread::spawn(move || {
        if !preamble_owned.is_empty() {
            let _ = child_stdin.write_all(preamble_owned.as_bytes());
        }
        let mut stdin = std::io::stdin();
        let _ = std::io::copy(&mut stdin, &mut child_stdin);
    });

    let mut child_stdout = child.stdout.take().expect("piped stdout");
    let mut stdout = std::io::stdout();
    let mut buf = [0u8; 4096];
    loop {
        match child_stdout.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let _ = stdout.write_all(&buf[..n]);
                let _ = stdout.flush();
                capture.extend_from_slice(&buf[..n]);
            }
        }
    }

    let status = child.wait()?;
    if status.success() {
        Ok(())
    } else {
        Err(MemvraError::Internal(format!("exit status {status}")))
    }
}

/// Compact context summary injected as the wrapped tool's first message, so
/// "continue" works across sessions.
fn build_wrap_context(store: &Store) -> String {
    let sessions = store.get_last_n_sessions(3).unwrap_or_default();
    let decisions = store.list_memories(Some(MemoryKind::Decision)).unwrap_or_default();
    let todos = store.list_memories(Some(MemoryKind::Todo)).unwrap_or_default();

    if sessions.is_empty() && decisions.is_empty() && todos.is_empty() {
        return String::new();
    }

    let mut b =
        String::from("Here is project context from previous AI sessions (provided by Memvra):\n\n");

    if !sessions.is_empty() {
        b.push_str("## Recent Sessions\n");
        for s in sessions.iter().rev() {
            let ts = s
                .created_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            let model = if s.model_used.is_empty() {
                String::new()
            } else {
                format!(" ({})", s.model_used)
            };
            let _ = write!(b, "- [{ts}]{model} {}", s.question);
            if !s.response_summary.is_empty() {
                let _ = write!(b, ": {}", truncate_label(&s.response_summary, 200));
            }
            b.push('\n');
        }
        b.push('\n');
    }

    if !decisions.is_empty() {
        b.push_str("## Key Decisions\n");
        for d in &decisions {
            let _ = writeln!(b, "- {}", d.content);
        }
        b.push('\n');
    }

    if !todos.is_empty() {
        b.push_str("## TODOs\n");
        for t in &todos {
            let _ = writeln!(b, "- {}", t.content);
        }
        b.push('\n');
    }

    b.push_str("Please acknowledge this context and continue from where the previous session left off.\n");
    b
}

fn ansi_pattern() -> &'static Regex {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    ANSI.get_or_init(|| {
        Regex::new(r"\x1b\[[0-9;?]*[a-zA-Z]|\x1b[^\[a-zA-Z]|\r").expect("valid ansi pattern")
    })
}

fn blank_runs_pattern() -> &'static Regex {
    static RUNS: OnceLock<Regex> = OnceLock::new();
    RUNS.get_or_init(|| Regex::new(r"\n{3,}").expect("valid pattern"))
}

/// Strip ANSI escapes and carriage returns, collapse runs of blank lines,
/// and trim outer whitespace.
pub fn clean_capture(s: &str) -> String {
    let stripped = ansi_pattern().replace_all(s, "");
    let collapsed = blank_runs_pattern().replace_all(&stripped, "\n\n");
    collapsed.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ansi_codes_are_stripped() {
        let raw = "\x1b[1;32mhello\x1b[0m world\r\n\x1b[2Kcleared";
        assert_eq!(clean_capture(raw), "hello world\ncleared");
    }

    #[test]
    fn blank_runs_collapse_to_two() {
        let raw = "first\n\n\n\n\nsecond\n\nthird";
        assert_eq!(clean_capture(raw), "first\n\nsecond\n\nthird");
    }

    #[test]
    fn outer_whitespace_trimmed() {
        assert_eq!(clean_capture("\n\n  text  \n\n"), "text");
    }

    #[test]
    fn cursor_movement_sequences_removed() {
        let raw = "\x1b[10Aspinner\x1b[?25l done\x1b[?25h";
        let cleaned = clean_capture(raw);
        assert!(!cleaned.contains('\x1b'));
        assert!(cleaned.contains("done"));
    }
}
