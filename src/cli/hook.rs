use std::path::{Path, PathBuf};

use crate::error::{MemvraError, Result};

/// Marks the memvra-managed section inside a hook script.
const HOOK_MARKER: &str = "# memvra:managed";

const HOOK_SCRIPT: &str = "#!/bin/sh\n\
# memvra:managed\n\
# Auto-update Memvra index after each commit.\n\
if command -v memvra >/dev/null 2>&1; then\n\
  memvra update --quiet 2>/dev/null &\n\
fi\n";

const HOOK_BLOCK: &str = "# memvra:managed\n\
# Auto-update Memvra index after each commit.\n\
if command -v memvra >/dev/null 2>&1; then\n\
  memvra update --quiet 2>/dev/null &\n\
fi\n";

fn hook_path(root: &Path) -> Result<PathBuf> {
    let git_dir = root.join(".git");
    if !git_dir.exists() {
        return Err(MemvraError::InvalidInput(format!(
            "no .git directory found in {}",
            root.display()
        )));
    }
    Ok(git_dir.join("hooks").join("post-commit"))
}

/// `memvra hook install` — add the managed post-commit block.
pub fn hook_install(root: &Path) -> Result<()> {
    let path = hook_path(root)?;
    std::fs::create_dir_all(path.parent().expect("hooks dir"))?;

    match std::fs::read_to_string(&path) {
        Ok(content) if content.contains(HOOK_MARKER) => {
            println!("Hook already installed.");
            return Ok(());
        }
        Ok(content) => {
            // Existing hook from another tool: append our block.
            let appended = format!("{content}\n{HOOK_BLOCK}");
            write_executable(&path, &appended)?;
            println!("Appended memvra hook to existing post-commit hook.");
        }
        Err(_) => {
            write_executable(&path, HOOK_SCRIPT)?;
            println!("Installed post-commit hook. Memvra will auto-update after each commit.");
        }
    }
    Ok(())
}

/// `memvra hook uninstall` — remove the managed block; remove the file
/// entirely when only the shebang would remain.
pub fn hook_uninstall(root: &Path) -> Result<()> {
    let path = hook_path(root)?;

    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(_) => {
            println!("No post-commit hook found.");
            return Ok(());
        }
    };
    if !content.contains(HOOK_MARKER) {
        println!("No memvra hook found in post-commit.");
        return Ok(());
    }

    let cleaned = remove_managed_block(&content);
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "#!/bin/sh" {
        std::fs::remove_file(&path)?;
        println!("Removed post-commit hook.");
    } else {
        write_executable(&path, &format!("{cleaned}\n"))?;
        println!("Removed memvra section from post-commit hook (other hooks preserved).");
    }
    Ok(())
}

/// `memvra hook status` — report whether the managed block is present.
pub fn hook_status(root: &Path) -> Result<()> {
    let path = hook_path(root)?;
    match std::fs::read_to_string(&path) {
        Err(_) => println!("Not installed."),
        Ok(content) if content.contains(HOOK_MARKER) => println!("Installed."),
        Ok(_) => println!("Not installed (post-commit hook exists but has no memvra section)."),
    }
    Ok(())
}

/// Strip the managed lines: from the marker through the closing `fi`.
fn remove_managed_block(content: &str) -> String {
    let mut result = Vec::new();
    let mut in_block = false;

    for line in content.lines() {
        if line.contains(HOOK_MARKER) {
            in_block = true;
            continue;
        }
        if in_block {
            if line.trim() == "fi" {
                in_block = false;
            }
            continue;
        }
        result.push(line);
    }
    result.join("\n")
}

#[cfg(unix)]
fn write_executable(path: &Path, content: &str) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::write(path, content)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn write_executable(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git/hooks")).unwrap();
        dir
    }

    #[test]
    fn install_writes_fresh_hook() {
        let dir = setup_repo();
        hook_install(dir.path()).unwrap();
        let content =
            std::fs::read_to_string(dir.path().join(".git/hooks/post-commit")).unwrap();
        assert!(content.starts_with("#!/bin/sh"));
        assert!(content.contains(HOOK_MARKER));
        assert!(content.contains("memvra update --quiet"));
    }

    #[test]
    fn install_appends_to_existing_hook() {
        let dir = setup_repo();
        let path = dir.path().join(".git/hooks/post-commit");
        std::fs::write(&path, "#!/bin/sh\necho custom hook\n").unwrap();

        hook_install(dir.path()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("echo custom hook"));
        assert!(content.contains(HOOK_MARKER));
    }

    #[test]
    fn install_is_idempotent() {
        let dir = setup_repo();
        hook_install(dir.path()).unwrap();
        let before =
            std::fs::read_to_string(dir.path().join(".git/hooks/post-commit")).unwrap();
        hook_install(dir.path()).unwrap();
        let after =
            std::fs::read_to_string(dir.path().join(".git/hooks/post-commit")).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn uninstall_removes_file_when_only_shebang_remains() {
        let dir = setup_repo();
        hook_install(dir.path()).unwrap();
        hook_uninstall(dir.path()).unwrap();
        assert!(!dir.path().join(".git/hooks/post-commit").exists());
    }

    #[test]
    fn uninstall_preserves_other_hooks() {
        let dir = setup_repo();
        let path = dir.path().join(".git/hooks/post-commit");
        std::fs::write(&path, "#!/bin/sh\necho custom hook\n").unwrap();
        hook_install(dir.path()).unwrap();
        hook_uninstall(dir.path()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("echo custom hook"));
        assert!(!content.contains(HOOK_MARKER));
        assert!(!content.contains("memvra update"));
    }

    #[test]
    fn no_git_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(hook_install(dir.path()).is_err());
    }
}
