use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

/// Directory names that are always pruned, regardless of .gitignore.
const HARD_IGNORED: &[&str] = &[
    "node_modules",
    "vendor",
    ".git",
    "dist",
    "build",
    ".memvra",
    "__pycache__",
    ".venv",
    "venv",
    "env",
    ".bundle",
    "tmp",
    "log",
    "coverage",
    ".nyc_output",
    "target",
];

/// Returns true if the directory name is always excluded.
pub fn hard_ignore(name: &str) -> bool {
    HARD_IGNORED.contains(&name)
}

/// File extensions we never index: binaries, archives, images, lockfiles.
const SKIP_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".webp", ".pdf", ".doc",
    ".docx", ".zip", ".tar", ".gz", ".tgz", ".rar", ".exe", ".bin", ".dll",
    ".so", ".dylib", ".lock", ".sum", ".min.js", ".map",
];

const SKIP_NAMES: &[&str] = &[
    "Gemfile.lock",
    "package-lock.json",
    "yarn.lock",
    "go.sum",
    "Cargo.lock",
    "composer.lock",
    "poetry.lock",
    "Pipfile.lock",
];

/// Returns true for files we should never index.
pub fn skip_file(name: &str) -> bool {
    // Suffix match covers compound extensions like .min.js.
    if SKIP_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
        return true;
    }
    SKIP_NAMES.contains(&name)
}

/// Compiled .gitignore matcher for a project root.
///
/// Compiled once per command invocation and shared between the scanner and
/// the watcher. A missing or unparseable .gitignore matches nothing.
pub struct IgnoreMatcher {
    gi: Option<Gitignore>,
}

impl IgnoreMatcher {
    pub fn new(root: &Path) -> Self {
        let path = root.join(".gitignore");
        if !path.exists() {
            return Self { gi: None };
        }
        let mut builder = GitignoreBuilder::new(root);
        if builder.add(&path).is_some() {
            return Self { gi: None };
        }
        match builder.build() {
            Ok(gi) => Self { gi: Some(gi) },
            Err(_) => Self { gi: None },
        }
    }

    /// Returns true if the project-relative path should be ignored.
    pub fn matches(&self, rel_path: &str) -> bool {
        let Some(ref gi) = self.gi else { return false };
        // Check both interpretations: the watcher can't always tell whether a
        // deleted path was a file or a directory.
        gi.matched_path_or_any_parents(rel_path, false).is_ignore()
            || gi.matched_path_or_any_parents(rel_path, true).is_ignore()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hard_ignored_names() {
        assert!(hard_ignore("node_modules"));
        assert!(hard_ignore(".git"));
        assert!(hard_ignore("target"));
        assert!(hard_ignore(".memvra"));
        assert!(!hard_ignore("src"));
        assert!(!hard_ignore("lib"));
    }

    #[test]
    fn skip_binary_and_lock_files() {
        assert!(skip_file("logo.png"));
        assert!(skip_file("bundle.min.js"));
        assert!(skip_file("app.js.map"));
        assert!(skip_file("Cargo.lock"));
        assert!(skip_file("package-lock.json"));
        assert!(skip_file("go.sum"));
        assert!(!skip_file("main.go"));
        assert!(!skip_file("lock.rs"));
    }

    #[test]
    fn missing_gitignore_matches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let m = IgnoreMatcher::new(dir.path());
        assert!(!m.matches("src/main.rs"));
    }

    #[test]
    fn gitignore_patterns_apply() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "*.generated.ts\nsecrets/\n").unwrap();
        let m = IgnoreMatcher::new(dir.path());
        assert!(m.matches("api/client.generated.ts"));
        assert!(m.matches("secrets/key.pem"));
        assert!(!m.matches("src/main.rs"));
    }
}
