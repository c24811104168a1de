use std::path::Path;

/// Language tag for a file path, or `""` if the extension is not recognised.
/// Files with an empty tag are skipped by the scanner.
pub fn language_for_file(path: &str) -> &'static str {
    let p = Path::new(path);
    let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "go" => "go",
        "rb" => "ruby",
        "py" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "ts" | "mts" | "cts" => "typescript",
        "tsx" => "tsx",
        "jsx" => "jsx",
        "rs" => "rust",
        "java" => "java",
        "kt" => "kotlin",
        "cs" => "csharp",
        "cpp" | "cc" | "cxx" => "cpp",
        "c" => "c",
        "h" | "hpp" => "c",
        "swift" => "swift",
        "php" => "php",
        "scala" => "scala",
        "ex" | "exs" => "elixir",
        "hs" => "haskell",
        "lua" => "lua",
        "sh" | "bash" | "zsh" => "bash",
        "sql" => "sql",
        "html" | "htm" => "html",
        "css" => "css",
        "scss" | "sass" => "scss",
        "vue" => "vue",
        "svelte" => "svelte",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "xml" => "xml",
        "md" | "mdx" => "markdown",
        "tf" => "terraform",
        "proto" => "protobuf",
        "graphql" | "gql" => "graphql",
        _ => {
            // A few extensionless basenames still qualify.
            match p.file_name().and_then(|n| n.to_str()).unwrap_or("") {
                "Dockerfile" => "Dockerfile",
                "Makefile" => "Makefile",
                "Gemfile" => "Gemfile",
                _ => "",
            }
        }
    }
}

/// Chunk classification for a file: "code", "config", "test", or "docs".
pub fn chunk_type_for_file(path: &str) -> &'static str {
    let p = Path::new(path);
    let name = p.file_name().and_then(|n| n.to_str()).unwrap_or("");

    const TEST_SUFFIXES: &[&str] = &[
        "_test.go", "_spec.rb", ".test.ts", ".test.js", ".spec.ts", ".spec.js",
    ];
    if TEST_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        return "test";
    }

    let parent = p
        .parent()
        .and_then(|d| d.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("");
    if matches!(parent, "spec" | "test" | "tests" | "__tests__") {
        return "test";
    }

    let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "yaml" | "yml" | "toml" | "json" => return "config",
        "md" | "mdx" => return "docs",
        _ => {}
    }
    if name == "Dockerfile" || name == "Makefile" {
        return "config";
    }

    "code"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        assert_eq!(language_for_file("src/main.rs"), "rust");
        assert_eq!(language_for_file("app/models/user.rb"), "ruby");
        assert_eq!(language_for_file("web/index.tsx"), "tsx");
        assert_eq!(language_for_file("lib/util.mjs"), "javascript");
        assert_eq!(language_for_file("include/api.hpp"), "c");
        assert_eq!(language_for_file("schema.graphql"), "graphql");
        assert_eq!(language_for_file("infra/main.tf"), "terraform");
    }

    #[test]
    fn extensionless_basenames() {
        assert_eq!(language_for_file("Dockerfile"), "Dockerfile");
        assert_eq!(language_for_file("build/Makefile"), "Makefile");
        assert_eq!(language_for_file("Gemfile"), "Gemfile");
    }

    #[test]
    fn unknown_yields_empty() {
        assert_eq!(language_for_file("binary.dat"), "");
        assert_eq!(language_for_file("README"), "");
    }

    #[test]
    fn test_classification_by_name() {
        assert_eq!(chunk_type_for_file("pkg/auth_test.go"), "test");
        assert_eq!(chunk_type_for_file("spec/user_spec.rb"), "test");
        assert_eq!(chunk_type_for_file("src/app.test.ts"), "test");
        assert_eq!(chunk_type_for_file("src/app.spec.js"), "test");
    }

    #[test]
    fn test_classification_by_dir() {
        assert_eq!(chunk_type_for_file("tests/integration.rs"), "test");
        assert_eq!(chunk_type_for_file("src/__tests__/app.jsx"), "test");
    }

    #[test]
    fn config_docs_and_code() {
        assert_eq!(chunk_type_for_file("config/app.yaml"), "config");
        assert_eq!(chunk_type_for_file("Cargo.toml"), "config");
        assert_eq!(chunk_type_for_file("Dockerfile"), "config");
        assert_eq!(chunk_type_for_file("docs/guide.md"), "docs");
        assert_eq!(chunk_type_for_file("src/main.rs"), "code");
    }
}
