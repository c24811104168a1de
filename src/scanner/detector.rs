use std::path::Path;

use serde::{Deserialize, Serialize};

/// Auto-detected project profile, stored as JSON on the project row.
///
/// Detection is a best-effort heuristic over marker files; it makes no
/// attempt to be correct for unusual layouts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TechStack {
    pub project_name: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub framework: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub database: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub test_framework: String,
    #[serde(
        default,
        rename = "architecture_pattern",
        skip_serializing_if = "String::is_empty"
    )]
    pub architecture: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ci: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detected_patterns: Vec<String>,
    #[serde(default)]
    pub file_count: usize,
    #[serde(default)]
    pub chunk_count: usize,
}

impl TechStack {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn from_json(s: &str) -> Self {
        serde_json::from_str(s).unwrap_or_default()
    }
}

/// Inspect the project root and return a best-effort profile.
pub fn detect_tech_stack(root: &Path) -> TechStack {
    let mut ts = TechStack {
        project_name: root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        ..Default::default()
    };

    let has = |names: &[&str]| names.iter().any(|n| root.join(n).exists());
    let read = |name: &str| std::fs::read_to_string(root.join(name)).unwrap_or_default();

    if has(&["Gemfile", "Gemfile.lock"]) {
        ts.language = "Ruby".into();
        let gemfile = read("Gemfile");
        if gemfile.contains("rails") {
            ts.framework = "Rails".into();
            ts.test_framework = "RSpec".into();
            if has(&["config/routes.rb"]) {
                ts.entry_points.push("config/routes.rb".into());
            }
        } else if gemfile.contains("sinatra") {
            ts.framework = "Sinatra".into();
        }
        if gemfile.contains("rspec") {
            ts.test_framework = "RSpec".into();
        }
        if gemfile.contains("minitest") {
            ts.test_framework = "Minitest".into();
        }
        if gemfile.contains("sidekiq") {
            ts.detected_patterns.push("background-jobs".into());
        }
        if gemfile.contains("acts_as_tenant") {
            ts.detected_patterns.push("multi-tenant".into());
        }
    } else if has(&["package.json"]) {
        let pkg = read("package.json");
        ts.language = "JavaScript/TypeScript".into();
        ts.framework = if pkg.contains("\"next\"") {
            "Next.js"
        } else if pkg.contains("\"react\"") {
            "React"
        } else if pkg.contains("\"vue\"") {
            "Vue.js"
        } else if pkg.contains("\"express\"") {
            "Express"
        } else if pkg.contains("\"fastify\"") {
            "Fastify"
        } else if pkg.contains("\"nest\"") {
            "NestJS"
        } else {
            ""
        }
        .into();
        if has(&["tsconfig.json"]) {
            ts.language = "TypeScript".into();
        }
        if pkg.contains("\"jest\"") {
            ts.test_framework = "Jest".into();
        } else if pkg.contains("\"vitest\"") {
            ts.test_framework = "Vitest".into();
        }
    } else if has(&["go.mod"]) {
        ts.language = "Go".into();
        let go_mod = read("go.mod");
        ts.framework = if go_mod.contains("github.com/gin-gonic/gin") {
            "Gin"
        } else if go_mod.contains("github.com/labstack/echo") {
            "Echo"
        } else if go_mod.contains("github.com/gofiber/fiber") {
            "Fiber"
        } else {
            "stdlib"
        }
        .into();
        if has(&["cmd"]) {
            ts.entry_points.push("cmd/".into());
        }
    } else if has(&["Cargo.toml"]) {
        ts.language = "Rust".into();
        let cargo = read("Cargo.toml");
        if cargo.contains("actix") {
            ts.framework = "Actix".into();
        } else if cargo.contains("axum") {
            ts.framework = "Axum".into();
        }
    } else if has(&["pyproject.toml", "requirements.txt", "setup.py"]) {
        ts.language = "Python".into();
        let req = format!("{}{}", read("requirements.txt"), read("pyproject.toml"));
        if req.contains("django") {
            ts.framework = "Django".into();
        } else if req.contains("fastapi") {
            ts.framework = "FastAPI".into();
        } else if req.contains("flask") {
            ts.framework = "Flask".into();
        }
        if req.contains("pytest") {
            ts.test_framework = "pytest".into();
        }
    } else if has(&["pom.xml", "build.gradle", "build.gradle.kts"]) {
        ts.language = "Java/Kotlin".into();
        ts.framework = "Spring Boot".into();
        if has(&["build.gradle.kts"]) {
            ts.language = "Kotlin".into();
        }
    }

    // Database: substring sweep over the usual suspects.
    let all = [
        read("Gemfile"),
        read("package.json"),
        read("docker-compose.yml"),
        read("docker-compose.yaml"),
        read(".env.example"),
        read("config/database.yml"),
    ]
    .join("");
    ts.database = if all.contains("postgresql") || all.contains("postgres") || all.contains("pg") {
        "PostgreSQL"
    } else if all.contains("mysql") {
        "MySQL"
    } else if all.contains("sqlite") {
        "SQLite"
    } else if all.contains("mongodb") || all.contains("mongoose") {
        "MongoDB"
    } else if all.contains("redis") {
        "Redis"
    } else {
        ""
    }
    .into();

    ts.ci = if has(&[".github/workflows"]) {
        "GitHub Actions"
    } else if has(&[".circleci/config.yml"]) {
        "CircleCI"
    } else if has(&[".gitlab-ci.yml"]) {
        "GitLab CI"
    } else if has(&["Jenkinsfile"]) {
        "Jenkins"
    } else {
        ""
    }
    .into();

    if has(&["config/routes.rb"]) {
        ts.architecture = if has(&["app/views"]) {
            "MVC (Monolith)".into()
        } else {
            "API + SPA".into()
        };
    }

    ts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rails_project() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Gemfile"),
            "gem 'rails'\ngem 'rspec-rails'\ngem 'sidekiq'\ngem 'pg'\n",
        )
        .unwrap();
        let ts = detect_tech_stack(dir.path());
        assert_eq!(ts.language, "Ruby");
        assert_eq!(ts.framework, "Rails");
        assert_eq!(ts.test_framework, "RSpec");
        assert_eq!(ts.database, "PostgreSQL");
        assert!(ts.detected_patterns.contains(&"background-jobs".to_string()));
    }

    #[test]
    fn nextjs_over_react() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"dependencies": {"next": "14.0.0", "react": "18.0.0", "vitest": "1.0.0"}}"#,
        )
        .unwrap();
        let ts = detect_tech_stack(dir.path());
        assert_eq!(ts.framework, "Next.js");
        assert_eq!(ts.test_framework, "Vitest");
    }

    #[test]
    fn typescript_when_tsconfig_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        std::fs::write(dir.path().join("tsconfig.json"), "{}").unwrap();
        let ts = detect_tech_stack(dir.path());
        assert_eq!(ts.language, "TypeScript");
    }

    #[test]
    fn go_gin_project() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("go.mod"),
            "module example.com/app\n\nrequire github.com/gin-gonic/gin v1.9.0\n",
        )
        .unwrap();
        let ts = detect_tech_stack(dir.path());
        assert_eq!(ts.language, "Go");
        assert_eq!(ts.framework, "Gin");
    }

    #[test]
    fn empty_dir_yields_name_only() {
        let dir = tempfile::tempdir().unwrap();
        let ts = detect_tech_stack(dir.path());
        assert!(ts.language.is_empty());
        assert!(ts.framework.is_empty());
        assert!(!ts.project_name.is_empty());
    }

    #[test]
    fn json_round_trip() {
        let ts = TechStack {
            project_name: "app".into(),
            language: "Rust".into(),
            framework: "Axum".into(),
            file_count: 10,
            chunk_count: 40,
            ..Default::default()
        };
        let parsed = TechStack::from_json(&ts.to_json());
        assert_eq!(parsed.language, "Rust");
        assert_eq!(parsed.framework, "Axum");
        assert_eq!(parsed.chunk_count, 40);
    }
}
