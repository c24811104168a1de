//! Global (~/.config/memvra/config.toml) and per-project
//! (.memvra/config.toml) configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{MemvraError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub default_model: String,
    pub default_embedder: String,
    pub keys: KeysConfig,
    pub ollama: OllamaConfig,
    pub context: ContextConfig,
    pub output: OutputConfig,
    pub extraction: ExtractionConfig,
    pub summarization: SummarizationConfig,
    pub auto_export: AutoExportConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    pub anthropic: String,
    pub openai: String,
    pub gemini: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub host: String,
    pub embed_model: String,
    pub completion_model: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub max_tokens: usize,
    pub chunk_max_lines: usize,
    pub similarity_threshold: f64,
    pub top_k_chunks: usize,
    pub top_k_memories: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub stream: bool,
    pub color: bool,
    pub verbose: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub enabled: bool,
    pub max_extracts: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummarizationConfig {
    pub enabled: bool,
    pub max_tokens: u32,
}

/// Controls automatic regeneration of CLAUDE.md, .cursorrules, etc.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AutoExportConfig {
    pub enabled: bool,
    pub formats: Vec<String>,
    /// How many recent sessions land in the exports.
    pub max_sessions: i64,
}

/// Per-project overrides stored in .memvra/config.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub default_model: String,
    pub project: ProjectMeta,
    pub always_include: Vec<String>,
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectMeta {
    pub name: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_model: "claude".into(),
            default_embedder: "ollama".into(),
            keys: KeysConfig::default(),
            ollama: OllamaConfig::default(),
            context: ContextConfig::default(),
            output: OutputConfig::default(),
            extraction: ExtractionConfig::default(),
            summarization: SummarizationConfig::default(),
            auto_export: AutoExportConfig::default(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".into(),
            embed_model: "nomic-embed-text".into(),
            completion_model: "llama3.2".into(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: 8000,
            chunk_max_lines: 150,
            similarity_threshold: 0.3,
            top_k_chunks: 10,
            top_k_memories: 5,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            stream: true,
            color: true,
            verbose: false,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_extracts: 3,
        }
    }
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_tokens: 256,
        }
    }
}

impl Default for AutoExportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            formats: vec!["claude".into(), "cursor".into(), "markdown".into(), "json".into()],
            max_sessions: 5,
        }
    }
}

/// `~/.config/memvra/config.toml`
pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("memvra").join("config.toml"))
}

/// `.memvra/` under a project root.
pub fn project_dir(root: &Path) -> PathBuf {
    root.join(".memvra")
}

/// `.memvra/memvra.db` under a project root.
pub fn project_db_path(root: &Path) -> PathBuf {
    project_dir(root).join("memvra.db")
}

impl GlobalConfig {
    /// Load the global config, filling defaults for missing keys and letting
    /// env API keys win over the file.
    pub fn load() -> Result<Self> {
        let mut cfg = match global_config_path() {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(&path)?;
                toml::from_str(&contents)
                    .map_err(|e| MemvraError::Config(format!("{}: {e}", path.display())))?
            }
            _ => GlobalConfig::default(),
        };
        cfg.apply_env_keys();
        Ok(cfg)
    }

    fn apply_env_keys(&mut self) {
        if let Ok(v) = std::env::var("ANTHROPIC_API_KEY") {
            if !v.is_empty() {
                self.keys.anthropic = v;
            }
        }
        if let Ok(v) = std::env::var("OPENAI_API_KEY") {
            if !v.is_empty() {
                self.keys.openai = v;
            }
        }
        if let Ok(v) = std::env::var("GEMINI_API_KEY") {
            if !v.is_empty() {
                self.keys.gemini = v;
            }
        }
    }

    /// The stored API key for a provider; empty for keyless providers.
    pub fn api_key(&self, provider: &str) -> &str {
        match provider {
            crate::adapter::PROVIDER_CLAUDE => &self.keys.anthropic,
            crate::adapter::PROVIDER_OPENAI => &self.keys.openai,
            crate::adapter::PROVIDER_GEMINI => &self.keys.gemini,
            _ => "",
        }
    }
}

impl ProjectConfig {
    /// Load `.memvra/config.toml`; a missing file is an empty config.
    pub fn load(root: &Path) -> Result<Self> {
        let path = project_dir(root).join("config.toml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path)?;
        toml::from_str(&contents)
            .map_err(|e| MemvraError::Config(format!("{}: {e}", path.display())))
    }
}

/// Effective config for a project: global with project overrides applied.
pub fn load(root: &Path) -> (GlobalConfig, ProjectConfig) {
    let mut global = GlobalConfig::load().unwrap_or_default();
    let project = ProjectConfig::load(root).unwrap_or_default();
    if !project.default_model.is_empty() {
        global.default_model = project.default_model.clone();
    }
    (global, project)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let cfg = GlobalConfig::default();
        assert_eq!(cfg.default_model, "claude");
        assert_eq!(cfg.default_embedder, "ollama");
        assert_eq!(cfg.ollama.host, "http://localhost:11434");
        assert_eq!(cfg.ollama.embed_model, "nomic-embed-text");
        assert_eq!(cfg.context.max_tokens, 8000);
        assert_eq!(cfg.context.chunk_max_lines, 150);
        assert!(cfg.auto_export.enabled);
        assert_eq!(cfg.auto_export.formats.len(), 4);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: GlobalConfig = toml::from_str(
            r#"
            default_model = "openai"

            [context]
            max_tokens = 4000
            "#,
        )
        .unwrap();
        assert_eq!(cfg.default_model, "openai");
        assert_eq!(cfg.context.max_tokens, 4000);
        // untouched sections keep their defaults
        assert_eq!(cfg.context.top_k_chunks, 10);
        assert_eq!(cfg.ollama.embed_model, "nomic-embed-text");
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = toml::from_str::<GlobalConfig>("default_model = [broken").unwrap_err();
        // parse failures surface as errors rather than silent defaults
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn project_overrides() {
        let cfg: ProjectConfig = toml::from_str(
            r#"
            default_model = "ollama"
            always_include = ["docs/arch.md"]

            [project]
            name = "payments"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.default_model, "ollama");
        assert_eq!(cfg.project.name, "payments");
        assert_eq!(cfg.always_include, vec!["docs/arch.md"]);
    }
}
