//! Configuration loading from TOML files.
//!
//! Lookup order:
//! 1. `$MENTOR_CONFIG` environment variable
//! 2. `~/.config/mentor/config.toml`
//! 3. Built-in defaults (everything is optional)

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use mentor_agents::{MentorSettings, SandboxSettings};
use mentor_core::{ChatSettings, SentenceModel};
use mentor_store::IndexSettings;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub model: ModelConfig,
    pub retrieval: RetrievalConfig,
    pub sandbox: SandboxConfig,
    pub parser: ParserConfig,
}

/// File locations. Unset entries fall back to the platform data dir.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub knowledge_base: String,
    pub memory_log: Option<String>,
    pub index_dir: Option<String>,
}

/// Chat-completions endpoint.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    Fastembed,
    Hash,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Documents requested per query (the store returns up to k + 2).
    pub k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embedder: EmbedderKind,
    /// Sentence model for the fastembed embedder.
    pub model: SentenceModel,
    /// Where downloaded model files go. Unset uses fastembed's default.
    pub model_cache: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub python: String,
    pub timeout_secs: u64,
    pub memory_limit_mb: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Inputs longer than this skip the model.
    pub fast_path_len: usize,
}

// --- Defaults ---

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            knowledge_base: "knowledge_base/math_formulas.txt".into(),
            memory_log: None,
            index_dir: None,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        let chat = ChatSettings::default();
        Self {
            endpoint: chat.endpoint,
            model: chat.model,
            temperature: chat.temperature,
            api_key_env: "GROQ_API_KEY".into(),
            timeout_secs: chat.timeout.as_secs(),
        }
    }
}

impl Default for EmbedderKind {
    #[cfg(feature = "embeddings")]
    fn default() -> Self {
        Self::Fastembed
    }

    #[cfg(not(feature = "embeddings"))]
    fn default() -> Self {
        Self::Hash
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 3,
            chunk_size: 500,
            chunk_overlap: 50,
            embedder: EmbedderKind::default(),
            model: SentenceModel::default(),
            model_cache: None,
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            python: "python3".into(),
            timeout_secs: 10,
            memory_limit_mb: None,
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { fast_path_len: 100 }
    }
}

// --- Conversions ---

impl Config {
    pub fn memory_log_path(&self) -> PathBuf {
        self.paths
            .memory_log
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir().join("solution_history.json"))
    }

    pub fn index_dir(&self) -> PathBuf {
        self.paths
            .index_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir().join("index"))
    }

    pub fn index_settings(&self) -> IndexSettings {
        IndexSettings {
            chunk_size: self.retrieval.chunk_size,
            chunk_overlap: self.retrieval.chunk_overlap,
            ..IndexSettings::new(self.index_dir(), &self.paths.knowledge_base)
        }
    }

    /// Chat settings with the API key read from the configured variable.
    pub fn chat_settings(&self) -> ChatSettings {
        ChatSettings {
            endpoint: self.model.endpoint.clone(),
            model: self.model.model.clone(),
            temperature: self.model.temperature,
            api_key: std::env::var(&self.model.api_key_env)
                .ok()
                .filter(|k| !k.trim().is_empty()),
            timeout: Duration::from_secs(self.model.timeout_secs),
        }
    }

    pub fn sandbox_settings(&self) -> SandboxSettings {
        SandboxSettings {
            python: PathBuf::from(&self.sandbox.python),
            timeout: Duration::from_secs(self.sandbox.timeout_secs),
            memory_limit_mb: self.sandbox.memory_limit_mb,
        }
    }

    pub fn mentor_settings(&self) -> MentorSettings {
        MentorSettings {
            fast_path_len: self.parser.fast_path_len,
            retrieval_k: self.retrieval.k,
        }
    }
}

fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "mentor", "mentor")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".mentor"))
}

/// Load config from `explicit`, or from the default lookup. Returns defaults
/// if no config file exists.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(p) = explicit {
        return read_config(p);
    }

    if let Some(p) = config_path() {
        if p.exists() {
            return read_config(&p);
        }
    }

    Ok(Config::default())
}

fn read_config(path: &Path) -> Result<Config> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Resolve the config file path.
fn config_path() -> Option<PathBuf> {
    // 1. Environment variable
    if let Ok(p) = std::env::var("MENTOR_CONFIG") {
        return Some(PathBuf::from(p));
    }

    // 2. ~/.config/mentor/config.toml
    dirs_home().map(|home| home.join(".config").join("mentor").join("config.toml"))
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

/// Show the active config path (for `mentor config`).
pub fn show_config_path(explicit: Option<&Path>) -> String {
    if let Some(p) = explicit {
        return format!("{} (from --config)", p.display());
    }
    match config_path() {
        Some(p) if p.exists() => format!("{} (loaded)", p.display()),
        Some(p) => format!("{} (not found, using defaults)", p.display()),
        None => "no config path resolved (using defaults)".into(),
    }
}
