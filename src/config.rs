//! TOML configuration.
//!
//! ```toml
//! [knowledge]
//! root = "./knowledgebase"
//!
//! [chunking]
//! max_chars = 800
//! overlap_chars = 120
//!
//! [retrieval]
//! top_k = 4
//!
//! [store]
//! backend = "sqlite"
//!
//! [embedding]
//! provider = "hashing"
//! ```
//!
//! Only `[knowledge].root` is required; everything else has a default.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use knowledge_sync_core::models::PathClassifier;
use knowledge_sync_core::retrieve::RetrievalParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeConfig {
    pub root: PathBuf,
    #[serde(default)]
    pub manifest_path: Option<PathBuf>,
    #[serde(default = "default_notes_dir")]
    pub notes_dir: String,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_notes_dir() -> String {
    "notes".to_string()
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.md".to_string(),
        "**/*.markdown".to_string(),
        "**/*.txt".to_string(),
        "**/*.pdf".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    800
}
fn default_overlap_chars() -> usize {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_max_snippet_chars")]
    pub max_snippet_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            window: default_window(),
            max_snippet_chars: default_max_snippet_chars(),
        }
    }
}

fn default_top_k() -> usize {
    4
}
fn default_window() -> usize {
    1
}
fn default_max_snippet_chars() -> usize {
    1200
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            top_k: self.top_k,
            window: self.window,
            max_snippet_chars: self.max_snippet_chars,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
        }
    }
}

fn default_backend() -> String {
    "sqlite".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for Ollama (default `http://localhost:11434`).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "hashing".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_network(&self) -> bool {
        matches!(self.provider.as_str(), "openai" | "ollama")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_limit_files")]
    pub limit_files: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            limit_files: default_limit_files(),
        }
    }
}

fn default_limit_files() -> usize {
    500
}

impl Config {
    /// All-defaults configuration for a managed root.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            knowledge: KnowledgeConfig {
                root: root.into(),
                manifest_path: None,
                notes_dir: default_notes_dir(),
                include_globs: default_include_globs(),
                exclude_globs: Vec::new(),
                follow_symlinks: false,
            },
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            store: StoreConfig::default(),
            embedding: EmbeddingConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
        }
    }

    /// Copy of this config with every configured path made absolute
    /// against the current directory. Manifest keys and path
    /// classification both rely on absolute paths.
    pub fn absolutized(&self) -> Result<Config> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        let abs = |p: &Path| -> PathBuf {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                cwd.join(p)
            }
        };
        let mut out = self.clone();
        out.knowledge.root = abs(&self.knowledge.root);
        out.knowledge.manifest_path = self.knowledge.manifest_path.as_deref().map(abs);
        out.store.path = self.store.path.as_deref().map(abs);
        Ok(out)
    }

    pub fn root(&self) -> &Path {
        &self.knowledge.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.knowledge
            .manifest_path
            .clone()
            .unwrap_or_else(|| self.knowledge.root.join(".manifest.json"))
    }

    pub fn notes_path(&self) -> PathBuf {
        self.knowledge.root.join(&self.knowledge.notes_dir)
    }

    pub fn store_path(&self) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(|| self.knowledge.root.join(".vectors.sqlite"))
    }

    pub fn classifier(&self) -> PathClassifier {
        PathClassifier::new(self.knowledge.root.to_string_lossy(), &self.knowledge.notes_dir)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_chars == 0 {
            bail!("chunking.max_chars must be > 0");
        }
        if self.chunking.overlap_chars >= self.chunking.max_chars {
            bail!("chunking.overlap_chars must be < chunking.max_chars");
        }

        if self.retrieval.top_k < 1 {
            bail!("retrieval.top_k must be >= 1");
        }
        if self.retrieval.max_snippet_chars == 0 {
            bail!("retrieval.max_snippet_chars must be > 0");
        }

        if self.knowledge.notes_dir.trim().is_empty() {
            bail!("knowledge.notes_dir must not be empty");
        }

        match self.store.backend.as_str() {
            "sqlite" | "memory" => {}
            other => bail!(
                "Unknown store backend: '{}'. Must be sqlite or memory.",
                other
            ),
        }

        match self.embedding.provider.as_str() {
            "hashing" => {
                if self.embedding.dims == Some(0) {
                    bail!("embedding.dims must be > 0");
                }
            }
            "openai" | "ollama" => {
                if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                    bail!(
                        "embedding.dims must be > 0 when provider is '{}'",
                        self.embedding.provider
                    );
                }
                if self.embedding.model.is_none() {
                    bail!(
                        "embedding.model must be specified when provider is '{}'",
                        self.embedding.provider
                    );
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be hashing, openai, or ollama.",
                other
            ),
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("Invalid config file: {}", path.display()))?;

    Ok(config)
}
