//! [`KnowledgeEngine`]: the operations a collaborator calls.
//!
//! The engine owns an absolutized [`Config`] and an injected vector store;
//! there are no process-wide handles. Build one with [`KnowledgeEngine::open`]
//! for the configured backends, or [`KnowledgeEngine::with_store`] to supply
//! your own (tests use the in-memory store).

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use knowledge_sync_core::models::{ContextBlock, KnowledgeDocument};
use knowledge_sync_core::store::VectorStore;

use crate::config::Config;
use crate::diagnostics::{self, DiagnosticsReport, DocumentDebug};
use crate::embedding::create_embedder;
use crate::indexer::{IndexOutcome, Indexer, NoteOutcome, SweepReport};
use crate::progress::{NoProgress, SweepProgressReporter};
use crate::query;
use crate::registry::{self, DeleteOutcome};
use crate::store::open_store;

pub struct KnowledgeEngine {
    indexer: Indexer,
}

impl KnowledgeEngine {
    /// Create the configured embedder and store.
    pub async fn open(config: &Config) -> Result<Self> {
        let config = config.absolutized()?;
        let embedder = create_embedder(&config.embedding)?;
        let store = open_store(&config, embedder).await?;
        Ok(Self::from_parts(config, store))
    }

    pub fn with_store(config: &Config, store: Arc<dyn VectorStore>) -> Result<Self> {
        Ok(Self::from_parts(config.absolutized()?, store))
    }

    fn from_parts(config: Config, store: Arc<dyn VectorStore>) -> Self {
        Self {
            indexer: Indexer::new(config, store),
        }
    }

    pub fn config(&self) -> &Config {
        self.indexer.config()
    }

    pub fn store(&self) -> &dyn VectorStore {
        self.indexer.store().as_ref()
    }

    pub async fn index_path(&self, path: &Path) -> Result<IndexOutcome> {
        self.indexer.index_path(path).await
    }

    /// Sweep `root`, or the managed root when `None`.
    pub async fn index_directory(&self, root: Option<&Path>) -> Result<SweepReport> {
        self.index_directory_with_progress(root, &NoProgress).await
    }

    pub async fn index_directory_with_progress(
        &self,
        root: Option<&Path>,
        progress: &dyn SweepProgressReporter,
    ) -> Result<SweepReport> {
        let root = root.unwrap_or_else(|| self.config().root());
        self.indexer.index_directory(root, progress).await
    }

    pub async fn add_note(&self, title: &str, text: &str) -> Result<NoteOutcome> {
        self.indexer.add_note(title, text).await
    }

    pub async fn query(&self, text: &str, top_k: Option<usize>) -> Result<Vec<ContextBlock>> {
        query::query(self.store(), self.config(), text, top_k).await
    }

    pub async fn list_documents(&self, limit: usize) -> Result<Vec<KnowledgeDocument>> {
        registry::list_documents(self.store(), self.config(), limit).await
    }

    /// A relative `path` is resolved against the current directory.
    pub async fn delete_document(&self, title: &str, path: Option<&str>) -> Result<DeleteOutcome> {
        let path = path.map(absolute_key).transpose()?;
        registry::delete_document(self.store(), self.config(), title, path.as_deref()).await
    }

    /// `limit_files` falls back to `[diagnostics].limit_files`.
    pub async fn run_diagnostics(&self, limit_files: Option<usize>) -> Result<DiagnosticsReport> {
        let limit = limit_files.unwrap_or(self.config().diagnostics.limit_files);
        diagnostics::run_diagnostics(self.store(), self.config(), limit).await
    }

    pub async fn debug_document(&self, path: &str) -> Result<DocumentDebug> {
        let path = absolute_key(path)?;
        diagnostics::debug_document(self.store(), self.config(), &path).await
    }
}

/// Manifest and store key for a user-supplied path.
fn absolute_key(path: &str) -> Result<String> {
    let p = Path::new(path);
    if p.is_absolute() {
        return Ok(path.to_string());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(cwd.join(p).to_string_lossy().into_owned())
}
