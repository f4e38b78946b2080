//! Vector store selection from `[store]` config.

use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::debug;

use knowledge_sync_core::embedding::Embedder;
use knowledge_sync_core::store::memory::InMemoryVectorStore;
use knowledge_sync_core::store::VectorStore;

use crate::config::Config;
use crate::sqlite_store::SqliteVectorStore;
use crate::{db, migrate};

/// Open the configured backend with `embedder` injected.
///
/// `memory` lives only as long as the returned handle; `sqlite` is created
/// and migrated on first use.
pub async fn open_store(config: &Config, embedder: Arc<dyn Embedder>) -> Result<Arc<dyn VectorStore>> {
    match config.store.backend.as_str() {
        "sqlite" => {
            let pool = db::connect(config).await?;
            migrate::run_migrations(&pool).await?;
            debug!(path = %config.store_path().display(), "opened sqlite vector store");
            Ok(Arc::new(SqliteVectorStore::new(pool, embedder)))
        }
        "memory" => Ok(Arc::new(InMemoryVectorStore::new(embedder))),
        other => bail!("Unknown store backend: '{}'", other),
    }
}
