//! Document registry: listing and deleting logical documents.
//!
//! A logical document is every vector record sharing one `(title, path)`
//! pair. Listing lives in the core crate; this module adds what touches
//! disk: deleting the manifest entry and, for files under the managed
//! root, the file itself.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use knowledge_sync_core::documents;
use knowledge_sync_core::models::KnowledgeDocument;
use knowledge_sync_core::store::{MetadataFilter, VectorStore};

use crate::config::Config;
use crate::manifest::{load_manifest, save_manifest};

/// What [`delete_document`] removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub vectors_deleted: usize,
    pub manifest_entry_removed: bool,
    pub file_removed: bool,
}

/// List documents from the first `limit` vector records.
pub async fn list_documents(
    store: &dyn VectorStore,
    config: &Config,
    limit: usize,
) -> Result<Vec<KnowledgeDocument>> {
    documents::list_documents(store, &config.classifier(), limit).await
}

/// Delete every record matching `title` (and `path`, if given).
///
/// Manifest entries owned by `title` are dropped for every path that lost
/// records (or for `path` itself), so the next sweep re-indexes them. With
/// a path, the file is also removed from disk when it lives under the
/// managed root and something was actually deleted. A failed file removal
/// is logged, not returned. Without a path no file is touched.
pub async fn delete_document(
    store: &dyn VectorStore,
    config: &Config,
    title: &str,
    path: Option<&str>,
) -> Result<DeleteOutcome> {
    let filter = MetadataFilter::by_title(title).with_path(path);

    let mut paths: BTreeSet<String> = store
        .get(&filter, None)
        .await
        .with_context(|| format!("Failed to look up vectors for '{}'", title))?
        .into_iter()
        .filter_map(|r| r.metadata.path)
        .collect();
    if let Some(path) = path {
        paths.insert(path.to_string());
    }

    let vectors_deleted = store
        .delete_where(&filter)
        .await
        .with_context(|| format!("Failed to delete vectors for '{}'", title))?;

    let mut outcome = DeleteOutcome {
        vectors_deleted,
        ..DeleteOutcome::default()
    };

    if !paths.is_empty() {
        let manifest_path = config.manifest_path();
        let mut manifest = load_manifest(&manifest_path);
        for p in &paths {
            let owned_by_title = manifest.entry(p).map(|e| e.title == title).unwrap_or(false);
            if owned_by_title {
                manifest.remove_entry(p);
                outcome.manifest_entry_removed = true;
            }
        }
        if outcome.manifest_entry_removed {
            save_manifest(&manifest_path, &manifest)
                .with_context(|| format!("Failed to save manifest after deleting '{}'", title))?;
        }
    }

    if let Some(path) = path {
        if outcome.vectors_deleted > 0 || outcome.manifest_entry_removed {
            outcome.file_removed = remove_managed_file(config.root(), Path::new(path));
        }
    }

    info!(
        title,
        path = path.unwrap_or(""),
        vectors = outcome.vectors_deleted,
        file_removed = outcome.file_removed,
        "deleted document"
    );
    Ok(outcome)
}

/// Remove `path` if it is an existing file under `root`. Both sides are
/// canonicalized, so `..` segments and symlinks cannot escape the root.
fn remove_managed_file(root: &Path, path: &Path) -> bool {
    let (Ok(root), Ok(file)) = (root.canonicalize(), path.canonicalize()) else {
        return false;
    };
    if !file.starts_with(&root) || !file.is_file() {
        return false;
    }
    match std::fs::remove_file(&file) {
        Ok(()) => true,
        Err(e) => {
            warn!(path = %file.display(), error = %e, "failed to remove file");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_remove_only_under_root() {
        let root = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let inside_file = root.path().join("a.md");
        let outside_file = outside.path().join("b.md");
        std::fs::write(&inside_file, "a").unwrap();
        std::fs::write(&outside_file, "b").unwrap();

        assert!(!remove_managed_file(root.path(), &outside_file));
        assert!(outside_file.exists());

        let sneaky = root.path().join("..").join(
            outside
                .path()
                .strip_prefix(root.path().parent().unwrap())
                .unwrap_or(outside.path()),
        );
        assert!(!remove_managed_file(root.path(), &sneaky.join("b.md")));
        assert!(outside_file.exists());

        assert!(remove_managed_file(root.path(), &inside_file));
        assert!(!inside_file.exists());
    }

    #[test]
    fn test_missing_file_is_not_removed() {
        let root = TempDir::new().unwrap();
        assert!(!remove_managed_file(root.path(), &root.path().join("ghost.md")));
    }
}
