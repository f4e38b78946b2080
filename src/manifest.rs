//! Manifest persistence.
//!
//! The manifest lives at a fixed location under the managed root
//! (default `<root>/.manifest.json`). Loading never fails: a missing file
//! is an empty manifest, and an unreadable or malformed one is logged and
//! treated as empty, which forces a full re-index on the next sweep.
//! Saving writes a temp file next to the target, fsyncs it, and renames it
//! over the target, so readers never see a half-written manifest.

use std::io::Write;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

pub use knowledge_sync_core::manifest::{Manifest, ManifestChunk, ManifestEntry, MANIFEST_VERSION};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("manifest at {path} is not valid JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

fn io_err(path: &Path, source: std::io::Error) -> ManifestError {
    ManifestError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Strict load: `Ok(None)` when the file does not exist.
pub fn read_manifest(path: &Path) -> Result<Option<Manifest>, ManifestError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(path, e)),
    };
    let mut manifest: Manifest =
        serde_json::from_str(&content).map_err(|source| ManifestError::Json {
            path: path.display().to_string(),
            source,
        })?;
    if manifest.version != MANIFEST_VERSION {
        debug!(
            from = manifest.version,
            to = MANIFEST_VERSION,
            "re-tagging manifest version"
        );
        manifest.version = MANIFEST_VERSION;
    }
    Ok(Some(manifest))
}

/// Lenient load used by indexing: never fails.
pub fn load_manifest(path: &Path) -> Manifest {
    match read_manifest(path) {
        Ok(Some(m)) => m,
        Ok(None) => Manifest::empty(),
        Err(e) => {
            warn!(error = %e, "manifest unreadable, starting from an empty manifest");
            Manifest::empty()
        }
    }
}

/// Atomically replace the manifest at `path`.
pub fn save_manifest(path: &Path, manifest: &Manifest) -> Result<(), ManifestError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(manifest).map_err(|source| ManifestError::Json {
        path: path.display().to_string(),
        source,
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| io_err(dir, e))?;
    tmp.write_all(json.as_bytes()).map_err(|e| io_err(tmp.path(), e))?;
    tmp.write_all(b"\n").map_err(|e| io_err(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| io_err(path, e))?;
    tmp.persist(path).map_err(|e| io_err(path, e.error))?;
    Ok(())
}
