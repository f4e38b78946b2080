//! Manifest types: the durable record of what has been indexed.
//!
//! One [`ManifestEntry`] per document path records the last-indexed file
//! digest, modification time, title, and the ordered chunk list. The
//! entry's chunk ids are exactly the ids upserted in the vector store for
//! that path once an index run completes.
//!
//! Loading and saving live in the application crate; this module only
//! defines the serialized shape:
//!
//! ```json
//! {
//!   "version": 1,
//!   "documents": {
//!     "/kb/guide.md": {
//!       "title": "guide",
//!       "file_hash": "9f86d0…",
//!       "mtime": 1718000000.5,
//!       "chunks": [{ "index": 0, "hash": "2cf2…", "id": "4f1c…" }]
//!     }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MANIFEST_VERSION: u32 = 1;

/// The whole manifest. Documents are keyed by absolute path string and
/// kept sorted so the persisted file diffs cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    #[serde(default)]
    pub documents: BTreeMap<String, ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub title: String,
    pub file_hash: String,
    /// Seconds since the Unix epoch.
    pub mtime: f64,
    /// Ordered by `index`.
    #[serde(default)]
    pub chunks: Vec<ManifestChunk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestChunk {
    pub index: usize,
    pub hash: String,
    pub id: String,
}

impl Manifest {
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            documents: BTreeMap::new(),
        }
    }

    pub fn entry(&self, path: &str) -> Option<&ManifestEntry> {
        self.documents.get(path)
    }

    pub fn set_entry(&mut self, path: &str, entry: ManifestEntry) {
        self.documents.insert(path.to_string(), entry);
    }

    pub fn remove_entry(&mut self, path: &str) -> Option<ManifestEntry> {
        self.documents.remove(path)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self::empty()
    }
}

impl ManifestEntry {
    /// Chunk digests in index order.
    pub fn chunk_hashes(&self) -> impl Iterator<Item = &str> {
        self.chunks.iter().map(|c| c.hash.as_str())
    }

    /// True when this entry already describes `file_hash` chunked into
    /// exactly `chunk_hashes`, in order.
    pub fn matches(&self, file_hash: &str, chunk_hashes: &[String]) -> bool {
        self.file_hash == file_hash
            && self.chunks.len() == chunk_hashes.len()
            && self.chunk_hashes().zip(chunk_hashes).all(|(a, b)| a == b)
    }
}
