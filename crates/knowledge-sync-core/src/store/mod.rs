//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the whole contract the indexer, registry,
//! retrieval engine and diagnostics need from a nearest-neighbor store:
//! records keyed by chunk id, carrying chunk text plus
//! `{title, path, chunk_index}` metadata, with an embedding the store
//! computes itself through its injected [`Embedder`](crate::embedding::Embedder).
//!
//! Every backend normalizes its rows into [`VectorRecord`] / [`QueryHit`]
//! on the way out, so callers never branch on a backend's result shape.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Per-record metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub title: String,
    /// Absent for virtual (path-less) records.
    pub path: Option<String>,
    /// Position within the document; absent for legacy records.
    pub chunk_index: Option<usize>,
}

impl RecordMetadata {
    pub fn new(title: impl Into<String>, path: Option<&str>, chunk_index: Option<usize>) -> Self {
        Self {
            title: title.into(),
            path: path.map(str::to_string),
            chunk_index,
        }
    }
}

/// One stored chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub text: String,
    pub metadata: RecordMetadata,
}

/// A nearest-neighbor result. `distance` is `1 - cosine`, lower is closer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    pub id: String,
    pub text: String,
    pub metadata: RecordMetadata,
    pub distance: f64,
}

/// Conjunctive equality filter over record metadata.
///
/// An empty filter matches everything, which [`VectorStore::get`] accepts
/// and [`VectorStore::delete_where`] rejects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    pub title: Option<String>,
    pub path: Option<String>,
}

impl MetadataFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_path(path: impl Into<String>) -> Self {
        Self {
            title: None,
            path: Some(path.into()),
        }
    }

    pub fn by_title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            path: None,
        }
    }

    pub fn with_path(mut self, path: Option<&str>) -> Self {
        self.path = path.map(str::to_string);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.path.is_none()
    }

    pub fn matches(&self, meta: &RecordMetadata) -> bool {
        if let Some(t) = &self.title {
            if &meta.title != t {
                return false;
            }
        }
        if let Some(p) = &self.path {
            if meta.path.as_deref() != Some(p.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Abstract vector store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorStore::upsert) | Embed and insert or replace records by id |
/// | [`update_metadata`](VectorStore::update_metadata) | Replace metadata without re-embedding |
/// | [`delete_ids`](VectorStore::delete_ids) | Delete records by id |
/// | [`delete_where`](VectorStore::delete_where) | Delete records matching a non-empty filter |
/// | [`get`](VectorStore::get) | Fetch records matching a filter |
/// | [`query`](VectorStore::query) | Nearest-neighbor search over query text |
/// | [`count`](VectorStore::count) | Number of stored records |
///
/// Failures (unreachable backend, malformed filter) are returned as `Err`;
/// an empty result is always `Ok`.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()>;

    /// Ids that do not exist are ignored.
    async fn update_metadata(&self, updates: &[(String, RecordMetadata)]) -> Result<()>;

    /// Ids that do not exist are ignored.
    async fn delete_ids(&self, ids: &[String]) -> Result<()>;

    /// Returns the number of records removed.
    async fn delete_where(&self, filter: &MetadataFilter) -> Result<usize>;

    /// Records ordered by id.
    async fn get(&self, filter: &MetadataFilter, limit: Option<usize>) -> Result<Vec<VectorRecord>>;

    /// Up to `n` hits ordered by ascending distance, ties by id.
    async fn query(&self, text: &str, n: usize) -> Result<Vec<QueryHit>>;

    async fn count(&self) -> Result<usize>;
}

/// Error text shared by backends rejecting an empty delete filter.
pub const EMPTY_DELETE_FILTER: &str = "refusing to delete with an empty metadata filter";
