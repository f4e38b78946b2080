//! Chunk diff planning for incremental re-indexing.
//!
//! Given the previous manifest entry for a path (if any) and the ordered
//! chunk digests of the file as it is now, [`plan`] decides which vector
//! records to write and which to drop:
//!
//! - a chunk whose digest existed before keeps its previous id (no
//!   re-embed), even if its position moved;
//! - a chunk with a new digest gets a fresh id and is upserted;
//! - previous ids that no longer appear are deleted;
//! - reused chunks whose first position changed are relabeled
//!   (metadata-only update) so neighbor windowing stays correct.
//!
//! Identical chunk texts inside one document share one id and one record;
//! the record's `chunk_index` is the first position the text occurs at.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::hash::chunk_id;
use crate::manifest::{ManifestChunk, ManifestEntry};

/// The outcome of diffing a document's new chunk list against its
/// previous manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    /// The complete new chunk list, ordered by index. Becomes the manifest
    /// entry's `chunks`.
    pub chunks: Vec<ManifestChunk>,
    /// Positions in `chunks` that need an upsert (fresh ids, first
    /// occurrence only).
    pub to_upsert: Vec<usize>,
    /// Positions in `chunks` whose record exists but whose stored
    /// `chunk_index` is now wrong.
    pub to_relabel: Vec<usize>,
    /// Previous ids absent from the new chunk list, sorted.
    pub to_delete: Vec<String>,
    /// Number of distinct records carried over unchanged or relabeled.
    pub reused: usize,
}

impl ChunkPlan {
    /// True when the plan performs no vector-store writes.
    pub fn is_noop(&self) -> bool {
        self.to_upsert.is_empty() && self.to_relabel.is_empty() && self.to_delete.is_empty()
    }
}

/// Plan the vector-store writes that take `previous` to `digests`.
pub fn plan(path: &str, previous: Option<&ManifestEntry>, digests: &[String]) -> ChunkPlan {
    let empty: Vec<ManifestChunk> = Vec::new();
    let prev_chunks = previous.map(|e| &e.chunks).unwrap_or(&empty);

    // digest -> (id, first index) in the previous entry
    let mut prev_by_digest: HashMap<&str, (&str, usize)> = HashMap::new();
    for c in prev_chunks {
        prev_by_digest
            .entry(c.hash.as_str())
            .or_insert((c.id.as_str(), c.index));
    }

    let mut chunks = Vec::with_capacity(digests.len());
    let mut to_upsert = Vec::new();
    let mut to_relabel = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut reused = 0usize;

    for (index, digest) in digests.iter().enumerate() {
        let (id, prev_index) = match prev_by_digest.get(digest.as_str()) {
            Some(&(id, prev_index)) => (id.to_string(), Some(prev_index)),
            None => (chunk_id(path, digest), None),
        };

        if seen.insert(id.clone()) {
            match prev_index {
                Some(pi) => {
                    reused += 1;
                    if pi != index {
                        to_relabel.push(index);
                    }
                }
                None => to_upsert.push(index),
            }
        }

        chunks.push(ManifestChunk {
            index,
            hash: digest.clone(),
            id,
        });
    }

    let to_delete: Vec<String> = prev_chunks
        .iter()
        .filter(|c| !seen.contains(&c.id))
        .map(|c| c.id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    ChunkPlan {
        chunks,
        to_upsert,
        to_relabel,
        to_delete,
        reused,
    }
}
