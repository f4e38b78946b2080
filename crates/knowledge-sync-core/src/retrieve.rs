//! Context-window retrieval with document-kind reranking.
//!
//! The retrieval algorithm operates entirely through the [`VectorStore`]
//! trait. The calling application supplies the store, a
//! [`PathClassifier`] for the managed root, and [`RetrievalParams`].
//!
//! # Algorithm
//!
//! 1. Seed query for `top_k` nearest chunks.
//! 2. Drop repeat hits on the same `(path, chunk_index)`; path-less or
//!    index-less hits are keyed by their content digest instead.
//! 3. Fetch every chunk of each distinct hit path, once per path.
//! 4. Expand each hit into its `±window` neighbors, joined by a blank line
//!    and truncated to `max_snippet_chars`. Hits without neighbor data
//!    fall back to their own text.
//!
//!    Repeated chunk texts within one document share a single record,
//!    labeled with the first position. Later positions of the repeat are
//!    gaps in the neighbor map, so a window crossing one is narrower than
//!    `2 * window + 1` chunks.
//! 5. Sort by (kind priority, distance, document id, chunk index) and keep
//!    the first `top_k`.

use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::Result;
use tracing::debug;

use crate::chunk::truncate_chars;
use crate::hash::chunk_digest;
use crate::models::{document_id, ContextBlock, PathClassifier};
use crate::store::{MetadataFilter, QueryHit, VectorStore};

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalParams {
    /// Seed hits to fetch, and blocks to return.
    pub top_k: usize,
    /// Neighbor radius around each hit.
    pub window: usize,
    /// Maximum snippet length, in characters.
    pub max_snippet_chars: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: 4,
            window: 1,
            max_snippet_chars: 1200,
        }
    }
}

#[derive(Hash, PartialEq, Eq)]
enum HitKey {
    Position(String, usize),
    Content(String),
}

fn hit_key(hit: &QueryHit) -> HitKey {
    match (&hit.metadata.path, hit.metadata.chunk_index) {
        (Some(path), Some(index)) => HitKey::Position(path.clone(), index),
        _ => HitKey::Content(chunk_digest(&hit.text)),
    }
}

/// Run a seed query and assemble ranked context blocks.
///
/// An empty store, an empty query, or a query with no seed hits returns
/// `Ok(vec![])`. Store failures are returned as `Err`.
pub async fn retrieve<S: VectorStore + ?Sized>(
    store: &S,
    classifier: &PathClassifier,
    query: &str,
    params: &RetrievalParams,
) -> Result<Vec<ContextBlock>> {
    if query.trim().is_empty() || params.top_k == 0 {
        return Ok(Vec::new());
    }

    let seeds = store.query(query, params.top_k).await?;
    if seeds.is_empty() {
        return Ok(Vec::new());
    }

    let mut seen = HashSet::new();
    let hits: Vec<QueryHit> = seeds
        .into_iter()
        .filter(|h| seen.insert(hit_key(h)))
        .collect();

    // path -> chunk_index -> text
    let mut siblings: HashMap<String, BTreeMap<usize, String>> = HashMap::new();
    for hit in &hits {
        let Some(path) = &hit.metadata.path else {
            continue;
        };
        if hit.metadata.chunk_index.is_none() || siblings.contains_key(path) {
            continue;
        }
        let records = store.get(&MetadataFilter::by_path(path.clone()), None).await?;
        let by_index: BTreeMap<usize, String> = records
            .into_iter()
            .filter_map(|r| r.metadata.chunk_index.map(|i| (i, r.text)))
            .collect();
        siblings.insert(path.clone(), by_index);
    }

    let mut blocks: Vec<ContextBlock> = hits
        .into_iter()
        .map(|hit| {
            let snippet = match (&hit.metadata.path, hit.metadata.chunk_index) {
                (Some(path), Some(index)) => match siblings.get(path) {
                    Some(chunks) if !chunks.is_empty() => {
                        window_text(chunks, index, params.window).unwrap_or_else(|| hit.text.clone())
                    }
                    _ => hit.text.clone(),
                },
                _ => hit.text.clone(),
            };
            let snippet = truncate_chars(&snippet, params.max_snippet_chars).to_string();
            let kind = classifier.classify(hit.metadata.path.as_deref());
            ContextBlock {
                document_id: document_id(&hit.metadata.title, hit.metadata.path.as_deref()),
                title: hit.metadata.title,
                path: hit.metadata.path,
                chunk_index: hit.metadata.chunk_index,
                kind,
                snippet,
                score: hit.distance,
            }
        })
        .collect();

    blocks.sort_by(|a, b| {
        a.kind
            .priority()
            .cmp(&b.kind.priority())
            .then_with(|| a.score.total_cmp(&b.score))
            .then_with(|| a.document_id.cmp(&b.document_id))
            .then_with(|| a.chunk_index.cmp(&b.chunk_index))
    });
    blocks.truncate(params.top_k);

    debug!(query, blocks = blocks.len(), "retrieval complete");
    Ok(blocks)
}

/// Join the chunks in `[index - window, index + window]` that exist.
fn window_text(chunks: &BTreeMap<usize, String>, index: usize, window: usize) -> Option<String> {
    let lo = index.saturating_sub(window);
    let hi = index.saturating_add(window);
    let parts: Vec<&str> = chunks.range(lo..=hi).map(|(_, t)| t.as_str()).collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::models::DocumentKind;
    use crate::store::memory::InMemoryVectorStore;
    use crate::store::{RecordMetadata, VectorRecord};
    use std::sync::Arc;

    #[test]
    fn window_skips_positions_held_by_repeated_text() {
        // Index 1 repeats index 0's text, so it has no record of its own.
        let chunks: BTreeMap<usize, String> =
            [(0, "same".to_string()), (2, "tail".to_string())].into_iter().collect();
        assert_eq!(window_text(&chunks, 2, 1).as_deref(), Some("tail"));
        assert_eq!(window_text(&chunks, 0, 2).as_deref(), Some("same\n\ntail"));
        assert_eq!(window_text(&chunks, 5, 1), None);
    }

    fn store() -> InMemoryVectorStore {
        InMemoryVectorStore::new(Arc::new(HashingEmbedder::new(128)))
    }

    fn rec(id: &str, text: &str, title: &str, path: Option<&str>, idx: Option<usize>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            text: text.to_string(),
            metadata: RecordMetadata::new(title, path, idx),
        }
    }

    fn classifier() -> PathClassifier {
        PathClassifier::new("/kb", "notes")
    }

    #[tokio::test]
    async fn empty_store_and_empty_query() {
        let s = store();
        let p = RetrievalParams::default();
        assert!(retrieve(&s, &classifier(), "anything", &p).await.unwrap().is_empty());
        s.upsert(&[rec("1", "text", "T", None, None)]).await.unwrap();
        assert!(retrieve(&s, &classifier(), "   ", &p).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn window_includes_neighbors() {
        let s = store();
        s.upsert(&[
            rec("a", "intro paragraph", "Doc", Some("/kb/doc.md"), Some(0)),
            rec("b", "volcano eruption lava", "Doc", Some("/kb/doc.md"), Some(1)),
            rec("c", "closing paragraph", "Doc", Some("/kb/doc.md"), Some(2)),
            rec("d", "unrelated far away", "Doc", Some("/kb/doc.md"), Some(3)),
        ])
        .await
        .unwrap();
        let p = RetrievalParams { top_k: 1, window: 1, max_snippet_chars: 1200 };
        let blocks = retrieve(&s, &classifier(), "volcano lava", &p).await.unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            blocks[0].snippet,
            "intro paragraph\n\nvolcano eruption lava\n\nclosing paragraph"
        );
        assert_eq!(blocks[0].document_id, "Doc:/kb/doc.md");
        assert_eq!(blocks[0].kind, DocumentKind::File);
    }

    #[tokio::test]
    async fn snippet_is_truncated() {
        let s = store();
        s.upsert(&[rec("a", &"lava ".repeat(100), "Doc", Some("/kb/doc.md"), Some(0))])
            .await
            .unwrap();
        let p = RetrievalParams { top_k: 1, window: 1, max_snippet_chars: 20 };
        let blocks = retrieve(&s, &classifier(), "lava", &p).await.unwrap();
        assert_eq!(blocks[0].snippet.chars().count(), 20);
    }

    #[tokio::test]
    async fn pathless_hit_falls_back_to_raw_text() {
        let s = store();
        s.upsert(&[rec("v", "legacy glacier record", "Legacy", None, None)])
            .await
            .unwrap();
        let blocks = retrieve(&s, &classifier(), "glacier", &RetrievalParams::default())
            .await
            .unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].snippet, "legacy glacier record");
        assert_eq!(blocks[0].kind, DocumentKind::Virtual);
        assert_eq!(blocks[0].document_id, "Legacy");
    }

    #[tokio::test]
    async fn duplicate_positions_collapse() {
        let s = store();
        // Two records claiming the same (path, chunk_index).
        s.upsert(&[
            rec("x1", "tundra moss", "Doc", Some("/kb/doc.md"), Some(0)),
            rec("x2", "tundra moss lichen", "Doc", Some("/kb/doc.md"), Some(0)),
        ])
        .await
        .unwrap();
        let blocks = retrieve(&s, &classifier(), "tundra moss", &RetrievalParams::default())
            .await
            .unwrap();
        assert_eq!(blocks.len(), 1);
    }

    #[tokio::test]
    async fn files_rank_before_notes() {
        let s = store();
        s.upsert(&[
            rec("n", "kubernetes deploy checklist", "Note", Some("/kb/notes/n.md"), Some(0)),
            rec("f", "kubernetes deploy checklist steps", "File", Some("/kb/f.md"), Some(0)),
            rec("o", "kubernetes deploy checklist", "Out", Some("/tmp/o.md"), Some(0)),
        ])
        .await
        .unwrap();
        let blocks = retrieve(&s, &classifier(), "kubernetes deploy checklist", &RetrievalParams::default())
            .await
            .unwrap();
        let kinds: Vec<DocumentKind> = blocks.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![DocumentKind::File, DocumentKind::Note, DocumentKind::Unknown]
        );
    }

    #[tokio::test]
    async fn repeated_queries_are_identical() {
        let s = store();
        for i in 0..6 {
            s.upsert(&[rec(
                &format!("id{}", i),
                &format!("shared words paragraph {}", i),
                "Doc",
                Some("/kb/doc.md"),
                Some(i),
            )])
            .await
            .unwrap();
        }
        let p = RetrievalParams::default();
        let a = retrieve(&s, &classifier(), "shared words", &p).await.unwrap();
        let b = retrieve(&s, &classifier(), "shared words", &p).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
    }

    #[test]
    fn window_clamps_at_edges() {
        let mut chunks = BTreeMap::new();
        chunks.insert(0, "a".to_string());
        chunks.insert(1, "b".to_string());
        assert_eq!(window_text(&chunks, 0, 1).as_deref(), Some("a\n\nb"));
        assert_eq!(window_text(&chunks, 1, 0).as_deref(), Some("b"));
        assert_eq!(window_text(&chunks, 9, 1), None);
    }
}
