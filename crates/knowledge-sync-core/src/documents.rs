//! Logical document listing over vector-store records.
//!
//! A document contributes one record per chunk; [`list_documents`] folds
//! those back into one [`KnowledgeDocument`] per `(title, path)` pair and
//! orders the result for display.

use std::collections::HashMap;

use anyhow::Result;

use crate::models::{document_id, DocumentKind, KnowledgeDocument, PathClassifier};
use crate::store::{MetadataFilter, VectorStore};

const PREVIEW_CHARS: usize = 400;

/// List documents from the first `limit` records in the store.
///
/// Ordering: file-kind first, then notes, then everything else; within a
/// rank, alphabetical by title (case-insensitive, any leading `[label]`
/// stripped), then by path.
pub async fn list_documents<S: VectorStore + ?Sized>(
    store: &S,
    classifier: &PathClassifier,
    limit: usize,
) -> Result<Vec<KnowledgeDocument>> {
    let records = store.get(&MetadataFilter::all(), Some(limit)).await?;

    // (title, path) -> (lowest chunk index seen, preview)
    let mut docs: HashMap<(String, Option<String>), (usize, String)> = HashMap::new();
    for record in records {
        let key = (record.metadata.title.clone(), record.metadata.path.clone());
        let index = record.metadata.chunk_index.unwrap_or(usize::MAX);
        let preview: String = record.text.chars().take(PREVIEW_CHARS).collect();
        docs.entry(key)
            .and_modify(|(best, p)| {
                if index < *best {
                    *best = index;
                    *p = preview.clone();
                }
            })
            .or_insert((index, preview));
    }

    let mut out: Vec<KnowledgeDocument> = docs
        .into_iter()
        .map(|((title, path), (_, preview))| {
            let kind = classifier.classify(path.as_deref());
            KnowledgeDocument {
                id: document_id(&title, path.as_deref()),
                location_label: kind.location_label().to_string(),
                title,
                path,
                kind,
                content_preview: preview,
            }
        })
        .collect();

    out.sort_by(|a, b| {
        listing_rank(a.kind)
            .cmp(&listing_rank(b.kind))
            .then_with(|| sort_title(&a.title).cmp(&sort_title(&b.title)))
            .then_with(|| a.path.cmp(&b.path))
    });
    Ok(out)
}

fn listing_rank(kind: DocumentKind) -> u8 {
    match kind {
        DocumentKind::File => 0,
        DocumentKind::Note => 1,
        _ => 2,
    }
}

/// Lowercased title with a leading `[label]` prefix removed.
fn sort_title(title: &str) -> String {
    let trimmed = title.trim_start();
    let stripped = match trimmed.strip_prefix('[').and_then(|rest| rest.split_once(']')) {
        Some((_, rest)) => rest.trim_start(),
        None => trimmed,
    };
    stripped.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::store::memory::InMemoryVectorStore;
    use crate::store::{RecordMetadata, VectorRecord};
    use std::sync::Arc;

    fn rec(id: &str, text: &str, title: &str, path: Option<&str>, idx: usize) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            text: text.to_string(),
            metadata: RecordMetadata::new(title, path, Some(idx)),
        }
    }

    #[tokio::test]
    async fn dedups_and_orders() {
        let s = InMemoryVectorStore::new(Arc::new(HashingEmbedder::new(16)));
        s.upsert(&[
            rec("1", "second chunk", "zeta", Some("/kb/zeta.md"), 1),
            rec("2", "first chunk", "zeta", Some("/kb/zeta.md"), 0),
            rec("3", "note body", "[notes] Alpha", Some("/kb/notes/alpha.md"), 0),
            rec("4", "loose", "Beta", None, 0),
            rec("5", "file body", "alpha", Some("/kb/alpha.md"), 0),
        ])
        .await
        .unwrap();

        let docs = list_documents(&s, &PathClassifier::new("/kb", "notes"), 100)
            .await
            .unwrap();
        let titles: Vec<&str> = docs.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["alpha", "zeta", "[notes] Alpha", "Beta"]);

        let zeta = &docs[1];
        assert_eq!(zeta.content_preview, "first chunk");
        assert_eq!(zeta.id, "zeta:/kb/zeta.md");
        assert_eq!(zeta.location_label, "[knowledgebase]");
        assert_eq!(docs[3].id, "Beta");
        assert_eq!(docs[3].kind, DocumentKind::Virtual);
    }

    #[tokio::test]
    async fn preview_is_capped() {
        let s = InMemoryVectorStore::new(Arc::new(HashingEmbedder::new(16)));
        s.upsert(&[rec("1", &"x".repeat(1000), "big", Some("/kb/big.md"), 0)])
            .await
            .unwrap();
        let docs = list_documents(&s, &PathClassifier::default(), 10).await.unwrap();
        assert_eq!(docs[0].content_preview.chars().count(), 400);
    }

    #[test]
    fn sort_title_strips_label() {
        assert_eq!(sort_title("[notes] Zebra"), "zebra");
        assert_eq!(sort_title("Plain"), "plain");
        assert_eq!(sort_title("[unterminated"), "[unterminated");
    }
}
