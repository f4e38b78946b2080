//! In-memory [`VectorStore`] implementation for tests and embedding callers
//! that need no persistence.
//!
//! Records live in a `BTreeMap` behind `std::sync::RwLock`. Query is
//! brute-force cosine distance over every stored vector. Embedding happens
//! before any lock is taken, so no guard is ever held across an `.await`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::embedding::{cosine_distance, Embedder};

use super::{
    MetadataFilter, QueryHit, RecordMetadata, VectorRecord, VectorStore, EMPTY_DELETE_FILTER,
};

struct StoredRecord {
    text: String,
    metadata: RecordMetadata,
    vector: Vec<f32>,
}

/// Counts of write operations performed, by record.
#[derive(Debug, Default)]
pub struct WriteStats {
    upserts: AtomicUsize,
    deletes: AtomicUsize,
    metadata_updates: AtomicUsize,
}

impl WriteStats {
    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn metadata_updates(&self) -> usize {
        self.metadata_updates.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.upserts() + self.deletes() + self.metadata_updates()
    }
}

/// In-memory vector store.
pub struct InMemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    records: RwLock<BTreeMap<String, StoredRecord>>,
    stats: WriteStats,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            records: RwLock::new(BTreeMap::new()),
            stats: WriteStats::default(),
        }
    }

    pub fn stats(&self) -> &WriteStats {
        &self.stats
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, StoredRecord>>> {
        self.records
            .read()
            .map_err(|_| anyhow!("in-memory vector store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, StoredRecord>>> {
        self.records
            .write()
            .map_err(|_| anyhow!("in-memory vector store lock poisoned"))
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != records.len() {
            bail!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                records.len()
            );
        }

        let mut map = self.write()?;
        for (record, vector) in records.iter().zip(vectors) {
            map.insert(
                record.id.clone(),
                StoredRecord {
                    text: record.text.clone(),
                    metadata: record.metadata.clone(),
                    vector,
                },
            );
        }
        self.stats.upserts.fetch_add(records.len(), Ordering::SeqCst);
        Ok(())
    }

    async fn update_metadata(&self, updates: &[(String, RecordMetadata)]) -> Result<()> {
        let mut map = self.write()?;
        let mut applied = 0;
        for (id, meta) in updates {
            if let Some(rec) = map.get_mut(id) {
                rec.metadata = meta.clone();
                applied += 1;
            }
        }
        self.stats.metadata_updates.fetch_add(applied, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_ids(&self, ids: &[String]) -> Result<()> {
        let mut map = self.write()?;
        let removed = ids.iter().filter(|id| map.remove(*id).is_some()).count();
        self.stats.deletes.fetch_add(removed, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_where(&self, filter: &MetadataFilter) -> Result<usize> {
        if filter.is_empty() {
            bail!(EMPTY_DELETE_FILTER);
        }
        let mut map = self.write()?;
        let before = map.len();
        map.retain(|_, rec| !filter.matches(&rec.metadata));
        let removed = before - map.len();
        self.stats.deletes.fetch_add(removed, Ordering::SeqCst);
        Ok(removed)
    }

    async fn get(&self, filter: &MetadataFilter, limit: Option<usize>) -> Result<Vec<VectorRecord>> {
        let map = self.read()?;
        let iter = map
            .iter()
            .filter(|(_, rec)| filter.matches(&rec.metadata))
            .map(|(id, rec)| VectorRecord {
                id: id.clone(),
                text: rec.text.clone(),
                metadata: rec.metadata.clone(),
            });
        Ok(match limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        })
    }

    async fn query(&self, text: &str, n: usize) -> Result<Vec<QueryHit>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut vectors = self.embedder.embed(&[text.to_string()]).await?;
        let query_vec = vectors
            .pop()
            .ok_or_else(|| anyhow!("embedder returned no vector for query"))?;

        let map = self.read()?;
        let mut hits: Vec<QueryHit> = map
            .iter()
            .map(|(id, rec)| QueryHit {
                id: id.clone(),
                text: rec.text.clone(),
                metadata: rec.metadata.clone(),
                distance: cosine_distance(&query_vec, &rec.vector),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(n);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;

    fn store() -> InMemoryVectorStore {
        InMemoryVectorStore::new(Arc::new(HashingEmbedder::new(64)))
    }

    fn rec(id: &str, text: &str, title: &str, path: Option<&str>, idx: usize) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            text: text.to_string(),
            metadata: RecordMetadata::new(title, path, Some(idx)),
        }
    }

    #[tokio::test]
    async fn test_upsert_get_count() {
        let s = store();
        s.upsert(&[
            rec("b", "beta text", "Doc", Some("/kb/d.md"), 1),
            rec("a", "alpha text", "Doc", Some("/kb/d.md"), 0),
            rec("c", "gamma", "Other", None, 0),
        ])
        .await
        .unwrap();
        assert_eq!(s.count().await.unwrap(), 3);
        let got = s.get(&MetadataFilter::by_path("/kb/d.md"), None).await.unwrap();
        assert_eq!(got.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(s.get(&MetadataFilter::all(), Some(1)).await.unwrap().len(), 1);
        assert_eq!(s.stats().upserts(), 3);
    }

    #[tokio::test]
    async fn test_query_orders_by_distance() {
        let s = store();
        s.upsert(&[
            rec("1", "rust ownership and borrowing", "R", Some("/kb/r.md"), 0),
            rec("2", "sourdough bread baking", "B", Some("/kb/b.md"), 0),
        ])
        .await
        .unwrap();
        let hits = s.query("borrowing in rust", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "1");
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[tokio::test]
    async fn test_query_empty_store() {
        let s = store();
        assert!(s.query("anything", 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_where_and_ids() {
        let s = store();
        s.upsert(&[
            rec("1", "one", "T", Some("/kb/a.md"), 0),
            rec("2", "two", "T", Some("/kb/b.md"), 0),
            rec("3", "three", "U", None, 0),
        ])
        .await
        .unwrap();
        let removed = s
            .delete_where(&MetadataFilter::by_title("T").with_path(Some("/kb/a.md")))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        s.delete_ids(&["3".to_string(), "missing".to_string()]).await.unwrap();
        assert_eq!(s.count().await.unwrap(), 1);
        assert_eq!(s.stats().deletes(), 2);
    }

    #[tokio::test]
    async fn test_delete_where_rejects_empty_filter() {
        let s = store();
        assert!(s.delete_where(&MetadataFilter::all()).await.is_err());
    }

    #[tokio::test]
    async fn test_update_metadata_keeps_vector() {
        let s = store();
        s.upsert(&[rec("1", "alpha", "T", Some("/kb/a.md"), 0)]).await.unwrap();
        let before = s.query("alpha", 1).await.unwrap()[0].distance;
        s.update_metadata(&[(
            "1".to_string(),
            RecordMetadata::new("T", Some("/kb/a.md"), Some(5)),
        )])
        .await
        .unwrap();
        let hit = &s.query("alpha", 1).await.unwrap()[0];
        assert_eq!(hit.metadata.chunk_index, Some(5));
        assert_eq!(hit.distance, before);
        assert_eq!(s.stats().upserts(), 1);
        assert_eq!(s.stats().metadata_updates(), 1);
    }
}
