//! SQLite-backed [`VectorStore`] implementation.
//!
//! One row per chunk in the `vectors` table, embedding stored as a
//! little-endian f32 BLOB alongside the model name and dimensionality that
//! produced it. Nearest-neighbor query is brute-force cosine distance over
//! every row.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::warn;

use knowledge_sync_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob, Embedder};
use knowledge_sync_core::store::{
    MetadataFilter, QueryHit, RecordMetadata, VectorRecord, VectorStore, EMPTY_DELETE_FILTER,
};

use crate::{db, migrate};

/// SQLite implementation of the [`VectorStore`] trait.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn Embedder>) -> Self {
        Self { pool, embedder }
    }

    /// Open (creating if needed) the database at `path` and run migrations.
    pub async fn open(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let pool = db::connect_path(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool, embedder))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn metadata_from_row(row: &SqliteRow) -> RecordMetadata {
    let chunk_index: Option<i64> = row.get("chunk_index");
    RecordMetadata {
        title: row.get("title"),
        path: row.get("path"),
        chunk_index: chunk_index.and_then(|i| usize::try_from(i).ok()),
    }
}

fn index_to_sql(index: Option<usize>) -> Option<i64> {
    index.map(|i| i as i64)
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
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

        let model = self.embedder.model_name().to_string();
        let mut tx = self.pool.begin().await?;
        for (record, vector) in records.iter().zip(vectors) {
            sqlx::query(
                r#"
                INSERT INTO vectors (id, title, path, chunk_index, text, embedding, model, dims)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    path = excluded.path,
                    chunk_index = excluded.chunk_index,
                    text = excluded.text,
                    embedding = excluded.embedding,
                    model = excluded.model,
                    dims = excluded.dims
                "#,
            )
            .bind(&record.id)
            .bind(&record.metadata.title)
            .bind(&record.metadata.path)
            .bind(index_to_sql(record.metadata.chunk_index))
            .bind(&record.text)
            .bind(vec_to_blob(&vector))
            .bind(&model)
            .bind(vector.len() as i64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn update_metadata(&self, updates: &[(String, RecordMetadata)]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for (id, meta) in updates {
            sqlx::query("UPDATE vectors SET title = ?, path = ?, chunk_index = ? WHERE id = ?")
                .bind(&meta.title)
                .bind(&meta.path)
                .bind(index_to_sql(meta.chunk_index))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_ids(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query("DELETE FROM vectors WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_where(&self, filter: &MetadataFilter) -> Result<usize> {
        if filter.is_empty() {
            bail!(EMPTY_DELETE_FILTER);
        }
        let result = sqlx::query(
            "DELETE FROM vectors WHERE (? IS NULL OR title = ?) AND (? IS NULL OR path = ?)",
        )
        .bind(&filter.title)
        .bind(&filter.title)
        .bind(&filter.path)
        .bind(&filter.path)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn get(&self, filter: &MetadataFilter, limit: Option<usize>) -> Result<Vec<VectorRecord>> {
        let limit: i64 = limit.map(|n| n as i64).unwrap_or(-1);
        let rows = sqlx::query(
            r#"
            SELECT id, title, path, chunk_index, text
            FROM vectors
            WHERE (? IS NULL OR title = ?) AND (? IS NULL OR path = ?)
            ORDER BY id
            LIMIT ?
            "#,
        )
        .bind(&filter.title)
        .bind(&filter.title)
        .bind(&filter.path)
        .bind(&filter.path)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| VectorRecord {
                id: row.get("id"),
                text: row.get("text"),
                metadata: metadata_from_row(row),
            })
            .collect())
    }

    async fn query(&self, text: &str, n: usize) -> Result<Vec<QueryHit>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self
            .embedder
            .embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| anyhow!("embedder returned no vector for query"))?;

        let rows = sqlx::query("SELECT id, title, path, chunk_index, text, embedding, dims FROM vectors")
            .fetch_all(&self.pool)
            .await?;

        let mut mismatched = 0usize;
        let mut hits: Vec<QueryHit> = rows
            .iter()
            .map(|row| {
                let dims: i64 = row.get("dims");
                if dims as usize != query_vec.len() {
                    mismatched += 1;
                }
                let blob: Vec<u8> = row.get("embedding");
                QueryHit {
                    id: row.get("id"),
                    text: row.get("text"),
                    metadata: metadata_from_row(row),
                    distance: cosine_distance(&query_vec, &blob_to_vec(&blob)),
                }
            })
            .collect();

        if mismatched > 0 {
            warn!(
                rows = mismatched,
                dims = query_vec.len(),
                "vectors embedded with different dimensions; re-index to refresh them"
            );
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(n);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledge_sync_core::embedding::HashingEmbedder;
    use tempfile::TempDir;

    fn rec(id: &str, text: &str, title: &str, path: Option<&str>, idx: Option<usize>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            text: text.to_string(),
            metadata: RecordMetadata::new(title, path, idx),
        }
    }

    async fn open(tmp: &TempDir) -> SqliteVectorStore {
        SqliteVectorStore::open(&tmp.path().join("v.sqlite"), Arc::new(HashingEmbedder::new(64)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_roundtrip_and_filters() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        store
            .upsert(&[
                rec("a", "alpha river", "Doc", Some("/kb/doc.md"), Some(0)),
                rec("b", "beta mountain", "Doc", Some("/kb/doc.md"), Some(1)),
                rec("c", "loose note", "Loose", None, None),
            ])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 3);

        let doc = store.get(&MetadataFilter::by_path("/kb/doc.md"), None).await.unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc[1].metadata.chunk_index, Some(1));

        let loose = store.get(&MetadataFilter::by_title("Loose"), None).await.unwrap();
        assert_eq!(loose[0].metadata.path, None);
        assert_eq!(loose[0].metadata.chunk_index, None);

        assert_eq!(store.get(&MetadataFilter::all(), Some(2)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_query_and_update_metadata() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        store
            .upsert(&[
                rec("a", "alpha river delta", "Doc", Some("/kb/doc.md"), Some(0)),
                rec("b", "beta mountain peak", "Doc", Some("/kb/doc.md"), Some(1)),
            ])
            .await
            .unwrap();
        let hits = store.query("mountain peak", 1).await.unwrap();
        assert_eq!(hits[0].id, "b");

        store
            .update_metadata(&[("b".to_string(), RecordMetadata::new("Doc", Some("/kb/doc.md"), Some(7)))])
            .await
            .unwrap();
        let hits = store.query("mountain peak", 1).await.unwrap();
        assert_eq!(hits[0].metadata.chunk_index, Some(7));
    }

    #[tokio::test]
    async fn test_deletes() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        store
            .upsert(&[
                rec("a", "one", "T", Some("/kb/a.md"), Some(0)),
                rec("b", "two", "T", Some("/kb/b.md"), Some(0)),
                rec("c", "three", "U", None, None),
            ])
            .await
            .unwrap();
        assert!(store.delete_where(&MetadataFilter::all()).await.is_err());
        let n = store
            .delete_where(&MetadataFilter::by_title("T").with_path(Some("/kb/b.md")))
            .await
            .unwrap();
        assert_eq!(n, 1);
        store.delete_ids(&["c".to_string()]).await.unwrap();
        let left = store.get(&MetadataFilter::all(), None).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, "a");
    }

    #[tokio::test]
    async fn test_reopen_persists() {
        let tmp = TempDir::new().unwrap();
        {
            let store = open(&tmp).await;
            store.upsert(&[rec("a", "kept", "T", None, None)]).await.unwrap();
            store.close().await;
        }
        let store = open(&tmp).await;
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
