//! End-to-end retrieval through the engine: index files, then query.

use std::collections::HashSet;
use std::fs;
use std::sync::Arc;

use knowledge_sync::config::Config;
use knowledge_sync::core::embedding::HashingEmbedder;
use knowledge_sync::core::models::DocumentKind;
use knowledge_sync::core::store::memory::InMemoryVectorStore;
use knowledge_sync::KnowledgeEngine;
use tempfile::TempDir;

fn memory_engine(tmp: &TempDir) -> KnowledgeEngine {
    let mut config = Config::for_root(tmp.path());
    config.chunking.max_chars = 80;
    config.chunking.overlap_chars = 0;
    config.retrieval.top_k = 3;
    let store = Arc::new(InMemoryVectorStore::new(Arc::new(HashingEmbedder::new(128))));
    KnowledgeEngine::with_store(&config, store).unwrap()
}

fn write_corpus(tmp: &TempDir) {
    fs::write(
        tmp.path().join("volcanoes.md"),
        "Volcanoes erupt molten lava from deep magma chambers.\n\n\
         Basalt flows cool into dark volcanic rock.\n\n\
         Ash clouds can ground aircraft for days.",
    )
    .unwrap();
    fs::write(
        tmp.path().join("gardening.txt"),
        "Tomatoes need full sun and steady watering.\n\n\
         Compost improves soil structure over time.",
    )
    .unwrap();
}

#[tokio::test]
async fn empty_store_returns_no_blocks() {
    let tmp = TempDir::new().unwrap();
    let engine = memory_engine(&tmp);
    assert!(engine.query("lava", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn query_is_deterministic_and_windowed() {
    let tmp = TempDir::new().unwrap();
    write_corpus(&tmp);
    let engine = memory_engine(&tmp);
    engine.index_directory(None).await.unwrap();

    let first = engine.query("molten lava magma", None).await.unwrap();
    let second = engine.query("molten lava magma", None).await.unwrap();
    assert_eq!(first, second);
    assert!(!first.is_empty());
    assert!(first.len() <= 3);

    let top = &first[0];
    assert_eq!(top.title, "volcanoes");
    assert_eq!(top.kind, DocumentKind::File);
    // The middle chunk's window carries both neighbors.
    if top.chunk_index == Some(1) {
        assert!(top.snippet.contains("magma") && top.snippet.contains("Ash"));
    }
}

#[tokio::test]
async fn blocks_are_unique_per_chunk() {
    let tmp = TempDir::new().unwrap();
    write_corpus(&tmp);
    let engine = memory_engine(&tmp);
    engine.index_directory(None).await.unwrap();

    let blocks = engine.query("soil compost tomatoes", Some(10)).await.unwrap();
    let keys: HashSet<(Option<String>, Option<usize>)> = blocks
        .iter()
        .map(|b| (b.path.clone(), b.chunk_index))
        .collect();
    assert_eq!(keys.len(), blocks.len());
}

#[tokio::test]
async fn files_outrank_notes() {
    let tmp = TempDir::new().unwrap();
    let engine = memory_engine(&tmp);
    engine
        .add_note("Lava note", "Lava lava lava lava.")
        .await
        .unwrap();
    fs::write(tmp.path().join("rocks.md"), "Rocks and minerals form slowly.").unwrap();
    engine.index_directory(None).await.unwrap();

    let blocks = engine.query("lava", Some(5)).await.unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].kind, DocumentKind::File);
    assert_eq!(blocks[1].kind, DocumentKind::Note);
}

#[tokio::test]
async fn sqlite_store_round_trip() {
    let tmp = TempDir::new().unwrap();
    write_corpus(&tmp);
    let config = Config::for_root(tmp.path());
    let engine = KnowledgeEngine::open(&config).await.unwrap();

    let report = engine.index_directory(None).await.unwrap();
    assert_eq!(report.indexed, 2);

    let blocks = engine.query("tomatoes sun", Some(2)).await.unwrap();
    assert_eq!(blocks[0].title, "gardening");

    // A fresh engine over the same files and database sees no changes.
    drop(engine);
    let engine = KnowledgeEngine::open(&config).await.unwrap();
    let again = engine.index_directory(None).await.unwrap();
    assert_eq!(again.unchanged, 2);
    assert_eq!(again.upserted, 0);
}
