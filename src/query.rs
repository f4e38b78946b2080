//! Retrieval entry point with `[retrieval]` defaults applied.

use anyhow::{Context, Result};

use knowledge_sync_core::models::{ContextBlock, KnowledgeDocument};
use knowledge_sync_core::retrieve::retrieve;
use knowledge_sync_core::store::VectorStore;

use crate::config::Config;

/// Return up to `top_k` context blocks for `text` (config default when
/// `None`). No matches is `Ok(vec![])`; a store failure is `Err`.
pub async fn query(
    store: &dyn VectorStore,
    config: &Config,
    text: &str,
    top_k: Option<usize>,
) -> Result<Vec<ContextBlock>> {
    let mut params = config.retrieval.params();
    if let Some(k) = top_k {
        params.top_k = k;
    }
    retrieve(store, &config.classifier(), text, &params)
        .await
        .context("Retrieval failed")
}

pub fn print_blocks(blocks: &[ContextBlock]) {
    if blocks.is_empty() {
        println!("No results.");
        return;
    }
    for (i, block) in blocks.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} {}",
            i + 1,
            block.score,
            block.kind.location_label(),
            block.title
        );
        if let Some(path) = &block.path {
            match block.chunk_index {
                Some(index) => println!("    path: {} (chunk {})", path, index),
                None => println!("    path: {}", path),
            }
        }
        println!("    excerpt: \"{}\"", block.snippet.replace('\n', " ").trim());
        println!();
    }
}

pub fn print_documents(documents: &[KnowledgeDocument]) {
    if documents.is_empty() {
        println!("No documents.");
        return;
    }
    for doc in documents {
        println!("{} {}", doc.location_label, doc.title);
        if let Some(path) = &doc.path {
            println!("    path: {}", path);
        }
        let preview: String = doc.content_preview.chars().take(120).collect();
        println!("    preview: \"{}\"", preview.replace('\n', " ").trim());
    }
}
