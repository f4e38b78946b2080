//! # Knowledge Sync
//!
//! Keeps a directory of documents (plain text, markdown, PDF, and short
//! authored notes) synchronized with a vector index, and serves
//! context-windowed passages for question answering.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ Managed     │──▶│ Extract + Chunk   │──▶│ Manifest diff │
//! │ root (fs)   │   │ + Hash            │   │ (JSON)        │
//! └─────────────┘   └──────────────────┘   └──────┬───────┘
//!                                                 │ upsert / relabel / delete
//!                                                 ▼
//!                    ┌──────────┐  query   ┌──────────────┐
//!                    │ Retrieve │◀────────│ Vector store  │
//!                    │ + window │          │ SQLite/memory │
//!                    └──────────┘          └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ksync init                       # write config, create store
//! ksync index                      # sweep the managed root
//! ksync note --title "Deploys" --text "Ship on Tuesdays."
//! ksync query "when do we deploy" --top-k 3
//! ksync diagnose                   # report drift
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | File bytes to text |
//! | [`scan`] | Managed-root walking |
//! | [`manifest`] | Manifest load / atomic save |
//! | [`indexer`] | Incremental indexing and notes |
//! | [`registry`] | Document listing and deletion |
//! | [`query`] | Retrieval with configured defaults |
//! | [`diagnostics`] | Read-only consistency checks |
//! | [`embedding`] | Embedding providers |
//! | [`store`] | Vector store selection |
//! | [`sqlite_store`] | SQLite vector store |
//! | [`engine`] | [`KnowledgeEngine`] facade |
//!
//! Chunking, hashing, the diff planner, the store traits and retrieval
//! live in [`knowledge_sync_core`], re-exported here as [`core`].

pub use knowledge_sync_core as core;

pub mod config;
pub mod db;
pub mod diagnostics;
pub mod embedding;
pub mod engine;
pub mod extract;
pub mod indexer;
pub mod manifest;
pub mod migrate;
pub mod progress;
pub mod query;
pub mod registry;
pub mod scan;
pub mod sqlite_store;
pub mod store;

pub use engine::KnowledgeEngine;
