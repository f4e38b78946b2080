//! # Knowledge Sync Core
//!
//! Shared, I/O-free logic for knowledge-sync: data models, document-kind
//! classification, sentence-aligned chunking, content hashing, manifest
//! types and chunk diff planning, the vector store and embedder traits,
//! an in-memory vector store, context-window retrieval, and document
//! listing.
//!
//! This crate contains no tokio, sqlx, or filesystem access. Everything
//! that touches disk or the network lives in the `knowledge-sync` crate.

pub mod chunk;
pub mod diff;
pub mod documents;
pub mod embedding;
pub mod hash;
pub mod manifest;
pub mod models;
pub mod retrieve;
pub mod store;
