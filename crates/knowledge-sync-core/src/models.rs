//! Core data models shared by indexing, retrieval, and the document registry.
//!
//! Vector-store record types live in [`crate::store`]; manifest types live in
//! [`crate::manifest`]. This module holds the document-level vocabulary:
//! document kinds, path classification, and the result shapes handed back to
//! callers.

use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Where a document came from, used to bias retrieval ranking and to order
/// document listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Curated file under the managed root.
    File,
    /// Short user-authored note, stored under the notes directory.
    Note,
    /// Record without a path (legacy or in-memory entries).
    Virtual,
    /// Has a path, but outside anything we manage.
    Unknown,
}

impl DocumentKind {
    /// Rerank priority; lower sorts first.
    pub fn priority(self) -> u8 {
        match self {
            DocumentKind::File => 0,
            DocumentKind::Note => 1,
            DocumentKind::Virtual => 2,
            DocumentKind::Unknown => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::File => "file",
            DocumentKind::Note => "note",
            DocumentKind::Virtual => "virtual",
            DocumentKind::Unknown => "unknown",
        }
    }

    /// Short label suitable for UI hints, e.g. `[notes]`.
    pub fn location_label(self) -> &'static str {
        match self {
            DocumentKind::File => "[knowledgebase]",
            DocumentKind::Note => "[notes]",
            DocumentKind::Virtual => "[virtual]",
            DocumentKind::Unknown => "[other]",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies record paths into [`DocumentKind`]s.
///
/// Comparison is done on a normalized form of the path (forward slashes,
/// lowercase), so `C:\KB\Notes\a.md` and `c:/kb/notes/a.md` classify the
/// same way.
///
/// | Path | Kind |
/// |------|------|
/// | none | `virtual` |
/// | under `<root>/<notes_dir>/` (or, unrooted, contains `/<notes_dir>/`) | `note` |
/// | under the managed root (or no root configured) | `file` |
/// | anything else | `unknown` |
#[derive(Debug, Clone)]
pub struct PathClassifier {
    root: Option<String>,
    notes_segment: String,
}

impl PathClassifier {
    pub fn new(root: impl AsRef<str>, notes_dir: &str) -> Self {
        let mut root = normalize(root.as_ref());
        if !root.ends_with('/') {
            root.push('/');
        }
        Self {
            root: Some(root),
            notes_segment: notes_segment(notes_dir),
        }
    }

    /// A classifier with no managed root: every path that is not a note is a file.
    pub fn unrooted(notes_dir: &str) -> Self {
        Self {
            root: None,
            notes_segment: notes_segment(notes_dir),
        }
    }

    pub fn classify(&self, path: Option<&str>) -> DocumentKind {
        let Some(path) = path else {
            return DocumentKind::Virtual;
        };
        let normalized = normalize(path);
        match &self.root {
            Some(root) => match normalized.strip_prefix(root.as_str()) {
                Some(rest) if rest.starts_with(&self.notes_segment[1..]) => DocumentKind::Note,
                Some(_) => DocumentKind::File,
                None => DocumentKind::Unknown,
            },
            None if normalized.contains(&self.notes_segment) => DocumentKind::Note,
            None => DocumentKind::File,
        }
    }
}

impl Default for PathClassifier {
    fn default() -> Self {
        Self::unrooted("notes")
    }
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/").to_lowercase()
}

fn notes_segment(notes_dir: &str) -> String {
    format!("/{}/", normalize(notes_dir.trim_matches(|c| c == '/' || c == '\\')))
}

/// Stable caller-facing document identifier: `title:path`, or just the
/// title for path-less records.
pub fn document_id(title: &str, path: Option<&str>) -> String {
    match path {
        Some(p) => format!("{}:{}", title, p),
        None => title.to_string(),
    }
}

/// Default document title for a file: its stem (`guide.md` → `guide`).
pub fn title_from_path(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// A windowed retrieval hit returned from [`crate::retrieve::retrieve`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextBlock {
    pub document_id: String,
    pub title: String,
    pub path: Option<String>,
    pub chunk_index: Option<usize>,
    pub kind: DocumentKind,
    /// The hit chunk plus its neighbors, blank-line separated and truncated.
    pub snippet: String,
    /// Seed distance from the vector store (lower is more similar).
    pub score: f64,
}

/// A logical document as listed by the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeDocument {
    pub id: String,
    pub title: String,
    pub path: Option<String>,
    pub kind: DocumentKind,
    pub location_label: String,
    pub content_preview: String,
}
