//! Read-only consistency checks across disk, manifest, and vector store.
//!
//! [`run_diagnostics`] sweeps the managed root and the manifest and reports
//! drift; [`debug_document`] explains the state of a single path. Neither
//! repairs anything: an operator decides whether to re-index.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use knowledge_sync_core::models::{title_from_path, DocumentKind};
use knowledge_sync_core::store::{MetadataFilter, VectorStore};

use crate::config::Config;
use crate::extract::{extract_file, Extraction};
use crate::manifest::load_manifest;
use crate::scan;

/// Per-file vector probe size; only presence matters.
const VECTOR_PROBE_LIMIT: usize = 10;
const SNIPPET_CHARS: usize = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Ok,
    Warn,
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    NoText,
    NotInManifest,
    NoVectors,
    ManifestPathMissing,
    OrphanedVectors,
}

impl IssueStatus {
    fn is_severe(self) -> bool {
        matches!(
            self,
            IssueStatus::ManifestPathMissing | IssueStatus::NoVectors | IssueStatus::OrphanedVectors
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub status: IssueStatus,
    pub path: Option<String>,
    pub title: Option<String>,
    pub details: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticsReport {
    pub status: OverallStatus,
    pub total_files: usize,
    pub checked_files: usize,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Ok,
    OrphanedVectorsOrManifest,
    UnindexedFile,
    ManifestButNoVectors,
    VectorsWithoutManifest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentDebug {
    pub status: DocumentStatus,
    pub path: String,
    pub title: Option<String>,
    pub kind: DocumentKind,
    pub location_label: String,
    pub exists_on_disk: bool,
    pub size_bytes: Option<u64>,
    pub text_chars: Option<usize>,
    /// `extracted`, `unsupported` or `read_error`; absent when the file is missing.
    pub extraction: Option<String>,
    pub in_manifest: bool,
    pub manifest_chunks: usize,
    pub manifest_mtime: Option<f64>,
    pub vector_chunks: usize,
    pub sample_snippet: Option<String>,
    pub notes: Vec<String>,
}

/// Check up to `limit_files` files under the managed root, then every
/// manifest entry, then every path the vector store knows about.
///
/// Store failures are returned as `Err`.
pub async fn run_diagnostics(
    store: &dyn VectorStore,
    config: &Config,
    limit_files: usize,
) -> Result<DiagnosticsReport> {
    let manifest = load_manifest(&config.manifest_path());
    let files = if config.root().exists() {
        scan::scan_root(config)?.files
    } else {
        Vec::new()
    };

    let mut issues = Vec::new();
    let total_files = files.len();
    let checked = &files[..files.len().min(limit_files)];

    for path in checked {
        let key = path.to_string_lossy().into_owned();
        let entry = manifest.entry(&key);
        let mut details = Vec::new();
        let mut status = None;

        let text_chars = match extract_file(path) {
            Extraction::Extracted(text) => text.trim().chars().count(),
            Extraction::Unsupported => {
                details.push("Unsupported file type.".to_string());
                0
            }
            Extraction::ReadError(e) => {
                details.push(format!("Failed to extract text: {}", e));
                0
            }
        };
        if text_chars == 0 {
            status = Some(IssueStatus::NoText);
            details.push("File produced no extractable text.".to_string());
        }

        let vectors = store
            .get(&MetadataFilter::by_path(key.as_str()), Some(VECTOR_PROBE_LIMIT))
            .await
            .with_context(|| format!("Failed to query vectors for {}", key))?;

        if entry.is_none() {
            status = status.or(Some(IssueStatus::NotInManifest));
            details.push("No manifest entry for this file.".to_string());
        }
        if vectors.is_empty() {
            status = status.or(Some(IssueStatus::NoVectors));
            details.push("No vectors found for this file.".to_string());
        }

        if let Some(status) = status {
            issues.push(Issue {
                status,
                path: Some(key.clone()),
                title: Some(
                    entry
                        .map(|e| e.title.clone())
                        .unwrap_or_else(|| title_from_path(&key)),
                ),
                details,
            });
        }
    }

    for (key, entry) in &manifest.documents {
        if !Path::new(key).is_file() {
            issues.push(Issue {
                status: IssueStatus::ManifestPathMissing,
                path: Some(key.clone()),
                title: Some(entry.title.clone()),
                details: vec!["Manifest entry points to a file that does not exist.".to_string()],
            });
        }
    }

    let all = store
        .get(&MetadataFilter::all(), None)
        .await
        .context("Failed to list vectors")?;
    let mut by_path: BTreeMap<&str, (usize, &str)> = BTreeMap::new();
    for record in &all {
        if let Some(path) = record.metadata.path.as_deref() {
            by_path
                .entry(path)
                .or_insert((0, record.metadata.title.as_str()))
                .0 += 1;
        }
    }
    for (path, (count, title)) in by_path {
        if manifest.entry(path).is_none() && !Path::new(path).is_file() {
            issues.push(Issue {
                status: IssueStatus::OrphanedVectors,
                path: Some(path.to_string()),
                title: Some(title.to_string()),
                details: vec![format!(
                    "{} vector(s) reference a path with no file and no manifest entry.",
                    count
                )],
            });
        }
    }

    let status = if issues.is_empty() {
        OverallStatus::Ok
    } else if issues.iter().any(|i| i.status.is_severe()) {
        OverallStatus::Degraded
    } else {
        OverallStatus::Warn
    };

    Ok(DiagnosticsReport {
        status,
        total_files,
        checked_files: checked.len(),
        issues,
    })
}

/// Everything known about one path: disk, manifest, and vector store.
pub async fn debug_document(
    store: &dyn VectorStore,
    config: &Config,
    path: &str,
) -> Result<DocumentDebug> {
    let file = Path::new(path);
    let mut notes = Vec::new();

    let exists_on_disk = file.is_file();
    let mut size_bytes = None;
    let mut text_chars = None;
    let mut extraction = None;
    let mut sample_snippet = None;

    if exists_on_disk {
        match std::fs::metadata(file) {
            Ok(meta) => size_bytes = Some(meta.len()),
            Err(e) => notes.push(format!("Failed to stat file: {}", e)),
        }
        let extracted = extract_file(file);
        extraction = Some(extracted.kind().to_string());
        match &extracted {
            Extraction::Extracted(text) => {
                text_chars = Some(text.chars().count());
                if !text.is_empty() {
                    sample_snippet = Some(text.chars().take(SNIPPET_CHARS).collect());
                }
            }
            Extraction::Unsupported => notes.push("Unsupported file type.".to_string()),
            Extraction::ReadError(e) => notes.push(format!("Failed to extract text: {}", e)),
        }
    } else {
        notes.push("File does not exist on disk.".to_string());
    }

    let manifest = load_manifest(&config.manifest_path());
    let entry = manifest.entry(path);
    let in_manifest = entry.is_some();
    let manifest_chunks = entry.map(|e| e.chunks.len()).unwrap_or(0);
    let manifest_mtime = entry.map(|e| e.mtime);
    if !in_manifest {
        notes.push("No manifest entry found for this path.".to_string());
    }

    let vectors = store
        .get(&MetadataFilter::by_path(path), None)
        .await
        .with_context(|| format!("Failed to query vectors for {}", path))?;
    let vector_chunks = vectors.len();
    if vector_chunks == 0 {
        notes.push("No vectors found for this path.".to_string());
    }

    let title = entry
        .map(|e| e.title.clone())
        .or_else(|| vectors.first().map(|r| r.metadata.title.clone()));

    let status = if !exists_on_disk && (in_manifest || vector_chunks > 0) {
        notes.push("Manifest and/or vectors exist for a file that is missing on disk.".to_string());
        DocumentStatus::OrphanedVectorsOrManifest
    } else if exists_on_disk && !in_manifest && vector_chunks == 0 {
        notes.push("File has no manifest entry and no vectors. Re-index recommended.".to_string());
        DocumentStatus::UnindexedFile
    } else if exists_on_disk && in_manifest && vector_chunks == 0 {
        notes.push("File and manifest entry exist but no vectors. Re-index recommended.".to_string());
        DocumentStatus::ManifestButNoVectors
    } else if exists_on_disk && !in_manifest && vector_chunks > 0 {
        notes.push("File and vectors exist but no manifest entry. Re-index to repair.".to_string());
        DocumentStatus::VectorsWithoutManifest
    } else {
        DocumentStatus::Ok
    };

    let kind = config.classifier().classify(Some(path));
    Ok(DocumentDebug {
        status,
        path: path.to_string(),
        title,
        kind,
        location_label: kind.location_label().to_string(),
        exists_on_disk,
        size_bytes,
        text_chars,
        extraction,
        in_manifest,
        manifest_chunks,
        manifest_mtime,
        vector_chunks,
        sample_snippet,
        notes,
    })
}

pub fn print_report(report: &DiagnosticsReport) {
    println!("Knowledge diagnostics");
    println!("=====================");
    println!();
    println!("  Status:   {}", overall_label(report.status));
    println!("  Files:    {} checked / {} total", report.checked_files, report.total_files);
    println!("  Issues:   {}", report.issues.len());
    for issue in &report.issues {
        println!();
        println!(
            "  [{}] {}",
            issue_label(issue.status),
            issue.path.as_deref().unwrap_or("-")
        );
        if let Some(title) = &issue.title {
            println!("      title: {}", title);
        }
        for detail in &issue.details {
            println!("      - {}", detail);
        }
    }
}

pub fn print_document(debug: &DocumentDebug) {
    println!("{}", debug.path);
    println!("  status:          {}", document_label(debug.status));
    println!("  title:           {}", debug.title.as_deref().unwrap_or("-"));
    println!("  kind:            {} {}", debug.kind, debug.location_label);
    println!("  on disk:         {}", debug.exists_on_disk);
    if let Some(size) = debug.size_bytes {
        println!("  size:            {} bytes", size);
    }
    if let Some(chars) = debug.text_chars {
        println!("  text:            {} chars", chars);
    }
    println!(
        "  manifest:        {} ({} chunks)",
        debug.in_manifest, debug.manifest_chunks
    );
    if let Some(mtime) = debug.manifest_mtime {
        let when = chrono::DateTime::from_timestamp(mtime as i64, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_default();
        println!("  indexed mtime:   {}", when);
    }
    println!("  vectors:         {}", debug.vector_chunks);
    for note in &debug.notes {
        println!("  - {}", note);
    }
}

fn overall_label(status: OverallStatus) -> &'static str {
    match status {
        OverallStatus::Ok => "ok",
        OverallStatus::Warn => "warn",
        OverallStatus::Degraded => "degraded",
    }
}

fn issue_label(status: IssueStatus) -> &'static str {
    match status {
        IssueStatus::NoText => "no_text",
        IssueStatus::NotInManifest => "not_in_manifest",
        IssueStatus::NoVectors => "no_vectors",
        IssueStatus::ManifestPathMissing => "manifest_path_missing",
        IssueStatus::OrphanedVectors => "orphaned_vectors",
    }
}

fn document_label(status: DocumentStatus) -> &'static str {
    match status {
        DocumentStatus::Ok => "ok",
        DocumentStatus::OrphanedVectorsOrManifest => "orphaned_vectors_or_manifest",
        DocumentStatus::UnindexedFile => "unindexed_file",
        DocumentStatus::ManifestButNoVectors => "manifest_but_no_vectors",
        DocumentStatus::VectorsWithoutManifest => "vectors_without_manifest",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use knowledge_sync_core::embedding::HashingEmbedder;
    use knowledge_sync_core::store::memory::InMemoryVectorStore;
    use knowledge_sync_core::store::{RecordMetadata, VectorRecord};
    use tempfile::TempDir;

    fn memory_store() -> InMemoryVectorStore {
        InMemoryVectorStore::new(Arc::new(HashingEmbedder::new(32)))
    }

    #[tokio::test]
    async fn test_empty_root_is_ok() {
        let tmp = TempDir::new().unwrap();
        let config = Config::for_root(tmp.path());
        let report = run_diagnostics(&memory_store(), &config, 10).await.unwrap();
        assert_eq!(report.status, OverallStatus::Ok);
        assert_eq!(report.total_files, 0);
        assert!(report.issues.is_empty());
    }

    #[tokio::test]
    async fn test_unindexed_file_warns() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.md"), "Alpha text.").unwrap();
        let config = Config::for_root(tmp.path());
        let report = run_diagnostics(&memory_store(), &config, 10).await.unwrap();
        assert_eq!(report.status, OverallStatus::Warn);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].status, IssueStatus::NotInManifest);
        assert_eq!(report.issues[0].title.as_deref(), Some("a"));
        assert_eq!(report.issues[0].details.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_file_is_no_text() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("blank.txt"), "   ").unwrap();
        let config = Config::for_root(tmp.path());
        let report = run_diagnostics(&memory_store(), &config, 10).await.unwrap();
        assert_eq!(report.issues[0].status, IssueStatus::NoText);
    }

    #[tokio::test]
    async fn test_limit_files_caps_checked() {
        let tmp = TempDir::new().unwrap();
        for name in ["a.md", "b.md", "c.md"] {
            std::fs::write(tmp.path().join(name), "x.").unwrap();
        }
        let config = Config::for_root(tmp.path());
        let report = run_diagnostics(&memory_store(), &config, 2).await.unwrap();
        assert_eq!(report.total_files, 3);
        assert_eq!(report.checked_files, 2);
        assert_eq!(report.issues.len(), 2);
    }

    #[tokio::test]
    async fn test_orphaned_vectors_reported() {
        let tmp = TempDir::new().unwrap();
        let config = Config::for_root(tmp.path());
        let store = memory_store();
        let ghost = tmp.path().join("ghost.md").to_string_lossy().into_owned();
        store
            .upsert(&[VectorRecord {
                id: "g0".into(),
                text: "boo".into(),
                metadata: RecordMetadata::new("ghost", Some(&ghost), Some(0)),
            }])
            .await
            .unwrap();
        let report = run_diagnostics(&store, &config, 10).await.unwrap();
        assert_eq!(report.status, OverallStatus::Degraded);
        assert_eq!(report.issues[0].status, IssueStatus::OrphanedVectors);

        let debug = debug_document(&store, &config, &ghost).await.unwrap();
        assert_eq!(debug.status, DocumentStatus::OrphanedVectorsOrManifest);
        assert_eq!(debug.vector_chunks, 1);
        assert_eq!(debug.title.as_deref(), Some("ghost"));
        assert!(!debug.exists_on_disk);
    }

    #[tokio::test]
    async fn test_debug_unindexed_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("doc.md");
        std::fs::write(&path, "Hello there.").unwrap();
        let config = Config::for_root(tmp.path());
        let debug = debug_document(&memory_store(), &config, &path.to_string_lossy())
            .await
            .unwrap();
        assert_eq!(debug.status, DocumentStatus::UnindexedFile);
        assert_eq!(debug.kind, DocumentKind::File);
        assert_eq!(debug.size_bytes, Some(12));
        assert_eq!(debug.text_chars, Some(12));
        assert_eq!(debug.extraction.as_deref(), Some("extracted"));
        assert_eq!(debug.sample_snippet.as_deref(), Some("Hello there."));
    }

    #[test]
    fn test_statuses_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&IssueStatus::ManifestPathMissing).unwrap(),
            "\"manifest_path_missing\""
        );
        assert_eq!(
            serde_json::to_string(&DocumentStatus::VectorsWithoutManifest).unwrap(),
            "\"vectors_without_manifest\""
        );
    }
}
