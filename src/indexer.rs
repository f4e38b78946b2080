//! Incremental indexer.
//!
//! Keeps the vector store in step with the files under the managed root,
//! writing only what changed:
//!
//! ```text
//! file bytes ─▶ extract ─▶ chunk ─▶ digests ─▶ manifest diff ─▶ store writes
//! ```
//!
//! For each path:
//!
//! 1. Extract text; unsupported, unreadable, or empty files are skipped.
//! 2. Chunk the text and compute the file digest and per-chunk digests.
//! 3. If the manifest entry already records the same file digest, chunk
//!    digest sequence and title, stop: zero store writes.
//! 4. Plan the diff ([`knowledge_sync_core::diff::plan`]): reuse ids for
//!    known digests, mint ids for new ones.
//! 5. Upsert fresh chunks, relabel reused chunks whose position or title
//!    changed, delete obsolete ids, then persist the manifest.
//!
//! A crash between step 5's store writes and the manifest save leaves the
//! store ahead of the manifest; re-running converges because chunk ids are
//! derived from path and content.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use knowledge_sync_core::chunk::chunk_text;
use knowledge_sync_core::diff;
use knowledge_sync_core::hash::{chunk_digest, file_digest};
use knowledge_sync_core::models::title_from_path;
use knowledge_sync_core::store::{RecordMetadata, VectorRecord, VectorStore};

use crate::config::Config;
use crate::extract::{extract_bytes, is_supported_suffix, suffix_of, Extraction};
use crate::manifest::{load_manifest, save_manifest, Manifest, ManifestEntry};
use crate::progress::{SweepProgressEvent, SweepProgressReporter};
use crate::scan;

/// Why a file produced no index writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    NotAFile,
    Unsupported,
    ReadError(String),
    NoText,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NotAFile => f.write_str("not a regular file"),
            SkipReason::Unsupported => f.write_str("unsupported file type"),
            SkipReason::ReadError(e) => write!(f, "read error: {}", e),
            SkipReason::NoText => f.write_str("no text extracted"),
        }
    }
}

/// Vector-store writes made for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub chunks: usize,
    pub upserted: usize,
    pub deleted: usize,
    pub reused: usize,
    pub relabeled: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndexOutcome {
    Skipped { reason: SkipReason },
    Unchanged,
    Indexed { stats: IndexStats },
}

impl IndexOutcome {
    pub fn is_indexed(&self) -> bool {
        matches!(self, IndexOutcome::Indexed { .. })
    }
}

/// Totals for a directory sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub indexed: usize,
    pub unchanged: usize,
    /// Unsupported, empty, or vanished files, and unreadable directory entries.
    pub skipped: usize,
    /// Files whose bytes could not be read or decoded.
    pub failed: usize,
    pub upserted: usize,
    pub deleted: usize,
}

/// A note written by [`Indexer::add_note`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteOutcome {
    pub path: PathBuf,
    pub outcome: IndexOutcome,
}

pub struct Indexer {
    config: Config,
    store: Arc<dyn VectorStore>,
}

impl Indexer {
    /// `config` should already be [absolutized](Config::absolutized).
    pub fn new(config: Config, store: Arc<dyn VectorStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Index or re-index exactly one file, persisting the manifest if
    /// anything changed.
    pub async fn index_path(&self, path: &Path) -> Result<IndexOutcome> {
        self.index_path_titled(path, None).await
    }

    /// Like [`index_path`](Self::index_path) with an explicit title.
    pub async fn index_path_titled(&self, path: &Path, title: Option<&str>) -> Result<IndexOutcome> {
        let manifest_path = self.config.manifest_path();
        let mut manifest = load_manifest(&manifest_path);
        let path = self.absolute(path);
        let outcome = self.index_into(&mut manifest, &path, title).await?;
        if outcome.is_indexed() {
            save_manifest(&manifest_path, &manifest)
                .with_context(|| format!("Failed to save manifest after indexing {}", path.display()))?;
        }
        Ok(outcome)
    }

    /// Walk `root` and index every matching file.
    ///
    /// The manifest is loaded once and saved after each changed file, so an
    /// interrupted sweep keeps the work already done. A vector-store error
    /// aborts the sweep.
    pub async fn index_directory(
        &self,
        root: &Path,
        progress: &dyn SweepProgressReporter,
    ) -> Result<SweepReport> {
        let root = self.absolute(root);
        progress.report(SweepProgressEvent::Discovering {
            root: root.display().to_string(),
        });
        let scan::Scan { files, unreadable } = scan::scan_dir(&self.config, &root)?;
        let total = files.len() as u64;

        let manifest_path = self.config.manifest_path();
        let mut manifest = load_manifest(&manifest_path);
        let mut report = SweepReport {
            scanned: files.len() + unreadable,
            skipped: unreadable,
            ..SweepReport::default()
        };

        for (i, file) in files.iter().enumerate() {
            let outcome = self
                .index_into(&mut manifest, file, None)
                .await
                .with_context(|| format!("Failed to index {}", file.display()))?;

            match &outcome {
                IndexOutcome::Indexed { stats } => {
                    save_manifest(&manifest_path, &manifest).with_context(|| {
                        format!("Failed to save manifest after indexing {}", file.display())
                    })?;
                    report.indexed += 1;
                    report.upserted += stats.upserted;
                    report.deleted += stats.deleted;
                }
                IndexOutcome::Unchanged => report.unchanged += 1,
                IndexOutcome::Skipped {
                    reason: SkipReason::ReadError(_),
                } => report.failed += 1,
                IndexOutcome::Skipped { .. } => report.skipped += 1,
            }

            progress.report(SweepProgressEvent::Indexing {
                path: file.display().to_string(),
                n: i as u64 + 1,
                total,
            });
        }

        info!(
            root = %root.display(),
            scanned = report.scanned,
            indexed = report.indexed,
            unchanged = report.unchanged,
            skipped = report.skipped,
            failed = report.failed,
            "sweep complete"
        );
        Ok(report)
    }

    /// Write `text` as a note under the notes directory and index it under
    /// `title`.
    pub async fn add_note(&self, title: &str, text: &str) -> Result<NoteOutcome> {
        let dir = self.config.notes_path();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create notes directory: {}", dir.display()))?;
        let path = dir.join(format!("{}.md", slugify(title)));
        std::fs::write(&path, text)
            .with_context(|| format!("Failed to write note: {}", path.display()))?;
        let outcome = self.index_path_titled(&path, Some(title)).await?;
        Ok(NoteOutcome { path, outcome })
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    }

    async fn index_into(
        &self,
        manifest: &mut Manifest,
        path: &Path,
        title: Option<&str>,
    ) -> Result<IndexOutcome> {
        let key = path.to_string_lossy().into_owned();

        let (bytes_digest, text) = match read_text(path) {
            Ok(read) => read,
            Err(reason) => {
                warn!(path = %key, %reason, "skipping file");
                return Ok(IndexOutcome::Skipped { reason });
            }
        };

        let chunking = &self.config.chunking;
        let chunks = chunk_text(&text, chunking.max_chars, chunking.overlap_chars);
        if chunks.is_empty() {
            warn!(path = %key, "skipping file: no text extracted");
            return Ok(IndexOutcome::Skipped {
                reason: SkipReason::NoText,
            });
        }
        let digests: Vec<String> = chunks.iter().map(|c| chunk_digest(c)).collect();

        let previous = manifest.entry(&key);
        let title = title
            .map(str::to_string)
            .or_else(|| previous.map(|e| e.title.clone()))
            .unwrap_or_else(|| title_from_path(&key));

        if let Some(prev) = previous {
            if prev.title == title && prev.matches(&bytes_digest, &digests) {
                debug!(path = %key, "unchanged");
                return Ok(IndexOutcome::Unchanged);
            }
        }

        let title_changed = previous.map(|p| p.title != title).unwrap_or(false);
        let plan = diff::plan(&key, previous, &digests);
        debug!(
            path = %key,
            chunks = plan.chunks.len(),
            upsert = plan.to_upsert.len(),
            relabel = plan.to_relabel.len(),
            delete = plan.to_delete.len(),
            reused = plan.reused,
            "chunk plan"
        );

        let metadata_for = |index: usize| RecordMetadata::new(title.clone(), Some(key.as_str()), Some(index));

        let upserts: Vec<VectorRecord> = plan
            .to_upsert
            .iter()
            .map(|&i| VectorRecord {
                id: plan.chunks[i].id.clone(),
                text: chunks[i].clone(),
                metadata: metadata_for(i),
            })
            .collect();

        let relabel_positions: BTreeSet<usize> = if title_changed {
            first_positions(&plan)
                .into_iter()
                .filter(|i| !plan.to_upsert.contains(i))
                .collect()
        } else {
            plan.to_relabel.iter().copied().collect()
        };
        let relabels: Vec<(String, RecordMetadata)> = relabel_positions
            .iter()
            .map(|&i| (plan.chunks[i].id.clone(), metadata_for(i)))
            .collect();

        self.store.upsert(&upserts).await?;
        self.store.update_metadata(&relabels).await?;
        self.store.delete_ids(&plan.to_delete).await?;

        let stats = IndexStats {
            chunks: plan.chunks.len(),
            upserted: upserts.len(),
            deleted: plan.to_delete.len(),
            reused: plan.reused,
            relabeled: relabels.len(),
        };

        manifest.set_entry(
            &key,
            ManifestEntry {
                title,
                file_hash: bytes_digest,
                mtime: mtime_secs(path),
                chunks: plan.chunks,
            },
        );

        info!(
            path = %key,
            chunks = stats.chunks,
            upserted = stats.upserted,
            deleted = stats.deleted,
            relabeled = stats.relabeled,
            "indexed"
        );
        Ok(IndexOutcome::Indexed { stats })
    }
}

/// Read and extract a file: `(file digest, text)` or why it was skipped.
fn read_text(path: &Path) -> std::result::Result<(String, String), SkipReason> {
    if !path.is_file() {
        return Err(SkipReason::NotAFile);
    }
    let suffix = suffix_of(path);
    if !is_supported_suffix(&suffix) {
        return Err(SkipReason::Unsupported);
    }
    let bytes = std::fs::read(path).map_err(|e| SkipReason::ReadError(e.to_string()))?;
    match extract_bytes(&bytes, &suffix) {
        Extraction::Extracted(text) if text.trim().is_empty() => Err(SkipReason::NoText),
        Extraction::Extracted(text) => Ok((file_digest(&bytes), text)),
        Extraction::Unsupported => Err(SkipReason::Unsupported),
        Extraction::ReadError(e) => Err(SkipReason::ReadError(e)),
    }
}

/// Positions that own a record (first occurrence of each id).
fn first_positions(plan: &diff::ChunkPlan) -> Vec<usize> {
    let mut seen = std::collections::HashSet::new();
    plan.chunks
        .iter()
        .filter(|c| seen.insert(c.id.as_str()))
        .map(|c| c.index)
        .collect()
}

fn mtime_secs(path: &Path) -> f64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Deterministic file stem for a note title: lowercase ASCII
/// alphanumerics separated by single dashes, at most 80 characters.
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug: String = slug.trim_end_matches('-').chars().take(80).collect();
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "note".to_string()
    } else {
        slug.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Deploy Checklist"), "deploy-checklist");
        assert_eq!(slugify("  What's new?! v2.0 "), "what-s-new-v2-0");
        assert_eq!(slugify("***"), "note");
        assert_eq!(slugify("Ünïcode"), "n-code");
        assert_eq!(slugify(&"a".repeat(200)).len(), 80);
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::Unsupported.to_string(), "unsupported file type");
        assert_eq!(
            SkipReason::ReadError("boom".into()).to_string(),
            "read error: boom"
        );
    }

    #[test]
    fn test_read_text_skips() {
        let tmp = tempfile::TempDir::new().unwrap();
        let png = tmp.path().join("x.png");
        std::fs::write(&png, "x").unwrap();
        assert_eq!(read_text(&png), Err(SkipReason::Unsupported));
        let empty = tmp.path().join("e.md");
        std::fs::write(&empty, "  \n ").unwrap();
        assert_eq!(read_text(&empty), Err(SkipReason::NoText));
        assert_eq!(read_text(tmp.path()), Err(SkipReason::NotAFile));
        let ok = tmp.path().join("ok.txt");
        std::fs::write(&ok, "hello").unwrap();
        let (digest, text) = read_text(&ok).unwrap();
        assert_eq!(text, "hello");
        assert_eq!(digest, file_digest(b"hello"));
    }
}
