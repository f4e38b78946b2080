//! Managed-root directory scanning.
//!
//! Walks `[knowledge].root` with `walkdir`, matches root-relative paths
//! against the include/exclude globs, and returns absolute file paths in
//! sorted order. `.git`, `target` and `node_modules` are always excluded,
//! as are the manifest and the SQLite store (and its WAL side files).
//! Entries the walker cannot read (dangling links, permission errors) are
//! logged and counted, never fatal.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use crate::config::Config;

/// Result of walking a directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Scan {
    /// Matching files, sorted.
    pub files: Vec<PathBuf>,
    /// Directory entries that could not be read.
    pub unreadable: usize,
}

pub fn scan_root(config: &Config) -> Result<Scan> {
    scan_dir(config, config.root())
}

/// Scan `root` with the filters configured for the managed root.
pub fn scan_dir(config: &Config, root: &Path) -> Result<Scan> {
    if !root.exists() {
        bail!("Knowledge root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.knowledge.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.knowledge.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let reserved = reserved_paths(config);

    let mut files = Vec::new();
    let mut unreadable = 0;

    let walker = WalkDir::new(root).follow_links(config.knowledge.follow_symlinks);
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                warn!(path, error = %e, "skipping unreadable entry");
                unreadable += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if is_reserved(path, &reserved) {
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(Scan { files, unreadable })
}

/// Files the sweep must never index: bookkeeping owned by this crate.
fn reserved_paths(config: &Config) -> Vec<PathBuf> {
    vec![config.manifest_path(), config.store_path()]
}

fn is_reserved(path: &Path, reserved: &[PathBuf]) -> bool {
    let s = path.to_string_lossy();
    reserved.iter().any(|r| {
        let r = r.to_string_lossy();
        s == r || (s.starts_with(r.as_ref()) && s[r.len()..].starts_with('-'))
    })
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
