//! Text extraction for knowledgebase files.
//!
//! Dispatches purely on file suffix (case-insensitive):
//!
//! | Suffix | Handling |
//! |--------|----------|
//! | `txt`, `md`, `markdown` | bytes decoded as UTF-8, invalid sequences replaced |
//! | `pdf` | decoded page by page, pages joined with a blank line |
//! | anything else | [`Extraction::Unsupported`] |
//!
//! Extraction never aborts a directory sweep: decode failures come back as
//! [`Extraction::ReadError`] and the indexer skips the file.

use std::path::Path;

use thiserror::Error;

/// Suffixes read verbatim as text.
pub const TEXT_SUFFIXES: &[&str] = &["txt", "md", "markdown"];
/// Suffixes decoded as PDF.
pub const PDF_SUFFIXES: &[&str] = &["pdf"];

/// Outcome of extracting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Extracted(String),
    Unsupported,
    ReadError(String),
}

impl Extraction {
    pub fn text(&self) -> Option<&str> {
        match self {
            Extraction::Extracted(t) => Some(t),
            _ => None,
        }
    }

    /// Short machine-readable tag: `extracted`, `unsupported`, `read_error`.
    pub fn kind(&self) -> &'static str {
        match self {
            Extraction::Extracted(_) => "extracted",
            Extraction::Unsupported => "unsupported",
            Extraction::ReadError(_) => "read_error",
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file suffix: {0:?}")]
    UnsupportedSuffix(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

impl From<Result<String, ExtractError>> for Extraction {
    fn from(result: Result<String, ExtractError>) -> Self {
        match result {
            Ok(text) => Extraction::Extracted(text),
            Err(ExtractError::UnsupportedSuffix(_)) => Extraction::Unsupported,
            Err(e) => Extraction::ReadError(e.to_string()),
        }
    }
}

/// Lowercased suffix of `path`, without the dot.
pub fn suffix_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub fn is_supported_suffix(suffix: &str) -> bool {
    let s = suffix.to_lowercase();
    TEXT_SUFFIXES.contains(&s.as_str()) || PDF_SUFFIXES.contains(&s.as_str())
}

/// Extract text from the file at `path`.
pub fn extract_file(path: &Path) -> Extraction {
    try_extract_file(path).into()
}

/// Extract text from raw bytes, given the file suffix.
pub fn extract_bytes(bytes: &[u8], suffix: &str) -> Extraction {
    try_extract_bytes(bytes, suffix).into()
}

pub fn try_extract_file(path: &Path) -> Result<String, ExtractError> {
    let suffix = suffix_of(path);
    if !is_supported_suffix(&suffix) {
        return Err(ExtractError::UnsupportedSuffix(suffix));
    }
    let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.display().to_string(),
        source,
    })?;
    try_extract_bytes(&bytes, &suffix)
}

pub fn try_extract_bytes(bytes: &[u8], suffix: &str) -> Result<String, ExtractError> {
    let suffix = suffix.trim_start_matches('.').to_lowercase();
    if TEXT_SUFFIXES.contains(&suffix.as_str()) {
        return Ok(String::from_utf8_lossy(bytes).into_owned());
    }
    if PDF_SUFFIXES.contains(&suffix.as_str()) {
        return extract_pdf(bytes);
    }
    Err(ExtractError::UnsupportedSuffix(suffix))
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(pages.join("\n\n"))
}
