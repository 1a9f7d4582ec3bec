//! PDF text extraction.
//!
//! Uploads are staged in a named temporary file with a `.pdf` suffix and parsed page by page
//! with `pdf-extract`. The temporary file is unlinked when its handle drops, which also happens
//! while unwinding from a parser panic.

use crate::processing::types::{Page, ProcessingError};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Whether `filename` carries a `.pdf` extension (case-insensitive).
pub fn is_pdf_filename(filename: &str) -> bool {
    Path::new(filename.trim())
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"))
}

/// Reject uploads whose filename is not a PDF.
pub fn ensure_pdf_filename(filename: &str) -> Result<(), ProcessingError> {
    if is_pdf_filename(filename) {
        Ok(())
    } else {
        Err(ProcessingError::InvalidUpload(
            "Only PDF files are supported.".to_string(),
        ))
    }
}

/// Extract pages on a blocking worker, staging the upload in the system temp directory.
pub async fn extract_pages(bytes: Vec<u8>) -> Result<Vec<Page>, ProcessingError> {
    extract_pages_in(std::env::temp_dir(), bytes).await
}

/// Extract pages on a blocking worker, staging the upload in `staging_dir`.
///
/// A panic inside the PDF parser surfaces as [`ProcessingError::Extraction`].
pub async fn extract_pages_in(
    staging_dir: PathBuf,
    bytes: Vec<u8>,
) -> Result<Vec<Page>, ProcessingError> {
    tokio::task::spawn_blocking(move || extract_pages_blocking(&staging_dir, &bytes))
        .await
        .map_err(|error| {
            ProcessingError::Extraction(if error.is_panic() {
                "PDF parser panicked".to_string()
            } else {
                format!("extraction task failed: {error}")
            })
        })?
}

fn extract_pages_blocking(staging_dir: &Path, bytes: &[u8]) -> Result<Vec<Page>, ProcessingError> {
    let mut staged = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(".pdf")
        .tempfile_in(staging_dir)?;
    staged.write_all(bytes)?;
    staged.flush()?;
    tracing::debug!(path = %staged.path().display(), bytes = bytes.len(), "Staged upload");

    let raw_pages = pdf_extract::extract_text_by_pages(staged.path())
        .map_err(|error| ProcessingError::Extraction(error.to_string()))?;

    Ok(raw_pages
        .into_iter()
        .enumerate()
        .map(|(index, text)| Page {
            number: u32::try_from(index + 1).unwrap_or(u32::MAX),
            text: normalize_whitespace(&text),
        })
        .collect())
}

/// Collapse runs of spaces and tabs, keep at most one blank line between paragraphs, and trim.
pub(crate) fn normalize_whitespace(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut pending_space = false;
    let mut newlines = 0usize;

    for ch in text.chars() {
        match ch {
            '\r' => {}
            '\n' => {
                newlines += 1;
                pending_space = false;
            }
            c if c.is_whitespace() => pending_space = true,
            c => {
                if !normalized.is_empty() {
                    if newlines > 0 {
                        normalized.push_str(if newlines >= 2 { "\n\n" } else { "\n" });
                    } else if pending_space {
                        normalized.push(' ');
                    }
                }
                newlines = 0;
                pending_space = false;
                normalized.push(c);
            }
        }
    }

    normalized
}
