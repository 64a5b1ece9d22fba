//! Document ingestion: folder walking, text extraction, and provenance.
//!
//! The ingestor reads every supported file under a folder, extracts its text, and tags the
//! result with the originating filename so downstream answers can cite their sources. A file
//! that cannot be read or parsed is skipped and logged; it never aborts the batch.

mod extract;
mod normalize;

pub use extract::{extract_text, is_supported};
pub use normalize::normalize_text;

use std::path::{Path, PathBuf};

use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use walkdir::WalkDir;

/// Errors raised while ingesting source documents.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The configured document folder does not exist or is not a directory.
    #[error("document folder not found: {0}")]
    FolderNotFound(PathBuf),
    /// A file could not be read from disk.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path of the unreadable file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Text extraction failed for an otherwise readable file.
    #[error("failed to extract text from {path}: {source}")]
    Extraction {
        /// Path of the file that could not be parsed.
        path: PathBuf,
        /// Underlying extraction error.
        #[source]
        source: anyhow::Error,
    },
    /// Extraction succeeded but produced no usable text.
    #[error("no extractable text in {path}")]
    EmptyText {
        /// Path of the empty document.
        path: PathBuf,
    },
}

/// Source document with provenance, immutable after ingestion.
#[derive(Debug, Clone)]
pub struct Document {
    /// Originating filename, used as the document identifier.
    pub id: String,
    /// Normalized document text.
    pub text: String,
    /// RFC3339 timestamp recorded when the document was ingested.
    pub ingested_at: String,
}

impl Document {
    /// Build a document from an identifier and already-normalized text.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            ingested_at: current_timestamp_rfc3339(),
        }
    }
}

/// A file the ingestor gave up on, with the error that caused the skip.
#[derive(Debug)]
pub struct SkippedFile {
    /// Path of the skipped file.
    pub path: PathBuf,
    /// Reason the file was skipped.
    pub error: IngestError,
}

/// Outcome of a folder ingestion batch.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Successfully ingested documents in sorted filename order.
    pub documents: Vec<Document>,
    /// Files skipped because extraction failed.
    pub skipped: Vec<SkippedFile>,
}

/// Ingest every supported file under `folder`.
///
/// Files are visited in sorted filename order. Unsupported extensions are ignored; supported
/// files that fail to parse are recorded in [`IngestReport::skipped`] and logged at `warn`.
/// Only a missing folder is fatal.
pub fn ingest_folder(folder: &Path) -> Result<IngestReport, IngestError> {
    if !folder.is_dir() {
        return Err(IngestError::FolderNotFound(folder.to_path_buf()));
    }

    let mut report = IngestReport::default();
    for entry in WalkDir::new(folder)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
    {
        let path = entry.path();
        if !is_supported(path) {
            tracing::trace!(path = %path.display(), "Skipping unsupported file type");
            continue;
        }

        match ingest_file(path) {
            Ok(document) => {
                tracing::info!(
                    document = %document.id,
                    chars = document.text.chars().count(),
                    "Ingested document"
                );
                report.documents.push(document);
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), error = %error, "Skipping document");
                report.skipped.push(SkippedFile {
                    path: path.to_path_buf(),
                    error,
                });
            }
        }
    }

    tracing::info!(
        documents = report.documents.len(),
        skipped = report.skipped.len(),
        folder = %folder.display(),
        "Folder ingestion complete"
    );
    Ok(report)
}

/// Ingest a single file, normalizing its text and attaching provenance.
pub fn ingest_file(path: &Path) -> Result<Document, IngestError> {
    let raw = extract_text(path)?;
    let text = normalize_text(&raw);
    if text.is_empty() {
        return Err(IngestError::EmptyText {
            path: path.to_path_buf(),
        });
    }

    let id = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(Document::new(id, text))
}

fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn ingest_folder_reports_missing_directory() {
        let error = ingest_folder(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(error, IngestError::FolderNotFound(_)));
    }

    #[test]
    fn ingest_folder_collects_supported_files_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("b.txt"), "second document").expect("write");
        fs::write(dir.path().join("a.md"), "first document").expect("write");
        fs::write(dir.path().join("notes.json"), "{}").expect("write");

        let report = ingest_folder(dir.path()).expect("ingest");
        let ids: Vec<_> = report.documents.iter().map(|doc| doc.id.as_str()).collect();
        assert_eq!(ids, vec!["a.md", "b.txt"]);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn ingest_folder_skips_unparseable_files_without_aborting() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("good.txt"), "usable text").expect("write");
        // Invalid header, so the PDF parser rejects it.
        fs::write(dir.path().join("broken.pdf"), b"not a pdf").expect("write");

        let report = ingest_folder(dir.path()).expect("ingest");
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].id, "good.txt");
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn ingest_file_rejects_whitespace_only_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("blank.txt");
        fs::write(&path, "   \n\t\n").expect("write");

        let error = ingest_file(&path).unwrap_err();
        assert!(matches!(error, IngestError::EmptyText { .. }));
    }

    #[test]
    fn documents_carry_provenance_and_timestamp() {
        let document = Document::new("paper.pdf", "body");
        assert_eq!(document.id, "paper.pdf");
        assert!(document.ingested_at.ends_with('Z'));
    }
}
