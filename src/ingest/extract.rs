//! Per-format text extraction.

use std::path::Path;

use super::IngestError;

/// File extensions the ingestor knows how to extract text from.
const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md"];

/// Whether the ingestor supports the file at `path`.
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let lower = ext.to_lowercase();
            SUPPORTED_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

/// Extract raw text from a supported file.
///
/// PDFs go through `pdf-extract`; plain text and markdown are read as UTF-8. Parse failures are
/// wrapped in [`IngestError::Extraction`] so callers can skip the file and keep the batch alive.
pub fn extract_text(path: &Path) -> Result<String, IngestError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => extract_pdf(path),
        "txt" | "md" => std::fs::read_to_string(path).map_err(|source| IngestError::Read {
            path: path.to_path_buf(),
            source,
        }),
        other => Err(IngestError::Extraction {
            path: path.to_path_buf(),
            source: anyhow::anyhow!("unsupported extension: {other:?}"),
        }),
    }
}

fn extract_pdf(path: &Path) -> Result<String, IngestError> {
    let bytes = std::fs::read(path).map_err(|source| IngestError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    pdf_extract::extract_text_from_mem(&bytes).map_err(|error| IngestError::Extraction {
        path: path.to_path_buf(),
        source: anyhow::anyhow!("{error}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_supported_extensions() {
        assert!(is_supported(Path::new("paper.pdf")));
        assert!(is_supported(Path::new("notes.TXT")));
        assert!(is_supported(Path::new("readme.md")));
        assert!(!is_supported(Path::new("data.csv")));
        assert!(!is_supported(Path::new("Makefile")));
    }

    #[test]
    fn reading_missing_text_file_is_a_read_error() {
        let error = extract_text(Path::new("/no/such/file.txt")).unwrap_err();
        assert!(matches!(error, IngestError::Read { .. }));
    }

    #[test]
    fn corrupt_pdf_is_an_extraction_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("corrupt.pdf");
        std::fs::write(&path, b"%PDF-???").expect("write");

        let error = extract_text(&path).unwrap_err();
        assert!(matches!(error, IngestError::Extraction { .. }));
    }
}
