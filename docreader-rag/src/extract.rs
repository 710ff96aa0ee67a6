//! Plain-text extraction from uploaded files.

use std::path::Path;

use tracing::debug;

use crate::error::{RagError, Result};

/// Converts a stored document into plain text.
///
/// Extraction is blocking file and CPU work; the pipeline runs it on
/// `spawn_blocking`.
pub trait TextExtractor: Send + Sync {
    /// Extract the text of the file at `path`.
    fn extract(&self, path: &Path) -> Result<String>;
}

fn extraction_error(path: &Path, message: impl Into<String>) -> RagError {
    RagError::Extraction { path: path.display().to_string(), message: message.into() }
}

/// Extracts text from PDF files with the `pdf-extract` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let text = pdf_extract::extract_text(path)
            .map_err(|e| extraction_error(path, format!("failed to read PDF: {e}")))?;
        debug!(path = %path.display(), text_len = text.len(), "extracted PDF text");
        Ok(text)
    }
}

/// Reads UTF-8 text files as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path)
            .map_err(|e| extraction_error(path, format!("failed to read file: {e}")))?;
        String::from_utf8(bytes).map_err(|_| extraction_error(path, "file is not valid UTF-8"))
    }
}

/// Picks an extractor by file extension.
///
/// `.txt` and `.md` are read as plain text; everything else, including files
/// with no extension, is treated as PDF.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionExtractor {
    pdf: PdfExtractor,
    plain: PlainTextExtractor,
}

impl ExtensionExtractor {
    /// Create a dispatcher with the default PDF and plain-text extractors.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TextExtractor for ExtensionExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "txt" | "md" => self.plain.extract(path),
            _ => self.pdf.extract(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_round_trips_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "line one\nline two").unwrap();
        assert_eq!(PlainTextExtractor.extract(&path).unwrap(), "line one\nline two");
    }

    #[test]
    fn plain_text_rejects_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        assert!(matches!(PlainTextExtractor.extract(&path), Err(RagError::Extraction { .. })));
    }

    #[test]
    fn missing_file_is_extraction_error() {
        let err = PlainTextExtractor.extract(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, RagError::Extraction { ref path, .. } if path.ends_with("here.txt")));
    }

    #[test]
    fn corrupt_pdf_is_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();
        assert!(matches!(PdfExtractor.extract(&path), Err(RagError::Extraction { .. })));
    }

    #[test]
    fn dispatches_markdown_to_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("README.MD");
        std::fs::write(&path, "# Title").unwrap();
        assert_eq!(ExtensionExtractor::new().extract(&path).unwrap(), "# Title");
    }
}
