//! Document Processor: the collaborator that actually builds PDFs.
//!
//! The bot only sees the [`DocumentProcessor`] trait. [`PdfiumProcessor`]
//! is the production implementation; tests substitute scripted fakes.
//!
//! ## Operations
//!
//! ```text
//! image bytes ─────▶ image_to_document ──▶ one-page PDF sized to the image
//! [pdf, pdf, …] ───▶ merge_documents ────▶ all pages, in input order
//! pdf bytes ───────▶ compress_document ──▶ re-saved PDF (+ CompressionReport)
//! ```

mod pdfium;
mod report;

pub use pdfium::PdfiumProcessor;
pub use report::CompressionReport;

use crate::error::ProcessError;
use async_trait::async_trait;

/// Builds derived documents from raw attachment bytes.
///
/// Implementations must be `Send + Sync`; one processor is shared by every
/// in-flight event.
#[async_trait]
pub trait DocumentProcessor: Send + Sync {
    /// Wrap an image in a single-page PDF.
    async fn image_to_document(&self, bytes: &[u8], mime_type: &str)
        -> Result<Vec<u8>, ProcessError>;

    /// Concatenate the pages of every input, in order.
    async fn merge_documents(&self, documents: &[Vec<u8>]) -> Result<Vec<u8>, ProcessError>;

    /// Produce a smaller (or at worst re-encoded) copy of a PDF.
    async fn compress_document(&self, bytes: &[u8]) -> Result<Vec<u8>, ProcessError>;
}

/// Reject input that does not start with the `%PDF` magic bytes.
pub(crate) fn check_pdf_magic(bytes: &[u8]) -> Result<(), ProcessError> {
    if bytes.is_empty() {
        return Err(ProcessError::EmptyInput);
    }
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(ProcessError::InvalidPdf {
            detail: format!("missing %PDF header (first bytes: {magic:?})"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_magic_accepted() {
        assert!(check_pdf_magic(b"%PDF-1.7\n...").is_ok());
    }

    #[test]
    fn pdf_magic_rejections() {
        assert!(matches!(check_pdf_magic(b""), Err(ProcessError::EmptyInput)));
        assert!(matches!(
            check_pdf_magic(b"\x89PNG\r\n"),
            Err(ProcessError::InvalidPdf { .. })
        ));
        assert!(matches!(
            check_pdf_magic(b"%P"),
            Err(ProcessError::InvalidPdf { .. })
        ));
    }
}
