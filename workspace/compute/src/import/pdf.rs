use async_trait::async_trait;
use tracing::{debug, instrument};

use super::ImportError;

/// Source of a PDF's text layer.
#[async_trait]
pub trait PdfTextSource: Send + Sync {
    async fn extract_text(&self, bytes: &[u8]) -> Result<String, ImportError>;
}

/// Reads the text layer with `pdf-extract` on the blocking thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractSource;

#[async_trait]
impl PdfTextSource for PdfExtractSource {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn extract_text(&self, bytes: &[u8]) -> Result<String, ImportError> {
        let owned = bytes.to_vec();
        // pdf-extract panics on some malformed files; the join error catches it.
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&owned))
            .await
            .map_err(|e| ImportError::Pdf(format!("text extraction aborted: {e}")))?
            .map_err(|e| ImportError::Pdf(e.to_string()))?;

        debug!("Extracted {} characters of text", text.len());
        Ok(text)
    }
}

/// Whether the bytes start like a PDF file.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}
