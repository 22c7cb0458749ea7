//! Business logic behind the finance API: statement import, receipt
//! extraction, insights, duplicate detection and statistics.
//!
//! Collaborators that reach outside the process (PDF text extraction, OCR,
//! the hosted language model) sit behind traits so every pipeline can be
//! driven by test doubles.

pub mod ai;
pub mod duplicates;
pub mod error;
pub mod import;
pub mod insights;
pub mod money;
pub mod parsing;
pub mod receipt;
pub mod records;
pub mod stats;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use ai::LanguageModel;
use import::{PdfExtractSource, PdfTextSource, StatementImporter};
use receipt::{ImagePreprocessor, OcrEngine, ReceiptExtractor, ReceiptPreprocessor};

/// Statement importer and receipt extractor wired to the production
/// collaborators, sharing one language model.
pub fn default_pipelines(
    model: Arc<dyn LanguageModel>,
    ocr: Arc<dyn OcrEngine>,
    preprocessor: ReceiptPreprocessor,
) -> (StatementImporter, ReceiptExtractor) {
    let pdf: Arc<dyn PdfTextSource> = Arc::new(PdfExtractSource);
    let preprocessor: Arc<dyn ImagePreprocessor> = Arc::new(preprocessor);

    let importer = StatementImporter::with_default_strategies(pdf.clone(), model.clone());
    let receipts = ReceiptExtractor::new(preprocessor, ocr, pdf, model);
    (importer, receipts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai::UnconfiguredModel;
    use common::ImportMethod;
    use import::ImportError;
    use receipt::{ReceiptError, TesseractCli};

    #[tokio::test]
    async fn test_default_pipelines_survive_without_model() {
        let (importer, receipts) = default_pipelines(
            Arc::new(UnconfiguredModel),
            Arc::new(TesseractCli::new("definitely-not-a-real-tesseract-binary")),
            ReceiptPreprocessor::default(),
        );

        match importer.import(b"not a pdf".to_vec()).await {
            Err(ImportError::ExtractionFailed { attempts }) => {
                assert_eq!(attempts.len(), 3);
                assert_eq!(attempts[2].method, ImportMethod::Ai);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let result = receipts.extract(testing::png_bytes(), "image/png").await;
        assert!(matches!(result, Err(ReceiptError::OcrUnavailable(_))));
    }
}
