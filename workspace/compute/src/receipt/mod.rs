//! Receipt extraction: image clean-up, OCR, then field structuring.
//!
//! The stages run strictly in sequence. Structuring asks the language model
//! first and falls back to the pattern rules in [`fields`] when the model is
//! unavailable or does not find a total.

pub mod fields;
pub mod ocr;
pub mod preprocess;

use common::{ReceiptCandidate, ReceiptExtraction, ReceiptMethod};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::ai::{LanguageModel, StructuringTask};
use crate::import::{ImportError, PdfTextSource, pdf::looks_like_pdf};

pub use ocr::{OcrEngine, OcrOutput, TesseractCli};
pub use preprocess::{ImagePreprocessor, ReceiptPreprocessor};

/// Weight kept by a model-structured result regardless of OCR confidence.
const AI_FIELD_WEIGHT: f64 = 0.95;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReceiptError {
    #[error("Could not decode the image: {0}")]
    InvalidImage(String),

    #[error("No text could be read from the receipt")]
    NoText,

    #[error("OCR engine is unavailable: {0}")]
    OcrUnavailable(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("Could not read the PDF: {0}")]
    Pdf(String),
}

impl From<ImportError> for ReceiptError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Pdf(message) => ReceiptError::Pdf(message),
            other => ReceiptError::Pdf(other.to_string()),
        }
    }
}

fn has_text(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}

pub struct ReceiptExtractor {
    preprocessor: Arc<dyn ImagePreprocessor>,
    ocr: Arc<dyn OcrEngine>,
    pdf: Arc<dyn PdfTextSource>,
    model: Arc<dyn LanguageModel>,
}

impl ReceiptExtractor {
    pub fn new(
        preprocessor: Arc<dyn ImagePreprocessor>,
        ocr: Arc<dyn OcrEngine>,
        pdf: Arc<dyn PdfTextSource>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            preprocessor,
            ocr,
            pdf,
            model,
        }
    }

    /// Extracts one candidate transaction from an uploaded receipt.
    ///
    /// PDFs are read through their text layer, which counts as fully
    /// confident OCR. Anything else must decode as an image.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn extract(&self, bytes: Vec<u8>, content_type: &str) -> Result<ReceiptExtraction, ReceiptError> {
        let ocr = if content_type == "application/pdf" || looks_like_pdf(&bytes) {
            OcrOutput {
                text: self.pdf.extract_text(&bytes).await?,
                confidence: 1.0,
            }
        } else {
            let preprocessor = self.preprocessor.clone();
            let image = tokio::task::spawn_blocking(move || {
                image::load_from_memory(&bytes).map(|decoded| preprocessor.preprocess(&decoded))
            })
            .await
            .map_err(|e| ReceiptError::InvalidImage(format!("decoding aborted: {e}")))?
            .map_err(|e| ReceiptError::InvalidImage(e.to_string()))?;

            self.ocr.recognize(&image).await?
        };

        if !has_text(&ocr.text) {
            warn!("Receipt produced no readable text");
            return Err(ReceiptError::NoText);
        }
        debug!("Receipt text has {} characters", ocr.text.len());

        Ok(self.structure(ocr).await)
    }

    async fn structure(&self, ocr: OcrOutput) -> ReceiptExtraction {
        match self.model.structure(StructuringTask::ReceiptFields, &ocr.text).await {
            Ok(value) => {
                let candidate = fields::candidate_from_json(&value, &ocr.text);
                if candidate.amount.is_some() {
                    let score = fields::field_score(&candidate);
                    let confidence = fields::confidence(score, ocr.confidence).max(score * AI_FIELD_WEIGHT);
                    info!("Receipt structured by the language model");
                    return Self::extraction(candidate, confidence, ReceiptMethod::AiAssisted, ocr.text);
                }
                debug!("Model found no total, using pattern rules");
            }
            Err(err) => debug!(%err, "Model structuring unavailable, using pattern rules"),
        }

        let candidate = fields::parse_receipt_text(&ocr.text);
        let confidence = fields::confidence(fields::field_score(&candidate), ocr.confidence);
        Self::extraction(candidate, confidence, ReceiptMethod::Ocr, ocr.text)
    }

    fn extraction(
        candidate: ReceiptCandidate,
        confidence: f64,
        method: ReceiptMethod,
        raw_text: String,
    ) -> ReceiptExtraction {
        ReceiptExtraction {
            candidate,
            confidence: confidence.clamp(0.0, 1.0),
            method,
            raw_text,
        }
    }
}
