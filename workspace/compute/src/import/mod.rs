//! Bank statement import.
//!
//! A PDF statement is turned into text once, then handed to an ordered list
//! of [`ImportStrategy`] implementations. The first strategy that extracts at
//! least one row wins; the others are never called. When every strategy
//! declines or fails the import fails with the reasons of all of them.

pub mod ai;
pub mod confirm;
pub mod pdf;
pub mod preview;
pub mod table;
pub mod text;

use async_trait::async_trait;
use common::{CandidateTransaction, ImportMethod, TransactionKind};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::ai::LanguageModel;
use crate::parsing::truncate_chars;

pub use ai::AiStrategy;
pub use confirm::{ConfirmOptions, confirm_preview};
pub use pdf::{PdfExtractSource, PdfTextSource};
pub use preview::{PreviewStore, StoredPreview};
pub use table::{AlignedTableExtractor, DelimitedTableExtractor, TableExtractor, TableStrategy};
pub use text::TextStrategy;

/// Payment method recorded for rows read from a bank statement.
pub const STATEMENT_PAYMENT_METHOD: &str = "bank_transfer";
const DEFAULT_MERCHANT: &str = "Bank Transaction";
const INCOME_KEYWORDS: &[&str] = &["salary", "deposit", "credit", "interest", "refund"];

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Could not read the PDF: {0}")]
    Pdf(String),

    #[error("No transactions could be extracted from the statement ({})", format_attempts(.attempts))]
    ExtractionFailed { attempts: Vec<StrategyAttempt> },

    #[error("No import preview is pending")]
    NoPreview,

    #[error("Selected index {index} is out of range for a preview of {len} transactions")]
    InvalidSelection { index: usize, len: usize },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl From<crate::error::ComputeError> for ImportError {
    fn from(err: crate::error::ComputeError) -> Self {
        match err {
            crate::error::ComputeError::Database(e) => ImportError::Database(e),
        }
    }
}

/// Why one strategy did not produce rows.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyAttempt {
    pub method: ImportMethod,
    pub reason: String,
}

impl fmt::Display for StrategyAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.method.as_str(), self.reason)
    }
}

fn format_attempts(attempts: &[StrategyAttempt]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// The statement as seen by the strategies.
#[derive(Debug, Clone)]
pub struct StatementDocument {
    pub bytes: Vec<u8>,
    /// Extracted text layer; empty when extraction failed.
    pub text: String,
}

/// Result of running one strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    Extracted(Vec<CandidateTransaction>),
    /// The document does not look like something this strategy handles.
    Declined(String),
    /// The strategy tried and hit an error.
    Failed(String),
}

#[async_trait]
pub trait ImportStrategy: Send + Sync {
    fn method(&self) -> ImportMethod;

    async fn extract(&self, document: &StatementDocument) -> StrategyOutcome;
}

/// Successful extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportResult {
    pub method: ImportMethod,
    pub transactions: Vec<CandidateTransaction>,
    pub message: String,
}

pub struct StatementImporter {
    pdf: Arc<dyn PdfTextSource>,
    strategies: Vec<Arc<dyn ImportStrategy>>,
}

impl StatementImporter {
    pub fn new(pdf: Arc<dyn PdfTextSource>, strategies: Vec<Arc<dyn ImportStrategy>>) -> Self {
        Self { pdf, strategies }
    }

    /// Text, then tables, then the language model.
    pub fn with_default_strategies(pdf: Arc<dyn PdfTextSource>, model: Arc<dyn LanguageModel>) -> Self {
        let strategies: Vec<Arc<dyn ImportStrategy>> = vec![
            Arc::new(TextStrategy::new()),
            Arc::new(TableStrategy::default()),
            Arc::new(AiStrategy::new(model)),
        ];
        Self::new(pdf, strategies)
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn import(&self, bytes: Vec<u8>) -> Result<ImportResult, ImportError> {
        let text = match self.pdf.extract_text(&bytes).await {
            Ok(text) => text,
            Err(err) => {
                warn!(%err, "PDF text extraction failed, continuing without text");
                String::new()
            }
        };
        debug!("Statement text layer has {} characters", text.len());

        let document = StatementDocument { bytes, text };
        let mut attempts = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let method = strategy.method();
            let reason = match strategy.extract(&document).await {
                StrategyOutcome::Extracted(rows) if !rows.is_empty() => {
                    info!("Strategy {} extracted {} transactions", method.as_str(), rows.len());
                    return Ok(ImportResult {
                        method,
                        message: format!("Successfully parsed {} transactions", rows.len()),
                        transactions: rows,
                    });
                }
                StrategyOutcome::Extracted(_) => "no rows found".to_string(),
                StrategyOutcome::Declined(reason) => reason,
                StrategyOutcome::Failed(error) => format!("failed: {error}"),
            };
            debug!("Strategy {} gave up: {}", method.as_str(), reason);
            attempts.push(StrategyAttempt { method, reason });
        }

        warn!("All import strategies exhausted");
        Err(ImportError::ExtractionFailed { attempts })
    }
}

/// Builds a statement candidate from a row description.
pub(crate) fn statement_candidate(
    occurred_on: chrono::NaiveDate,
    amount: rust_decimal::Decimal,
    kind: TransactionKind,
    description: &str,
) -> CandidateTransaction {
    let description = description.split_whitespace().collect::<Vec<_>>().join(" ");
    CandidateTransaction {
        occurred_on,
        amount,
        kind,
        merchant: Some(if description.is_empty() {
            DEFAULT_MERCHANT.to_string()
        } else {
            truncate_chars(&description, 100)
        }),
        note: (!description.is_empty()).then(|| truncate_chars(&description, 500)),
        payment_method: Some(STATEMENT_PAYMENT_METHOD.to_string()),
        category_id: None,
        duplicate: false,
    }
}

/// Kind for a row that only has an unsigned amount.
pub(crate) fn kind_from_description(description: &str) -> TransactionKind {
    let lowered = description.to_lowercase();
    if INCOME_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        TransactionKind::Income
    } else {
        TransactionKind::Expense
    }
}
