//! Hosted language-model access.
//!
//! Everything that talks to a model goes through the [`LanguageModel`]
//! trait so the pipelines can run against a test double, or against
//! [`UnconfiguredModel`] when no API key is set.

pub mod gemini;
pub mod parsing;
pub mod prompts;

use async_trait::async_trait;
use thiserror::Error;

use crate::records::TransactionRecord;

pub use gemini::GeminiClient;

/// Error kinds a model call can fail with.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AiError {
    #[error("AI assistant is not configured")]
    NotConfigured,

    #[error("Language model request failed: {0}")]
    Network(String),

    #[error("Language model returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Language model returned an unusable response: {0}")]
    InvalidResponse(String),
}

/// What a `structure` call should turn free text into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuringTask {
    /// Bank statement text into a JSON array of transaction rows.
    StatementRows,
    /// Receipt OCR text into a JSON object of receipt fields.
    ReceiptFields,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Answers `query` about the given transactions in plain text.
    async fn summarize(
        &self,
        query: &str,
        transactions: &[TransactionRecord],
    ) -> Result<String, AiError>;

    /// Extracts structured JSON from unstructured text.
    async fn structure(
        &self,
        task: StructuringTask,
        text: &str,
    ) -> Result<serde_json::Value, AiError>;

    /// Extracts structured JSON straight from a document, for files whose
    /// text layer could not be read. Models without document input refuse.
    async fn structure_document(
        &self,
        _task: StructuringTask,
        _mime_type: &str,
        _bytes: &[u8],
    ) -> Result<serde_json::Value, AiError> {
        Err(AiError::InvalidResponse(
            "document input is not supported by this model".to_string(),
        ))
    }
}

/// Stand-in used when no model credentials are configured. Every call
/// fails with [`AiError::NotConfigured`], which callers treat like any other
/// model outage.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredModel;

#[async_trait]
impl LanguageModel for UnconfiguredModel {
    async fn summarize(&self, _query: &str, _: &[TransactionRecord]) -> Result<String, AiError> {
        Err(AiError::NotConfigured)
    }

    async fn structure(&self, _task: StructuringTask, _text: &str) -> Result<serde_json::Value, AiError> {
        Err(AiError::NotConfigured)
    }

    async fn structure_document(
        &self,
        _task: StructuringTask,
        _mime_type: &str,
        _bytes: &[u8],
    ) -> Result<serde_json::Value, AiError> {
        Err(AiError::NotConfigured)
    }
}
