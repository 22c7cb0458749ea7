use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::TransactionKind;

// ===================== Statement import =====================

/// A transaction proposed by an extraction pipeline, not yet persisted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct CandidateTransaction {
    pub occurred_on: NaiveDate,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub merchant: Option<String>,
    pub note: Option<String>,
    pub payment_method: Option<String>,
    pub category_id: Option<i32>,
    /// Set when the candidate matches a transaction the user already has.
    #[serde(default)]
    pub duplicate: bool,
}

/// Which import strategy produced a preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ImportMethod {
    Text,
    Table,
    Ai,
}

impl ImportMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportMethod::Text => "text",
            ImportMethod::Table => "table",
            ImportMethod::Ai => "ai",
        }
    }
}

/// A stored import preview as returned to its owner.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ImportPreview {
    pub method: ImportMethod,
    pub transactions: Vec<CandidateTransaction>,
    pub total_count: usize,
    pub duplicate_count: usize,
}

/// Request body for confirming the pending import preview.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ConfirmImportRequest {
    /// Leave candidates flagged as duplicates out of the import.
    #[serde(default = "default_skip_duplicates")]
    pub skip_duplicates: bool,
    /// Indices into the preview to import; all of them when absent.
    #[serde(default)]
    pub selected: Option<Vec<usize>>,
}

impl Default for ConfirmImportRequest {
    fn default() -> Self {
        Self {
            skip_duplicates: true,
            selected: None,
        }
    }
}

fn default_skip_duplicates() -> bool {
    true
}
