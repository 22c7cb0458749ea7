use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::TransactionKind;

// ===================== Receipts =====================

/// How the receipt fields were structured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptMethod {
    Ocr,
    AiAssisted,
}

/// Fields read off a receipt. Anything the pipeline could not find stays
/// empty so the user can fill it in before saving.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ReceiptCandidate {
    pub kind: TransactionKind,
    pub amount: Option<Decimal>,
    pub occurred_on: Option<NaiveDate>,
    pub merchant: Option<String>,
    pub note: Option<String>,
    pub payment_method: Option<String>,
    pub category_id: Option<i32>,
    #[serde(default)]
    pub items: Vec<String>,
}

/// Result of running a receipt through the extraction pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ReceiptExtraction {
    pub candidate: ReceiptCandidate,
    /// Between 0 and 1.
    pub confidence: f64,
    pub method: ReceiptMethod,
    pub raw_text: String,
}
