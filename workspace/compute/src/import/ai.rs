//! Last-resort extraction through the hosted language model.

use async_trait::async_trait;
use common::{CandidateTransaction, ImportMethod, TransactionKind};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{ImportStrategy, StatementDocument, StrategyOutcome, kind_from_description, statement_candidate};
use crate::ai::{LanguageModel, StructuringTask};
use crate::parsing::{parse_date, parse_signed_amount};

const PDF_MIME_TYPE: &str = "application/pdf";

pub struct AiStrategy {
    model: Arc<dyn LanguageModel>,
}

impl AiStrategy {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Accepts either a bare array of rows or an object wrapping one under
    /// `transactions`.
    fn rows(payload: &Value) -> &[Value] {
        match payload {
            Value::Array(rows) => rows,
            Value::Object(map) => map
                .get("transactions")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default(),
            _ => &[],
        }
    }

    fn text_field<'a>(row: &'a Value, names: &[&str]) -> Option<&'a str> {
        names.iter().find_map(|name| row.get(*name).and_then(Value::as_str))
    }

    /// Keeps a row only when its date and amount parse.
    pub fn parse_row(row: &Value) -> Option<CandidateTransaction> {
        let occurred_on = parse_date(Self::text_field(row, &["date", "occurred_on"])?)?;

        let signed = match row.get("amount")? {
            Value::Number(number) => parse_signed_amount(&number.to_string())?,
            Value::String(text) => parse_signed_amount(text)?,
            _ => return None,
        };
        let amount = signed.abs();
        if amount.is_zero() {
            return None;
        }

        let description = Self::text_field(row, &["description", "merchant"]).unwrap_or_default();
        let kind = match Self::text_field(row, &["type", "kind"]).map(str::parse::<TransactionKind>) {
            Some(Ok(kind)) => kind,
            _ if signed.is_sign_negative() => TransactionKind::Expense,
            _ => kind_from_description(description),
        };

        Some(statement_candidate(occurred_on, amount, kind, description))
    }
}

#[async_trait]
impl ImportStrategy for AiStrategy {
    fn method(&self) -> ImportMethod {
        ImportMethod::Ai
    }

    async fn extract(&self, document: &StatementDocument) -> StrategyOutcome {
        let response = if document.text.trim().is_empty() {
            debug!("No text layer, sending the document itself to the model");
            self.model
                .structure_document(StructuringTask::StatementRows, PDF_MIME_TYPE, &document.bytes)
                .await
        } else {
            self.model
                .structure(StructuringTask::StatementRows, &document.text)
                .await
        };

        let payload = match response {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%err, "Model extraction failed");
                return StrategyOutcome::Failed(err.to_string());
            }
        };

        let candidates = Self::rows(&payload);
        let rows: Vec<CandidateTransaction> = candidates.iter().filter_map(Self::parse_row).collect();
        debug!("Model returned {} rows, {} usable", candidates.len(), rows.len());

        if rows.is_empty() {
            StrategyOutcome::Declined("model returned no usable rows".to_string())
        } else {
            StrategyOutcome::Extracted(rows)
        }
    }
}
