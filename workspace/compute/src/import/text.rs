//! Line-pattern extraction for statements that print one transaction per
//! line: `<date> <description> <amount> [CR|DR]`.

use async_trait::async_trait;
use common::{CandidateTransaction, ImportMethod, TransactionKind};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, trace};

use super::{
    ImportStrategy, StatementDocument, StrategyOutcome, kind_from_description, statement_candidate,
};
use crate::parsing::{parse_date, parse_signed_amount};

fn line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?ix)
            ^\s*
            (?P<date>
                \d{1,2}[/-]\d{1,2}[/-]\d{2,4}
              | \d{4}[/-]\d{1,2}[/-]\d{1,2}
              | \d{1,2}[\s-][a-z]{3,9}[\s-]\d{2,4}
            )
            \s+
            (?P<description>.+?)
            \s+
            (?P<amount>[-+]?\s?(?:[$€£₹]|rs\.?|inr)?\s?\d[\d,]*\.\d{2})
            (?:\s*(?P<marker>cr|dr))?
            \s*$",
        )
        .expect("invalid statement line regex")
    })
}

fn money_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d[\d,]*\.\d{2}\b").expect("invalid money regex"))
}

/// Matches statement lines with fixed patterns.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextStrategy;

impl TextStrategy {
    pub fn new() -> Self {
        Self
    }

    /// Lines with column delimiters or several amounts belong to a table.
    fn is_tabular(line: &str) -> bool {
        line.contains('|') || line.contains('\t') || money_re().find_iter(line).count() > 1
    }

    pub fn parse_line(line: &str) -> Option<CandidateTransaction> {
        if Self::is_tabular(line) {
            return None;
        }
        let caps = line_re().captures(line)?;

        let occurred_on = parse_date(&caps["date"])?;
        let description = caps["description"].trim();
        let signed = parse_signed_amount(&caps["amount"])?;
        let amount = signed.abs();
        if amount.is_zero() {
            return None;
        }

        let kind = match caps.name("marker").map(|m| m.as_str().to_lowercase()) {
            Some(marker) if marker == "cr" => TransactionKind::Income,
            Some(_) => TransactionKind::Expense,
            None if signed.is_sign_negative() => TransactionKind::Expense,
            None => kind_from_description(description),
        };

        Some(statement_candidate(occurred_on, amount, kind, description))
    }
}

#[async_trait]
impl ImportStrategy for TextStrategy {
    fn method(&self) -> ImportMethod {
        ImportMethod::Text
    }

    async fn extract(&self, document: &StatementDocument) -> StrategyOutcome {
        if document.text.trim().is_empty() {
            return StrategyOutcome::Declined("no text layer".to_string());
        }

        let rows: Vec<CandidateTransaction> = document
            .text
            .lines()
            .filter_map(|line| {
                let parsed = Self::parse_line(line);
                if parsed.is_some() {
                    trace!(line, "matched statement line");
                }
                parsed
            })
            .collect();

        debug!("Text patterns matched {} lines", rows.len());
        if rows.is_empty() {
            StrategyOutcome::Declined("no lines matched the statement patterns".to_string())
        } else {
            StrategyOutcome::Extracted(rows)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    #[test]
    fn test_parse_line_with_markers() {
        let debit = TextStrategy::parse_line("02/03/2024 POS COFFEE HOUSE 4.50 DR").unwrap();
        assert_eq!(debit.occurred_on, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert_eq!(debit.amount, Decimal::new(450, 2));
        assert_eq!(debit.kind, TransactionKind::Expense);
        assert_eq!(debit.merchant.as_deref(), Some("POS COFFEE HOUSE"));

        let credit = TextStrategy::parse_line("05 Mar 2024 TRANSFER FROM J DOE 120.00 Cr").unwrap();
        assert_eq!(credit.kind, TransactionKind::Income);
        assert_eq!(credit.amount, Decimal::new(12000, 2));
    }

    #[test]
    fn test_parse_line_sign_and_keywords() {
        let negative = TextStrategy::parse_line("2024-03-07 REFUND ADJUSTMENT -15.00").unwrap();
        assert_eq!(negative.kind, TransactionKind::Expense);
        assert_eq!(negative.amount, Decimal::new(1500, 2));

        let salary = TextStrategy::parse_line("28/03/2024 MONTHLY SALARY $3,200.00").unwrap();
        assert_eq!(salary.kind, TransactionKind::Income);
        assert_eq!(salary.amount, Decimal::new(320000, 2));
    }

    #[test]
    fn test_parse_line_with_rupee_prefix() {
        let spaced = TextStrategy::parse_line("02/03/2024 GROCERY STORE Rs. 1,200.00").unwrap();
        assert_eq!(spaced.amount, Decimal::new(120000, 2));
        assert_eq!(spaced.merchant.as_deref(), Some("GROCERY STORE"));

        let compact = TextStrategy::parse_line("04/03/2024 AUTO FARE Rs.500.00 DR").unwrap();
        assert_eq!(compact.amount, Decimal::new(50000, 2));
        assert_eq!(compact.kind, TransactionKind::Expense);

        let inr = TextStrategy::parse_line("02/03/2024 GROCERY STORE INR 1,200.00").unwrap();
        assert_eq!(inr.amount, spaced.amount);
    }

    #[test]
    fn test_tabular_lines_are_left_alone() {
        assert!(TextStrategy::parse_line("02/01/2024 | Grocery Mart | 45.20").is_none());
        assert!(TextStrategy::parse_line("02/01/2024\tGrocery Mart\t45.20").is_none());
        assert!(TextStrategy::parse_line("02/01/2024  Grocery Mart  45.20  954.80").is_none());
    }

    #[test]
    fn test_non_transaction_lines() {
        assert!(TextStrategy::parse_line("Account statement").is_none());
        assert!(TextStrategy::parse_line("Page 1 of 3").is_none());
        assert!(TextStrategy::parse_line("02/01/2024 Opening balance").is_none());
    }

    #[tokio::test]
    async fn test_empty_text_declines() {
        let document = StatementDocument {
            bytes: Vec::new(),
            text: "  \n ".to_string(),
        };
        assert!(matches!(
            TextStrategy::new().extract(&document).await,
            StrategyOutcome::Declined(_)
        ));
    }
}
