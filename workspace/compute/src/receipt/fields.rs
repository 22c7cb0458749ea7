//! Pattern rules that read receipt fields out of OCR text, plus the
//! confidence score for the result.

use chrono::NaiveDate;
use common::{ReceiptCandidate, TransactionKind};
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::OnceLock;

use crate::parsing::{parse_amount, parse_date, truncate_chars};

const MERCHANT_MAX_CHARS: usize = 100;
const NOTE_MAX_CHARS: usize = 500;

fn keyword_amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:\btotal|\bamount(?:\s+(?:due|payable|paid))?|\bsum\b|₹|\binr\b|\brs\b\.?)\s*:?\s*(?:[$₹]\s*)?(\d[\d,]*(?:\.\d+)?)",
        )
        .expect("invalid keyword amount regex")
    })
}

fn suffixed_amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d[\d,]*(?:\.\d+)?)\s*(?:₹|\binr\b|\brs\b\.?)").expect("invalid suffixed amount regex")
    })
}

fn dollar_amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\s*(\d[\d,]*(?:\.\d{2})?)").expect("invalid dollar amount regex"))
}

fn trailing_amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)(\d+\.\d{2})\s*$").expect("invalid trailing amount regex"))
}

fn date_res() -> &'static [Regex; 3] {
    static RES: OnceLock<[Regex; 3]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            Regex::new(r"\b(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})\b").expect("invalid numeric date regex"),
            Regex::new(r"\b(\d{4}[/-]\d{1,2}[/-]\d{1,2})\b").expect("invalid iso date regex"),
            Regex::new(r"(?i)\b(\d{1,2}\s+(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?,?\s+\d{2,4})\b")
                .expect("invalid named month date regex"),
        ]
    })
}

fn leading_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+[/-]\d+").expect("invalid leading date regex"))
}

fn decimal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+\.\d{2}").expect("invalid decimal regex"))
}

fn boilerplate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:RECEIPT|BILL|INVOICE|TAX|GST)\b").expect("invalid boilerplate regex"))
}

fn payment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(cash|upi|visa|mastercard|amex|debit card|credit card|card)\b")
            .expect("invalid payment method regex")
    })
}

/// The purchase total. Keyword lines win, and among them the first one
/// with cents; then amounts followed by a currency marker, then `$`
/// amounts, then the last decimal that ends a line.
pub fn extract_amount(text: &str) -> Option<Decimal> {
    let keyword: Vec<&str> = keyword_amount_re()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    let keyword_pick = keyword
        .iter()
        .find(|raw| raw.contains('.'))
        .or_else(|| keyword.first());
    if let Some(amount) = keyword_pick.and_then(|raw| parse_amount(raw)) {
        return Some(amount);
    }

    [suffixed_amount_re(), dollar_amount_re()]
        .into_iter()
        .find_map(|re| re.captures(text).and_then(|caps| parse_amount(&caps[1])))
        .or_else(|| {
            trailing_amount_re()
                .captures_iter(text)
                .last()
                .and_then(|caps| parse_amount(&caps[1]))
        })
}

pub fn extract_date(text: &str) -> Option<NaiveDate> {
    date_res()
        .iter()
        .flat_map(|re| re.captures_iter(text))
        .find_map(|caps| parse_date(&caps[1]))
}

/// The first of the top five lines that reads like a name rather than a
/// date or a price, uppercased and stripped of receipt boilerplate.
pub fn extract_merchant(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(5)
        .filter(|line| {
            line.chars().count() > 3 && !leading_date_re().is_match(line) && !decimal_re().is_match(line)
        })
        .find_map(|line| {
            let upper = line.to_uppercase();
            let stripped = boilerplate_re().replace_all(&upper, "");
            let merchant = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
            (merchant.chars().count() > 2).then(|| truncate_chars(&merchant, MERCHANT_MAX_CHARS))
        })
}

pub fn extract_payment_method(text: &str) -> Option<String> {
    let found = payment_re().captures(text)?[1].to_lowercase();
    Some(match found.as_str() {
        "cash" => "cash".to_string(),
        "upi" => "upi".to_string(),
        _ => "card".to_string(),
    })
}

fn note_from(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| truncate_chars(trimmed, NOTE_MAX_CHARS))
}

/// Reads every field with the pattern rules.
pub fn parse_receipt_text(text: &str) -> ReceiptCandidate {
    ReceiptCandidate {
        kind: TransactionKind::Expense,
        amount: extract_amount(text),
        occurred_on: extract_date(text),
        merchant: extract_merchant(text),
        note: note_from(text),
        payment_method: extract_payment_method(text),
        category_id: None,
        items: Vec::new(),
    }
}

fn json_text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Builds a candidate from a model's JSON answer. OCR text fills the note
/// when the model gave none.
pub fn candidate_from_json(value: &Value, ocr_text: &str) -> ReceiptCandidate {
    let amount = match value.get("amount") {
        Some(Value::Number(number)) => parse_amount(&number.to_string()),
        Some(Value::String(raw)) => parse_amount(raw),
        _ => None,
    };
    let items = value
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    ReceiptCandidate {
        kind: TransactionKind::Expense,
        amount,
        occurred_on: json_text(value, "date").and_then(|raw| parse_date(&raw)),
        merchant: json_text(value, "merchant").map(|m| truncate_chars(&m, MERCHANT_MAX_CHARS)),
        note: json_text(value, "note")
            .map(|n| truncate_chars(&n, NOTE_MAX_CHARS))
            .or_else(|| note_from(ocr_text)),
        payment_method: json_text(value, "payment_method").map(|p| p.to_lowercase()),
        category_id: None,
        items,
    }
}

/// Share of the important fields that were found.
pub fn field_score(candidate: &ReceiptCandidate) -> f64 {
    let mut score = 0.0;
    if candidate.amount.is_some() {
        score += 0.4;
    }
    if candidate.occurred_on.is_some() {
        score += 0.3;
    }
    if candidate.merchant.is_some() {
        score += 0.2;
    }
    if candidate.note.as_ref().is_some_and(|n| n.chars().count() > 10) {
        score += 0.1;
    }
    score
}

/// Field score scaled by how sure the OCR engine was.
pub fn confidence(field_score: f64, ocr_confidence: f64) -> f64 {
    let ocr = ocr_confidence.clamp(0.0, 1.0);
    (field_score * (0.5 + 0.5 * ocr)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const RECEIPT: &str = "CORNER CAFE\n\
        Tax Invoice\n\
        12/03/2024 09:14\n\
        Latte            4.50\n\
        Croissant        3.20\n\
        Subtotal         7.70\n\
        GST              0.77\n\
        Total            8.47\n\
        Paid by VISA\n";

    #[test]
    fn test_parse_receipt_text() {
        let candidate = parse_receipt_text(RECEIPT);

        assert_eq!(candidate.amount, Some(Decimal::new(847, 2)));
        assert_eq!(candidate.occurred_on, NaiveDate::from_ymd_opt(2024, 3, 12));
        assert_eq!(candidate.merchant.as_deref(), Some("CORNER CAFE"));
        assert_eq!(candidate.payment_method.as_deref(), Some("card"));
        assert_eq!(candidate.kind, TransactionKind::Expense);
        assert!(candidate.note.unwrap().starts_with("CORNER CAFE"));
    }

    #[test]
    fn test_amount_fallbacks() {
        assert_eq!(extract_amount("Grand total: 1,250.00"), Some(Decimal::new(125000, 2)));
        assert_eq!(extract_amount("Paid 450 INR"), Some(Decimal::new(450, 0)));
        assert_eq!(extract_amount("Coffee $ 3.75 thanks"), Some(Decimal::new(375, 2)));
        assert_eq!(extract_amount("Bread 2.10\nMilk 1.05"), Some(Decimal::new(105, 2)));
        assert_eq!(extract_amount("no numbers here"), None);
    }

    #[test]
    fn test_subtotal_is_not_the_total() {
        assert_eq!(extract_amount("Subtotal 10.00\nTotal 11.00"), Some(Decimal::new(1100, 2)));
    }

    #[test]
    fn test_merchant_skips_dates_and_prices() {
        let text = "12/03/2024\n4.50\nBILL\nGREEN GROCER RECEIPT\n";
        assert_eq!(extract_merchant(text).as_deref(), Some("GREEN GROCER"));
        assert_eq!(extract_merchant("1.00\n2.00"), None);
    }

    #[test]
    fn test_named_month_dates() {
        assert_eq!(extract_date("Date: 7 Aug 2023"), NaiveDate::from_ymd_opt(2023, 8, 7));
        assert_eq!(extract_date("on 2023-08-07 at noon"), NaiveDate::from_ymd_opt(2023, 8, 7));
    }

    #[test]
    fn test_candidate_from_json() {
        let value = json!({
            "merchant": "Fresh Mart",
            "date": "2024-05-06",
            "amount": "23.40",
            "payment_method": "UPI",
            "items": ["Apples", " ", "Milk"],
        });

        let candidate = candidate_from_json(&value, "FRESH MART raw text");

        assert_eq!(candidate.amount, Some(Decimal::new(2340, 2)));
        assert_eq!(candidate.occurred_on, NaiveDate::from_ymd_opt(2024, 5, 6));
        assert_eq!(candidate.payment_method.as_deref(), Some("upi"));
        assert_eq!(candidate.items, vec!["Apples".to_string(), "Milk".to_string()]);
        assert_eq!(candidate.note.as_deref(), Some("FRESH MART raw text"));
    }

    #[test]
    fn test_scores() {
        let full = parse_receipt_text(RECEIPT);
        assert!((field_score(&full) - 1.0).abs() < 1e-9);
        assert!((confidence(1.0, 0.8) - 0.9).abs() < 1e-9);
        assert!((confidence(0.4, 0.0) - 0.2).abs() < 1e-9);
        assert_eq!(confidence(1.0, 7.0), 1.0);
    }
}
