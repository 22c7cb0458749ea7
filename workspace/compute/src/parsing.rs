//! Lenient date and amount parsing shared by the statement and receipt
//! extractors.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::OnceLock;

/// Formats tried in order. Day-first variants come before month-first ones
/// so ambiguous dates like `03/04/2024` read as 3 April.
const DATE_FORMATS: &[&str] = &[
    "%d/%m/%Y", "%d/%m/%y", "%d-%m-%Y", "%d-%m-%y", "%Y/%m/%d", "%Y-%m-%d", "%m/%d/%Y",
    "%m/%d/%y", "%d %b %Y", "%d %B %Y", "%b %d %Y", "%B %d %Y", "%d-%b-%Y", "%d-%B-%Y",
    "%d %b %y", "%d-%b-%y",
];

fn currency_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)rs\.|\b(?:rs|inr)\b|[$€£₹]").expect("invalid currency regex"))
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d[\d,]*(?:\.\d+)?|\.\d+").expect("invalid number regex"))
}

const EMPTY_MARKERS: &[&str] = &["", "nan", "none", "null", "-", "--"];

/// Parses a date written in any of the formats bank statements and receipts
/// commonly use. Punctuation other than `/` and `-` is ignored.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '/' || *c == '-')
        .collect();
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if EMPTY_MARKERS.contains(&cleaned.to_lowercase().as_str()) {
        return None;
    }

    DATE_FORMATS
        .iter()
        .filter_map(|format| NaiveDate::parse_from_str(&cleaned, format).ok())
        // `%Y` happily reads "24" as year 24; let `%y` handle short years.
        .find(|date| (1900..=2100).contains(&date.year()))
}

/// Parses a signed money amount, dropping currency symbols, letters and
/// thousands separators. Currency tokens go first, so the dot in `Rs.` is
/// never read as a decimal point. Returns `None` for blanks and unparsable
/// input.
pub fn parse_signed_amount(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if EMPTY_MARKERS.contains(&trimmed.to_lowercase().as_str()) {
        return None;
    }

    let negative = trimmed.starts_with('-')
        || (trimmed.starts_with('(') && trimmed.ends_with(')'))
        || trimmed.to_lowercase().ends_with("dr");
    let without_currency = currency_re().replace_all(trimmed, " ");
    let number = number_re().find(&without_currency)?;
    let digits = number.as_str().replace(',', "");

    let value = Decimal::from_str(&digits).ok()?.round_dp(2);
    Some(if negative { -value } else { value })
}

/// Parses an amount and returns its absolute value, rejecting zero.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    parse_signed_amount(raw)
        .map(|value| value.abs())
        .filter(|value| !value.is_zero())
}

/// Truncates to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
