//! Prompt text sent to the hosted model.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt::Write as _;

use super::StructuringTask;
use crate::money::CurrencyFormat;
use crate::records::TransactionRecord;

const INSIGHT_INSTRUCTIONS: &str = r#"You are a helpful financial assistant. You analyze a user's transaction data and answer questions about their finances.

Always answer with a JSON object in this shape:
{
    "insight": "Your analysis in a few sentences",
    "chart": {
        "type": "bar|pie|line|doughnut",
        "title": "Chart title",
        "labels": ["label1", "label2"],
        "datasets": [{"label": "Dataset name", "data": [1.0, 2.0]}]
    },
    "recommendations": ["recommendation 1", "recommendation 2"]
}

Use bar charts for comparisons, line charts for trends over time and pie or doughnut charts for proportions.
Keep the insight concise and actionable, give 2-3 specific recommendations and only use numbers that appear in the data.
Set "chart" to null when no visualization fits the question."#;

const STATEMENT_INSTRUCTIONS: &str = r#"Extract every transaction from this bank statement text.

Answer with a JSON array only, no prose. Each element must look like:
{"date": "YYYY-MM-DD", "description": "text", "amount": 123.45, "type": "income|expense"}

Rules:
- Money received (credits, deposits, salary, refunds, interest) is "income", money spent or withdrawn is "expense".
- "amount" is always a positive number.
- Skip opening/closing balances, totals and headers.
- Answer [] if there are no transactions."#;

const RECEIPT_INSTRUCTIONS: &str = r#"Extract the purchase details from this receipt text produced by OCR. The text may contain recognition errors.

Answer with a JSON object only, no prose:
{"merchant": "store name", "date": "YYYY-MM-DD", "amount": 123.45, "payment_method": "cash|card|upi|null", "items": ["item 1", "item 2"]}

Rules:
- "amount" is the grand TOTAL paid, not a subtotal or tax line.
- Use null for anything you cannot find."#;

/// Builds the full prompt for a free-text insight question.
pub fn insight_prompt(query: &str, summary: &str) -> String {
    format!("{INSIGHT_INSTRUCTIONS}\n\nUser query: {query}\n\nTransaction data summary:\n{summary}\n")
}

/// Builds the prompt for a structuring task over extracted text.
pub fn structuring_prompt(task: StructuringTask, text: &str) -> String {
    let instructions = match task {
        StructuringTask::StatementRows => STATEMENT_INSTRUCTIONS,
        StructuringTask::ReceiptFields => RECEIPT_INSTRUCTIONS,
    };
    format!("{instructions}\n\nText:\n{text}\n")
}

/// Condenses a transaction history, most recent first, into the summary the
/// model sees: totals, date range, the five latest entries and the top
/// merchants by spend.
pub fn transaction_summary(transactions: &[TransactionRecord], currency: CurrencyFormat) -> String {
    if transactions.is_empty() {
        return "No transactions available.".to_string();
    }

    let (income, expense) = crate::stats::totals(transactions);
    let first = transactions.iter().map(|t| t.occurred_on).min();
    let last = transactions.iter().map(|t| t.occurred_on).max();
    let date_range = match (first, last) {
        (Some(first), Some(last)) => format!("from {first} to {last}"),
        _ => "N/A".to_string(),
    };

    let mut summary = String::new();
    let _ = writeln!(summary, "Total Transactions: {}", transactions.len());
    let _ = writeln!(summary, "Date Range: {date_range}");
    let _ = writeln!(summary, "Total Income: {}", currency.format(income));
    let _ = writeln!(summary, "Total Expenses: {}", currency.format(expense));
    let _ = writeln!(summary, "Balance: {}", currency.format(income - expense));
    let _ = writeln!(summary, "\nRecent Transactions (last 5):");
    for t in transactions.iter().take(5) {
        let _ = write!(
            summary,
            "- {}: {} {}",
            t.occurred_on,
            t.kind,
            currency.format(t.amount)
        );
        if let Some(merchant) = &t.merchant {
            let _ = write!(summary, " at {merchant}");
        }
        if let Some(category) = &t.category {
            let _ = write!(summary, " ({category})");
        }
        summary.push('\n');
    }

    let mut by_merchant: HashMap<&str, Decimal> = HashMap::new();
    for t in transactions.iter().filter(|t| t.is_expense()) {
        if let Some(merchant) = t.merchant.as_deref() {
            *by_merchant.entry(merchant).or_insert(Decimal::ZERO) += t.amount;
        }
    }
    if !by_merchant.is_empty() {
        let mut ranked: Vec<_> = by_merchant.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let _ = writeln!(summary, "\nTop Spending by Merchant:");
        for (merchant, amount) in ranked.into_iter().take(5) {
            let _ = writeln!(summary, "- {merchant}: {}", currency.format(amount));
        }
    }

    summary
}
