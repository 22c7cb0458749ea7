//! Natural-language insights over a user's transactions.
//!
//! Presets are computed locally and always succeed. Free-text questions go
//! to the language model; when it fails the caller still gets an answer,
//! just an apologetic one.

use chrono::NaiveDate;
use common::{ChartDataset, ChartKind, ChartSpec, Insight, InsightPreset, QuerySuggestion};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::ai::LanguageModel;
use crate::ai::parsing::strip_code_fence;
use crate::money::CurrencyFormat;
use crate::records::TransactionRecord;
use crate::stats;

pub const DEGRADED_MESSAGE: &str = "Sorry, I couldn't analyze your finances right now. Please try again in a moment.";
const EMPTY_HISTORY_MESSAGE: &str =
    "You don't have any transactions yet. Start by adding some income or expense transactions!";
const TOP_GROUPS: usize = 5;

/// What the user asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum InsightRequest {
    Preset(InsightPreset),
    Query(String),
}

pub struct InsightService {
    model: Arc<dyn LanguageModel>,
    currency: CurrencyFormat,
    /// Read a chart and recommendations out of JSON-shaped model answers.
    chart_hints: bool,
}

fn as_number(amount: Decimal) -> f64 {
    amount.round_dp(2).to_f64().unwrap_or_default()
}

fn no_transactions_insight() -> Insight {
    Insight {
        insight: EMPTY_HISTORY_MESSAGE.to_string(),
        chart: None,
        recommendations: vec![
            "Add your first transaction to get started".to_string(),
            "Track both income and expenses".to_string(),
            "Be consistent with your entries".to_string(),
        ],
    }
}

fn degraded_insight() -> Insight {
    Insight {
        insight: DEGRADED_MESSAGE.to_string(),
        chart: None,
        recommendations: Vec::new(),
    }
}

fn single_series(kind: ChartKind, title: &str, label: &str, labels: Vec<String>, data: Vec<f64>) -> ChartSpec {
    ChartSpec {
        kind,
        title: title.to_string(),
        labels,
        datasets: vec![ChartDataset {
            label: label.to_string(),
            data,
        }],
    }
}

/// Expense totals per category name, falling back to the merchant and then
/// `Other`, largest first.
pub fn spending_groups(transactions: &[TransactionRecord]) -> Vec<(String, Decimal)> {
    let mut totals: HashMap<String, Decimal> = HashMap::new();
    for record in transactions.iter().filter(|r| r.is_expense()) {
        let group = record
            .category
            .clone()
            .or_else(|| record.merchant.clone())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "Other".to_string());
        *totals.entry(group).or_default() += record.amount;
    }

    let mut groups: Vec<(String, Decimal)> = totals.into_iter().collect();
    groups.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    groups
}

/// Expense totals per day, oldest first.
pub fn daily_spending(transactions: &[TransactionRecord]) -> Vec<(NaiveDate, Decimal)> {
    let mut days: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for record in transactions.iter().filter(|r| r.is_expense()) {
        *days.entry(record.occurred_on).or_default() += record.amount;
    }
    days.into_iter().collect()
}

/// Reads `{insight, chart?, recommendations?}` out of a model answer that is
/// a JSON object, optionally fenced. Anything else is not a hint.
fn parse_hinted_answer(answer: &str) -> Option<Insight> {
    let value: Value = serde_json::from_str(strip_code_fence(answer)).ok()?;
    let insight = value.get("insight")?.as_str()?.trim().to_string();
    if insight.is_empty() {
        return None;
    }

    let chart = value
        .get("chart")
        .filter(|chart| !chart.is_null())
        .and_then(|chart| serde_json::from_value::<ChartSpec>(chart.clone()).ok());
    let recommendations = value
        .get("recommendations")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    Some(Insight {
        insight,
        chart,
        recommendations,
    })
}

impl InsightService {
    pub fn new(model: Arc<dyn LanguageModel>, currency: CurrencyFormat, chart_hints: bool) -> Self {
        Self {
            model,
            currency,
            chart_hints,
        }
    }

    /// Answers a preset or a question about `transactions` (most recent
    /// first). Never fails.
    #[instrument(skip(self, transactions), fields(count = transactions.len()))]
    pub async fn answer(&self, request: &InsightRequest, transactions: &[TransactionRecord]) -> Insight {
        if transactions.is_empty() {
            return no_transactions_insight();
        }

        match request {
            InsightRequest::Preset(preset) => self.preset(*preset, transactions),
            InsightRequest::Query(query) => self.query(query, transactions).await,
        }
    }

    pub fn preset(&self, preset: InsightPreset, transactions: &[TransactionRecord]) -> Insight {
        debug!(?preset, "Computing preset insight");
        match preset {
            InsightPreset::Overview => self.overview(transactions),
            InsightPreset::Spending => self.spending(transactions),
            InsightPreset::Trends => self.trends(transactions),
        }
    }

    fn overview(&self, transactions: &[TransactionRecord]) -> Insight {
        let (income, expense) = stats::totals(transactions);
        let balance = income - expense;
        let positive = balance > Decimal::ZERO;

        Insight {
            insight: format!(
                "Your financial overview: You've earned {} and spent {}, leaving you with a balance of {}. {}",
                self.currency.format(income),
                self.currency.format(expense),
                self.currency.format(balance),
                if positive {
                    "Great job staying positive!"
                } else {
                    "Consider ways to reduce expenses or increase income."
                }
            ),
            chart: Some(single_series(
                ChartKind::Doughnut,
                "Income vs Expenses",
                "Amount",
                vec!["Income".to_string(), "Expenses".to_string()],
                vec![as_number(income), as_number(expense)],
            )),
            recommendations: vec![
                "Track all transactions consistently".to_string(),
                if positive {
                    "Keep up the good work!".to_string()
                } else {
                    "Look for areas to cut back".to_string()
                },
                "Set monthly budgets for different categories".to_string(),
            ],
        }
    }

    fn spending(&self, transactions: &[TransactionRecord]) -> Insight {
        let groups: Vec<(String, Decimal)> = spending_groups(transactions).into_iter().take(TOP_GROUPS).collect();

        let insight = match groups.first() {
            Some((name, total)) => format!(
                "Your top spending category is {} with {}. This represents a significant portion of your expenses.",
                name,
                self.currency.format(*total)
            ),
            None => "You haven't recorded any expenses yet.".to_string(),
        };
        let top = groups.first().map_or("top", |(name, _)| name.as_str());
        let recommendations = vec![
            format!("Review your {top} spending for potential savings"),
            "Set category-specific budgets".to_string(),
            "Track recurring expenses carefully".to_string(),
        ];

        Insight {
            insight,
            chart: Some(single_series(
                ChartKind::Bar,
                "Top 5 Spending Categories",
                "Amount Spent",
                groups.iter().map(|(name, _)| name.clone()).collect(),
                groups.iter().map(|(_, total)| as_number(*total)).collect(),
            )),
            recommendations,
        }
    }

    fn trends(&self, transactions: &[TransactionRecord]) -> Insight {
        let days = daily_spending(transactions);
        let average = if days.is_empty() {
            Decimal::ZERO
        } else {
            days.iter().map(|(_, total)| *total).sum::<Decimal>() / Decimal::from(days.len())
        };

        let mut distinct: Vec<Decimal> = days.iter().map(|(_, total)| *total).collect();
        distinct.sort();
        distinct.dedup();
        let consistent = (distinct.len() as f64) < days.len() as f64 * 0.3;

        Insight {
            insight: format!(
                "Your average daily spending is {}. {}",
                self.currency.format(average),
                if consistent {
                    "Your spending has been relatively consistent."
                } else {
                    "Your spending varies significantly day to day."
                }
            ),
            chart: Some(single_series(
                ChartKind::Line,
                "Spending Trend Over Time",
                "Daily Spending",
                days.iter().map(|(day, _)| day.format("%Y-%m-%d").to_string()).collect(),
                days.iter().map(|(_, total)| as_number(*total)).collect(),
            )),
            recommendations: vec![
                "Monitor daily spending to stay on track".to_string(),
                "Look for patterns in high-spending days".to_string(),
                "Consider setting daily spending limits".to_string(),
            ],
        }
    }

    async fn query(&self, query: &str, transactions: &[TransactionRecord]) -> Insight {
        let answer = match self.model.summarize(query, transactions).await {
            Ok(answer) => answer,
            Err(err) => {
                warn!(%err, "Insight query failed, answering with the fallback message");
                return degraded_insight();
            }
        };

        if self.chart_hints {
            if let Some(insight) = parse_hinted_answer(&answer) {
                return insight;
            }
        }

        Insight {
            insight: answer.trim().to_string(),
            chart: None,
            recommendations: Vec::new(),
        }
    }
}

/// Queries offered to the user, with the preset that answers each locally
/// when there is one.
pub fn suggestions() -> Vec<QuerySuggestion> {
    [
        ("How am I doing financially?", Some(InsightPreset::Overview)),
        ("Where am I spending the most?", Some(InsightPreset::Spending)),
        ("Show me my spending trends", Some(InsightPreset::Trends)),
        ("Compare my coffee vs restaurant spending", None),
        ("What are my top 5 expenses this month?", None),
        ("Am I spending more than I earn?", None),
    ]
    .into_iter()
    .map(|(query, preset)| QuerySuggestion {
        query: query.to_string(),
        preset,
    })
    .collect()
}
