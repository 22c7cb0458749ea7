use chrono::{Datelike, Duration, NaiveDate};
use common::{CategoryTotal, DateBucket, DateBucketTotal, StatsSummary};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument};

use crate::records::TransactionRecord;

const UNCATEGORIZED: &str = "Uncategorized";

/// Income, expense and net totals.
#[instrument(skip(records), fields(num_records = records.len()))]
pub fn summarize(records: &[TransactionRecord]) -> StatsSummary {
    let (income, expense) = totals(records);
    StatsSummary {
        income,
        expense,
        net: income - expense,
        transaction_count: records.len(),
    }
}

pub(crate) fn totals(records: &[TransactionRecord]) -> (Decimal, Decimal) {
    records.iter().fold((Decimal::ZERO, Decimal::ZERO), |(income, expense), record| {
        if record.is_income() {
            (income + record.amount, expense)
        } else {
            (income, expense + record.amount)
        }
    })
}

/// Expense totals per category name, largest first.
#[instrument(skip(records), fields(num_records = records.len()))]
pub fn expenses_by_category(records: &[TransactionRecord]) -> Vec<CategoryTotal> {
    let mut by_category: HashMap<&str, Decimal> = HashMap::new();
    for record in records.iter().filter(|r| r.is_expense()) {
        let name = record.category.as_deref().unwrap_or(UNCATEGORIZED);
        *by_category.entry(name).or_insert(Decimal::ZERO) += record.amount;
    }

    let mut totals: Vec<CategoryTotal> = by_category
        .into_iter()
        .map(|(category, total)| CategoryTotal {
            category: category.to_string(),
            total,
        })
        .collect();
    totals.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category)));
    debug!("Computed {} category totals", totals.len());
    totals
}

/// First day of the bucket `date` falls in. Weeks start on Monday.
pub fn bucket_start(date: NaiveDate, bucket: DateBucket) -> NaiveDate {
    match bucket {
        DateBucket::Day => date,
        DateBucket::Week => date - Duration::days(date.weekday().num_days_from_monday() as i64),
        DateBucket::Month => date.with_day(1).unwrap_or(date),
    }
}

/// Income and expense totals per date bucket, oldest bucket first.
#[instrument(skip(records), fields(num_records = records.len()))]
pub fn totals_by_date(records: &[TransactionRecord], bucket: DateBucket) -> Vec<DateBucketTotal> {
    let mut buckets: BTreeMap<NaiveDate, (Decimal, Decimal)> = BTreeMap::new();
    for record in records {
        let entry = buckets
            .entry(bucket_start(record.occurred_on, bucket))
            .or_insert((Decimal::ZERO, Decimal::ZERO));
        if record.is_income() {
            entry.0 += record.amount;
        } else {
            entry.1 += record.amount;
        }
    }

    buckets
        .into_iter()
        .map(|(bucket, (income, expense))| DateBucketTotal {
            bucket,
            income,
            expense,
            net: income - expense,
        })
        .collect()
}
