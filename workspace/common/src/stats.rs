use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ===================== Statistics =====================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct StatsSummary {
    pub income: Decimal,
    pub expense: Decimal,
    pub net: Decimal,
    pub transaction_count: usize,
}

/// Expense total for one category name.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct CategoryTotal {
    pub category: String,
    pub total: Decimal,
}

/// Bucket width for date statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DateBucket {
    #[default]
    Day,
    Week,
    Month,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct DateBucketTotal {
    /// First day of the bucket.
    pub bucket: NaiveDate,
    pub income: Decimal,
    pub expense: Decimal,
    pub net: Decimal,
}
