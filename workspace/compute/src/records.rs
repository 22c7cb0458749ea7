use chrono::NaiveDate;
use common::TransactionKind;
use model::entities::{category, transaction};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, EntityTrait, QuerySelect};
use tracing::{debug, instrument};

use crate::error::Result;

/// A stored transaction joined with its category name, the shape the
/// statistics and insight code work on.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub id: i32,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub occurred_on: NaiveDate,
    pub merchant: Option<String>,
    pub note: Option<String>,
    pub payment_method: Option<String>,
    pub category: Option<String>,
}

impl TransactionRecord {
    pub fn from_model(model: transaction::Model, category: Option<category::Model>) -> Self {
        Self {
            id: model.id,
            kind: model.kind.into(),
            amount: model.amount,
            occurred_on: model.occurred_on,
            merchant: model.merchant,
            note: model.note,
            payment_method: model.payment_method,
            category: category.map(|c| c.name),
        }
    }

    pub fn is_expense(&self) -> bool {
        self.kind == TransactionKind::Expense
    }

    pub fn is_income(&self) -> bool {
        self.kind == TransactionKind::Income
    }
}

/// Loads a user's transactions in the optional date range, most recent first.
///
/// `limit` caps how many rows are read; the insight service uses it to keep
/// prompts bounded.
#[instrument(skip(db))]
pub async fn load_records<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    limit: Option<u64>,
) -> Result<Vec<TransactionRecord>> {
    let filter = transaction::TransactionFilter::between(start_date, end_date);
    let mut query = transaction::Entity::find_for_user(user_id, &filter);
    if let Some(limit) = limit {
        query = query.limit(limit);
    }

    let rows = query.find_also_related(category::Entity).all(db).await?;
    debug!("Loaded {} transaction records for user {}", rows.len(), user_id);

    Ok(rows
        .into_iter()
        .map(|(model, category)| TransactionRecord::from_model(model, category))
        .collect())
}
