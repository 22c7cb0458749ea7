//! Flags candidate transactions that look like ones already stored.

use chrono::Days;
use common::CandidateTransaction;
use model::entities::transaction;
use rust_decimal::Decimal;
use sea_orm::ConnectionTrait;
use tracing::{debug, instrument};

use crate::error::Result;

/// How close a candidate must be to a stored transaction to count as the
/// same one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicatePolicy {
    pub date_tolerance_days: i64,
    pub amount_tolerance: Decimal,
    /// Compare merchants case-insensitively. A missing merchant on either
    /// side matches anything.
    pub compare_merchant: bool,
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        Self {
            date_tolerance_days: 0,
            amount_tolerance: Decimal::ZERO,
            compare_merchant: true,
        }
    }
}

fn normalize_merchant(merchant: &str) -> String {
    merchant.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

impl DuplicatePolicy {
    /// Negative tolerances count as zero.
    fn tolerance_days(&self) -> u64 {
        self.date_tolerance_days.max(0).unsigned_abs()
    }

    pub fn is_duplicate(&self, candidate: &CandidateTransaction, existing: &transaction::Model) -> bool {
        let days_apart = (candidate.occurred_on - existing.occurred_on).num_days().unsigned_abs();
        if days_apart > self.tolerance_days() {
            return false;
        }
        if (candidate.amount - existing.amount).abs() > self.amount_tolerance {
            return false;
        }
        if common::TransactionKind::from(existing.kind) != candidate.kind {
            return false;
        }

        match (&candidate.merchant, &existing.merchant) {
            (Some(a), Some(b)) if self.compare_merchant => normalize_merchant(a) == normalize_merchant(b),
            _ => true,
        }
    }
}

/// Sets the `duplicate` flag on every candidate that matches a stored
/// transaction of `user_id`. Nothing is removed.
#[instrument(skip(db, candidates, policy), fields(count = candidates.len()))]
pub async fn flag_duplicates<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    candidates: &mut [CandidateTransaction],
    policy: &DuplicatePolicy,
) -> Result<usize> {
    let (Some(first), Some(last)) = (
        candidates.iter().map(|c| c.occurred_on).min(),
        candidates.iter().map(|c| c.occurred_on).max(),
    ) else {
        return Ok(0);
    };

    // A window past the calendar's range is left open on that side.
    let tolerance = Days::new(policy.tolerance_days());
    let filter = transaction::TransactionFilter::between(
        first.checked_sub_days(tolerance),
        last.checked_add_days(tolerance),
    );
    let existing = transaction::Entity::find_for_user(user_id, &filter).all(db).await?;

    let mut flagged = 0;
    for candidate in candidates.iter_mut() {
        candidate.duplicate = existing.iter().any(|stored| policy.is_duplicate(candidate, stored));
        if candidate.duplicate {
            flagged += 1;
        }
    }

    debug!(
        "Flagged {} of {} candidates against {} stored transactions",
        flagged,
        candidates.len(),
        existing.len()
    );
    Ok(flagged)
}
