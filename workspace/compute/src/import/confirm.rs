use common::{CandidateTransaction, ConfirmImportRequest};
use model::entities::transaction;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set, TransactionTrait};
use tracing::{info, instrument, warn};

use super::{ImportError, PreviewStore, StoredPreview};
use crate::duplicates::{DuplicatePolicy, flag_duplicates};

/// Which rows of the pending preview to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmOptions {
    pub skip_duplicates: bool,
    /// Indices into the preview; every row when `None`.
    pub selected: Option<Vec<usize>>,
}

impl Default for ConfirmOptions {
    fn default() -> Self {
        Self {
            skip_duplicates: true,
            selected: None,
        }
    }
}

impl From<ConfirmImportRequest> for ConfirmOptions {
    fn from(request: ConfirmImportRequest) -> Self {
        Self {
            skip_duplicates: request.skip_duplicates,
            selected: request.selected,
        }
    }
}

fn active_model(user_id: i32, candidate: CandidateTransaction) -> transaction::ActiveModel {
    transaction::ActiveModel {
        user_id: Set(user_id),
        kind: Set(candidate.kind.into()),
        amount: Set(candidate.amount),
        occurred_on: Set(candidate.occurred_on),
        merchant: Set(candidate.merchant),
        note: Set(candidate.note),
        payment_method: Set(candidate.payment_method),
        category_id: Set(candidate.category_id),
        ..Default::default()
    }
}

/// Persists the user's pending preview and consumes it.
///
/// The preview is taken out of the store first, so two concurrent confirms
/// cannot both import it. Duplicates are re-checked against the current
/// state of the store before inserting. All rows go in within one database
/// transaction; if that fails, or a selected index is out of range, the
/// preview is put back so the user can retry.
#[instrument(skip(db, store, policy, options))]
pub async fn confirm_preview(
    db: &DatabaseConnection,
    store: &PreviewStore,
    policy: &DuplicatePolicy,
    user_id: i32,
    options: ConfirmOptions,
) -> Result<Vec<transaction::Model>, ImportError> {
    let preview = store.take(user_id).await.ok_or(ImportError::NoPreview)?;

    if let Some(selected) = &options.selected {
        let len = preview.transactions.len();
        if let Some(&index) = selected.iter().find(|&&index| index >= len) {
            store.put(user_id, preview).await;
            return Err(ImportError::InvalidSelection { index, len });
        }
    }

    match insert_rows(db, policy, user_id, &preview, &options).await {
        Ok(created) => {
            info!("Imported {} of {} previewed transactions", created.len(), preview.transactions.len());
            Ok(created)
        }
        Err(err) => {
            warn!(%err, "Import confirmation failed, keeping the preview");
            store.put(user_id, preview).await;
            Err(err)
        }
    }
}

async fn insert_rows(
    db: &DatabaseConnection,
    policy: &DuplicatePolicy,
    user_id: i32,
    preview: &StoredPreview,
    options: &ConfirmOptions,
) -> Result<Vec<transaction::Model>, ImportError> {
    let mut rows: Vec<CandidateTransaction> = match &options.selected {
        Some(selected) => {
            let mut indices = selected.clone();
            indices.sort_unstable();
            indices.dedup();
            indices.into_iter().map(|i| preview.transactions[i].clone()).collect()
        }
        None => preview.transactions.clone(),
    };

    let txn = db.begin().await?;
    flag_duplicates(&txn, user_id, &mut rows, policy).await?;

    let mut created = Vec::with_capacity(rows.len());
    for row in rows {
        if options.skip_duplicates && row.duplicate {
            continue;
        }
        created.push(active_model(user_id, row).insert(&txn).await?);
    }
    txn.commit().await?;

    Ok(created)
}
