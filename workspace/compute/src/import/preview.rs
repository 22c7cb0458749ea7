use chrono::{DateTime, Utc};
use common::{CandidateTransaction, ImportMethod, ImportPreview};
use moka::future::Cache;
use std::time::Duration;
use tracing::debug;

/// Default lifetime of a pending preview.
pub const DEFAULT_PREVIEW_TTL: Duration = Duration::from_secs(15 * 60);

/// An extracted statement waiting for its owner to confirm it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPreview {
    pub method: ImportMethod,
    pub transactions: Vec<CandidateTransaction>,
    pub created_at: DateTime<Utc>,
}

impl StoredPreview {
    pub fn new(method: ImportMethod, transactions: Vec<CandidateTransaction>) -> Self {
        Self {
            method,
            transactions,
            created_at: Utc::now(),
        }
    }

    pub fn duplicate_count(&self) -> usize {
        self.transactions.iter().filter(|t| t.duplicate).count()
    }

    /// Public view, keeping at most `limit` candidates. Counts always cover
    /// the whole preview.
    pub fn to_preview(&self, limit: Option<usize>) -> ImportPreview {
        let shown = limit.unwrap_or(self.transactions.len());
        ImportPreview {
            method: self.method,
            transactions: self.transactions.iter().take(shown).cloned().collect(),
            total_count: self.transactions.len(),
            duplicate_count: self.duplicate_count(),
        }
    }
}

/// Pending previews keyed by user id. Each user has at most one; storing a
/// new one replaces the old. Entries expire after the configured TTL.
#[derive(Clone)]
pub struct PreviewStore {
    cache: Cache<i32, StoredPreview>,
    ttl: Duration,
}

impl PreviewStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().time_to_live(ttl).build(),
            ttl,
        }
    }

    fn is_expired(&self, preview: &StoredPreview) -> bool {
        (Utc::now() - preview.created_at)
            .to_std()
            .is_ok_and(|age| age >= self.ttl)
    }

    pub async fn put(&self, user_id: i32, preview: StoredPreview) {
        debug!("Storing import preview of {} rows for user {}", preview.transactions.len(), user_id);
        self.cache.insert(user_id, preview).await;
    }

    pub async fn get(&self, user_id: i32) -> Option<StoredPreview> {
        self.cache.get(&user_id).await
    }

    /// Removes and returns the preview, so only one caller can consume it.
    pub async fn take(&self, user_id: i32) -> Option<StoredPreview> {
        // An expired entry may still be sitting in the cache until eviction runs.
        self.cache
            .remove(&user_id)
            .await
            .filter(|preview| !self.is_expired(preview))
    }

    /// Drops the preview; `false` when there was none.
    pub async fn discard(&self, user_id: i32) -> bool {
        self.take(user_id).await.is_some()
    }
}

impl Default for PreviewStore {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_TTL)
    }
}
