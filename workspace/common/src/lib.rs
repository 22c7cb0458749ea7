//! Common transport-layer types shared between the backend and API clients.
//! These structs are the payloads the compute pipelines produce and the
//! handlers return, so clients can deserialize responses without
//! duplicating shapes.

mod imports;
mod insights;
mod receipts;
mod stats;
mod transactions;

pub use imports::{CandidateTransaction, ConfirmImportRequest, ImportMethod, ImportPreview};
pub use insights::{ChartDataset, ChartKind, ChartSpec, Insight, InsightPreset, QuerySuggestion};
pub use receipts::{ReceiptCandidate, ReceiptExtraction, ReceiptMethod};
pub use stats::{CategoryTotal, DateBucket, DateBucketTotal, StatsSummary};
pub use transactions::TransactionKind;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Generic API response wrapper.
/// Note: The backend has its own definition in finsight/src/schemas.rs with
/// the same field names. We mirror it here for clients to reuse.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success flag
    pub success: bool,
}
