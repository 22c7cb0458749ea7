use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::NaiveDate;
use common::{CategoryTotal, DateBucket, DateBucketTotal, StatsSummary};
use compute::records::{TransactionRecord, load_records};
use compute::stats;
use serde::Deserialize;
use tracing::{debug, instrument};
use utoipa::IntoParams;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Date range shared by the statistics endpoints
#[derive(Debug, Deserialize, IntoParams)]
pub struct StatsQuery {
    /// Earliest date, inclusive
    pub start_date: Option<NaiveDate>,
    /// Latest date, inclusive
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ByDateQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// `day` (default), `week` or `month`
    pub bucket: Option<DateBucket>,
}

async fn records_in_range(
    state: &AppState,
    user_id: i32,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> ApiResult<Vec<TransactionRecord>> {
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if start > end {
            return Err(ApiError::Validation(
                "start_date must be before or equal to end_date".to_string(),
            ));
        }
    }
    let records = load_records(&state.db, user_id, start_date, end_date, None).await?;
    debug!("Loaded {} transactions for statistics", records.len());
    Ok(records)
}

/// Income, expense and net totals
#[utoipa::path(
    get,
    path = "/api/v1/stats/summary",
    tag = "stats",
    security(("bearer_auth" = [])),
    params(StatsQuery),
    responses(
        (status = 200, description = "Summary computed", body = ApiResponse<StatsSummary>),
        (status = 400, description = "Invalid date range", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn summary(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<ApiResponse<StatsSummary>>> {
    let records = records_in_range(&state, auth.id, query.start_date, query.end_date).await?;
    Ok(Json(ApiResponse::ok(stats::summarize(&records), "Summary computed successfully")))
}

/// Expense totals per category
#[utoipa::path(
    get,
    path = "/api/v1/stats/by-category",
    tag = "stats",
    security(("bearer_auth" = [])),
    params(StatsQuery),
    responses(
        (status = 200, description = "Category totals computed", body = ApiResponse<Vec<CategoryTotal>>),
        (status = 400, description = "Invalid date range", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn by_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<ApiResponse<Vec<CategoryTotal>>>> {
    let records = records_in_range(&state, auth.id, query.start_date, query.end_date).await?;
    Ok(Json(ApiResponse::ok(
        stats::expenses_by_category(&records),
        "Category totals computed successfully",
    )))
}

/// Income and expense totals per day, week or month
#[utoipa::path(
    get,
    path = "/api/v1/stats/by-date",
    tag = "stats",
    security(("bearer_auth" = [])),
    params(ByDateQuery),
    responses(
        (status = 200, description = "Date totals computed", body = ApiResponse<Vec<DateBucketTotal>>),
        (status = 400, description = "Invalid query parameters", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn by_date(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ByDateQuery>,
) -> ApiResult<Json<ApiResponse<Vec<DateBucketTotal>>>> {
    let records = records_in_range(&state, auth.id, query.start_date, query.end_date).await?;
    let bucket = query.bucket.unwrap_or_default();
    Ok(Json(ApiResponse::ok(
        stats::totals_by_date(&records, bucket),
        "Date totals computed successfully",
    )))
}
