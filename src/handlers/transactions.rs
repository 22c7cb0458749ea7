use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{NaiveDate, NaiveDateTime};
use common::TransactionKind;
use model::entities::{category, transaction};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, ModelTrait, PaginatorTrait, QuerySelect, Set};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Request body for creating a transaction
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateTransactionRequest {
    /// `income` or `expense`
    pub kind: TransactionKind,
    /// Positive amount with at most two decimals
    #[schema(value_type = String, example = "12.50")]
    pub amount: Decimal,
    pub occurred_on: NaiveDate,
    #[validate(length(max = 100))]
    pub merchant: Option<String>,
    #[validate(length(max = 500))]
    pub note: Option<String>,
    #[validate(length(max = 50))]
    pub payment_method: Option<String>,
    pub category_id: Option<i32>,
}

/// Request body for updating a transaction; absent fields are left as is
#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateTransactionRequest {
    pub kind: Option<TransactionKind>,
    #[schema(value_type = Option<String>, example = "12.50")]
    pub amount: Option<Decimal>,
    pub occurred_on: Option<NaiveDate>,
    #[validate(length(max = 100))]
    pub merchant: Option<String>,
    #[validate(length(max = 500))]
    pub note: Option<String>,
    #[validate(length(max = 50))]
    pub payment_method: Option<String>,
    /// A category ID, or `null` to leave the transaction uncategorized
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<i32>)]
    pub category_id: Option<Option<i32>>,
}

/// `Some(None)` for an explicit `null`; absent fields stay `None` through
/// `#[serde(default)]`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Transaction response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    pub id: i32,
    pub kind: TransactionKind,
    #[schema(value_type = String, example = "12.50")]
    pub amount: Decimal,
    pub occurred_on: NaiveDate,
    pub merchant: Option<String>,
    pub note: Option<String>,
    pub payment_method: Option<String>,
    pub category_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<transaction::Model> for TransactionResponse {
    fn from(model: transaction::Model) -> Self {
        Self {
            id: model.id,
            kind: model.kind.into(),
            amount: model.amount,
            occurred_on: model.occurred_on,
            merchant: model.merchant,
            note: model.note,
            payment_method: model.payment_method,
            category_id: model.category_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Query parameters for listing transactions
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct TransactionListQuery {
    /// Earliest date, inclusive
    pub start_date: Option<NaiveDate>,
    /// Latest date, inclusive
    pub end_date: Option<NaiveDate>,
    pub kind: Option<TransactionKind>,
    pub category_id: Option<i32>,
    /// Page size (default: 20)
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    /// Rows to skip (default: 0)
    pub offset: Option<u64>,
}

/// One page of transactions, most recent first
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransactionPage {
    pub items: Vec<TransactionResponse>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

/// Positive and rounded to cents.
fn checked_amount(amount: Decimal) -> ApiResult<Decimal> {
    let amount = amount.round_dp(2);
    if amount <= Decimal::ZERO {
        return Err(ApiError::Validation("amount must be greater than 0".to_string()));
    }
    Ok(amount)
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Only system categories and the user's own may be attached.
pub(crate) async fn ensure_category_visible<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    category_id: i32,
) -> ApiResult<()> {
    match category::Entity::find_by_id(category_id).one(db).await? {
        Some(found) if found.is_visible_to(user_id) => Ok(()),
        _ => {
            warn!("User {} referenced unavailable category {}", user_id, category_id);
            Err(ApiError::Validation(format!("Category with ID {category_id} does not exist")))
        }
    }
}

async fn load_owned(state: &AppState, user_id: i32, transaction_id: i32) -> ApiResult<transaction::Model> {
    transaction::Entity::find_owned(&state.db, user_id, transaction_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Transaction", transaction_id))
}

/// Create a new transaction
#[utoipa::path(
    post,
    path = "/api/v1/transactions",
    tag = "transactions",
    security(("bearer_auth" = [])),
    request_body = CreateTransactionRequest,
    responses(
        (status = 201, description = "Transaction created successfully", body = ApiResponse<TransactionResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn create_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateTransactionRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<TransactionResponse>>)> {
    trace!("Entering create_transaction function");
    request.validate()?;
    let amount = checked_amount(request.amount)?;

    if let Some(category_id) = request.category_id {
        ensure_category_visible(&state.db, auth.id, category_id).await?;
    }

    let new_transaction = transaction::ActiveModel {
        user_id: Set(auth.id),
        kind: Set(request.kind.into()),
        amount: Set(amount),
        occurred_on: Set(request.occurred_on),
        merchant: Set(trimmed(request.merchant)),
        note: Set(trimmed(request.note)),
        payment_method: Set(trimmed(request.payment_method)),
        category_id: Set(request.category_id),
        ..Default::default()
    };

    let created = new_transaction.insert(&state.db).await?;
    info!("Transaction created with ID: {}", created.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(TransactionResponse::from(created), "Transaction created successfully")),
    ))
}

/// List the current user's transactions
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(TransactionListQuery),
    responses(
        (status = 200, description = "Transactions retrieved successfully", body = ApiResponse<TransactionPage>,
            headers(("x-total-count" = u64, description = "Number of matching transactions"))),
        (status = 400, description = "Invalid query parameters", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn list_transactions(
    State(state): State<AppState>,
    auth: AuthUser,
    Valid(Query(query)): Valid<Query<TransactionListQuery>>,
) -> ApiResult<([(&'static str, String); 1], Json<ApiResponse<TransactionPage>>)> {
    trace!("Entering list_transactions function");
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);

    let filter = transaction::TransactionFilter {
        start_date: query.start_date,
        end_date: query.end_date,
        kind: query.kind.map(Into::into),
        category_id: query.category_id,
    };
    let select = transaction::Entity::find_for_user(auth.id, &filter);

    let total = select.clone().count(&state.db).await?;
    let items = select.offset(offset).limit(limit).all(&state.db).await?;
    debug!("Returning {} of {} transactions", items.len(), total);

    let page = TransactionPage {
        items: items.into_iter().map(TransactionResponse::from).collect(),
        total,
        limit,
        offset,
    };
    Ok((
        [(TOTAL_COUNT_HEADER, total.to_string())],
        Json(ApiResponse::ok(page, "Transactions retrieved successfully")),
    ))
}

/// Get a single transaction
#[utoipa::path(
    get,
    path = "/api/v1/transactions/{transaction_id}",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(("transaction_id" = i32, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Transaction found", body = ApiResponse<TransactionResponse>),
        (status = 404, description = "Transaction not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(transaction_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<TransactionResponse>>> {
    trace!("Entering get_transaction function");
    let found = load_owned(&state, auth.id, transaction_id).await?;
    Ok(Json(ApiResponse::ok(TransactionResponse::from(found), "Transaction retrieved successfully")))
}

/// Update a transaction
#[utoipa::path(
    put,
    path = "/api/v1/transactions/{transaction_id}",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(("transaction_id" = i32, Path, description = "Transaction ID")),
    request_body = UpdateTransactionRequest,
    responses(
        (status = 200, description = "Transaction updated successfully", body = ApiResponse<TransactionResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Transaction not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn update_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(transaction_id): Path<i32>,
    Json(request): Json<UpdateTransactionRequest>,
) -> ApiResult<Json<ApiResponse<TransactionResponse>>> {
    trace!("Entering update_transaction function");
    request.validate()?;

    let mut active: transaction::ActiveModel = load_owned(&state, auth.id, transaction_id).await?.into();

    if let Some(kind) = request.kind {
        active.kind = Set(kind.into());
    }
    if let Some(amount) = request.amount {
        active.amount = Set(checked_amount(amount)?);
    }
    if let Some(occurred_on) = request.occurred_on {
        active.occurred_on = Set(occurred_on);
    }
    if request.merchant.is_some() {
        active.merchant = Set(trimmed(request.merchant));
    }
    if request.note.is_some() {
        active.note = Set(trimmed(request.note));
    }
    if request.payment_method.is_some() {
        active.payment_method = Set(trimmed(request.payment_method));
    }
    match request.category_id {
        Some(Some(category_id)) => {
            ensure_category_visible(&state.db, auth.id, category_id).await?;
            active.category_id = Set(Some(category_id));
        }
        Some(None) => active.category_id = Set(None),
        None => {}
    }

    let updated = active.update(&state.db).await?;
    info!("Transaction {} updated", transaction_id);
    Ok(Json(ApiResponse::ok(TransactionResponse::from(updated), "Transaction updated successfully")))
}

/// Delete a transaction
#[utoipa::path(
    delete,
    path = "/api/v1/transactions/{transaction_id}",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(("transaction_id" = i32, Path, description = "Transaction ID")),
    responses(
        (status = 204, description = "Transaction deleted successfully"),
        (status = 404, description = "Transaction not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(transaction_id): Path<i32>,
) -> ApiResult<StatusCode> {
    trace!("Entering delete_transaction function");
    let found = load_owned(&state, auth.id, transaction_id).await?;
    found.delete(&state.db).await?;

    info!("Transaction {} deleted", transaction_id);
    Ok(StatusCode::NO_CONTENT)
}
