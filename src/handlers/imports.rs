use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Json,
};
use common::{CandidateTransaction, ConfirmImportRequest, ImportMethod, ImportPreview};
use compute::duplicates::flag_duplicates;
use compute::import::{ConfirmOptions, StoredPreview, confirm_preview};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;

use super::transactions::TransactionResponse;
use super::upload::{FileUpload, read_file};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Candidates returned inline by the upload; the rest stay in the preview.
pub const UPLOAD_PREVIEW_LIMIT: usize = 10;

/// Result of parsing an uploaded statement
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ImportUploadResponse {
    pub success: bool,
    pub method: ImportMethod,
    pub message: String,
    /// The first candidates of the preview
    pub transactions: Vec<CandidateTransaction>,
    pub total_count: usize,
    pub duplicate_count: usize,
}

/// Result of confirming the pending preview
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConfirmImportResponse {
    pub imported: usize,
    pub transactions: Vec<TransactionResponse>,
}

fn no_preview() -> ApiError {
    ApiError::NotFound("No import preview found".to_string())
}

/// Parse a PDF bank statement into a pending import preview
#[utoipa::path(
    post,
    path = "/api/v1/imports/bank-statement",
    tag = "imports",
    security(("bearer_auth" = [])),
    request_body(content = FileUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Statement parsed", body = ApiResponse<ImportUploadResponse>),
        (status = 400, description = "Missing or empty file", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 415, description = "Only PDF files are supported", body = ErrorResponse),
        (status = 422, description = "No transactions could be extracted", body = ErrorResponse)
    )
)]
#[instrument(skip(state, multipart))]
pub async fn upload_bank_statement(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<ApiResponse<ImportUploadResponse>>> {
    trace!("Entering upload_bank_statement function");
    let upload = read_file(&mut multipart, state.settings.max_statement_bytes).await?;

    let is_pdf = upload
        .file_name
        .as_deref()
        .is_some_and(|name| name.to_lowercase().ends_with(".pdf"));
    if !is_pdf {
        warn!("Rejected statement upload {:?}", upload.file_name);
        return Err(ApiError::UnsupportedMediaType("Only PDF files are supported".to_string()));
    }

    let result = state.importer.import(upload.bytes).await?;
    let mut transactions = result.transactions;
    let duplicates = flag_duplicates(&state.db, auth.id, &mut transactions, &state.duplicate_policy()).await?;
    debug!("{} of {} candidates look like duplicates", duplicates, transactions.len());

    let stored = StoredPreview::new(result.method, transactions);
    let preview = stored.to_preview(Some(UPLOAD_PREVIEW_LIMIT));
    state.previews.put(auth.id, stored).await;

    info!(
        "Stored import preview for user {}: {} transactions via {}",
        auth.id,
        preview.total_count,
        result.method.as_str()
    );
    let response = ImportUploadResponse {
        success: true,
        method: preview.method,
        message: result.message,
        transactions: preview.transactions,
        total_count: preview.total_count,
        duplicate_count: preview.duplicate_count,
    };
    Ok(Json(ApiResponse::ok(response, "Statement parsed successfully")))
}

/// Get the full pending import preview
#[utoipa::path(
    get,
    path = "/api/v1/imports/preview",
    tag = "imports",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Pending preview", body = ApiResponse<ImportPreview>),
        (status = 404, description = "No preview pending", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_preview(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<ImportPreview>>> {
    let stored = state.previews.get(auth.id).await.ok_or_else(no_preview)?;
    Ok(Json(ApiResponse::ok(stored.to_preview(None), "Preview retrieved successfully")))
}

/// Discard the pending import preview
#[utoipa::path(
    delete,
    path = "/api/v1/imports/preview",
    tag = "imports",
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Preview discarded"),
        (status = 404, description = "No preview pending", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn discard_preview(State(state): State<AppState>, auth: AuthUser) -> ApiResult<StatusCode> {
    if !state.previews.discard(auth.id).await {
        return Err(no_preview());
    }
    info!("Import preview discarded for user {}", auth.id);
    Ok(StatusCode::NO_CONTENT)
}

/// Import the pending preview
///
/// The body is optional; by default every non-duplicate candidate is
/// imported.
#[utoipa::path(
    post,
    path = "/api/v1/imports/confirm",
    tag = "imports",
    security(("bearer_auth" = [])),
    request_body(content = Option<ConfirmImportRequest>),
    responses(
        (status = 200, description = "Transactions imported", body = ApiResponse<ConfirmImportResponse>),
        (status = 400, description = "Selected index out of range", body = ErrorResponse),
        (status = 409, description = "No preview pending", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn confirm_import(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Option<Json<ConfirmImportRequest>>,
) -> ApiResult<Json<ApiResponse<ConfirmImportResponse>>> {
    trace!("Entering confirm_import function");
    let request = body.map(|Json(request)| request).unwrap_or_default();

    let created = confirm_preview(
        &state.db,
        &state.previews,
        &state.duplicate_policy(),
        auth.id,
        ConfirmOptions::from(request),
    )
    .await?;

    let message = format!("Successfully imported {} transactions", created.len());
    info!("{} for user {}", message, auth.id);
    let response = ConfirmImportResponse {
        imported: created.len(),
        transactions: created.into_iter().map(TransactionResponse::from).collect(),
    };
    Ok(Json(ApiResponse::ok(response, message)))
}
