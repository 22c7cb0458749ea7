use axum::{
    extract::{Multipart, State},
    response::Json,
};
use common::ReceiptExtraction;
use tracing::{info, instrument, trace, warn};

use super::upload::{FileUpload, Upload, read_file};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

pub const RECEIPT_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "application/pdf"];
const GENERIC_CONTENT_TYPE: &str = "application/octet-stream";

/// The declared content type, or one guessed from the file extension.
fn receipt_content_type(upload: &Upload) -> Option<&'static str> {
    match upload.content_type.as_deref() {
        None | Some(GENERIC_CONTENT_TYPE) => {}
        Some(declared) => return RECEIPT_CONTENT_TYPES.iter().copied().find(|allowed| *allowed == declared),
    }

    let name = upload.file_name.as_deref()?.to_lowercase();
    match name.rsplit_once('.')?.1 {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

/// Extract a transaction candidate from a receipt image
///
/// Nothing is stored; the client shows the candidate for review and saves it
/// through the transactions endpoint.
#[utoipa::path(
    post,
    path = "/api/v1/receipts/extract",
    tag = "receipts",
    security(("bearer_auth" = [])),
    request_body(content = FileUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Receipt processed", body = ApiResponse<ReceiptExtraction>),
        (status = 400, description = "Missing, empty or undecodable file", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 415, description = "Unsupported file type", body = ErrorResponse),
        (status = 422, description = "No text could be read", body = ErrorResponse),
        (status = 502, description = "OCR engine unavailable", body = ErrorResponse)
    )
)]
#[instrument(skip(state, multipart))]
pub async fn extract_receipt(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<ApiResponse<ReceiptExtraction>>> {
    trace!("Entering extract_receipt function");
    let upload = read_file(&mut multipart, state.settings.max_receipt_bytes).await?;

    let Some(content_type) = receipt_content_type(&upload) else {
        warn!("Rejected receipt with content type {:?}", upload.content_type);
        return Err(ApiError::UnsupportedMediaType(format!(
            "Unsupported file type. Allowed: {}",
            RECEIPT_CONTENT_TYPES.join(", ")
        )));
    };

    let extraction = state.receipts.extract(upload.bytes, content_type).await?;
    info!(
        "Receipt processed for user {} with confidence {:.2}",
        auth.id, extraction.confidence
    );
    Ok(Json(ApiResponse::ok(extraction, "Receipt processed successfully")))
}
