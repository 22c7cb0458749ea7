use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use tracing::debug;
use utoipa::ToSchema;

use crate::error::{ApiError, ApiResult};

/// Multipart body accepted by the upload endpoints, for the API docs.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct FileUpload {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// The `file` part of a multipart upload.
#[derive(Debug)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::Validation(format!("Invalid multipart upload: {}", err.body_text()))
    }
}

/// Reads the `file` field, refusing anything over `max_bytes` and empty
/// files. Other fields are ignored.
pub async fn read_file(multipart: &mut Multipart, max_bytes: usize) -> ApiResult<Upload> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(|c| c.to_lowercase());

        let mut bytes = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            if bytes.len() + chunk.len() > max_bytes {
                return Err(ApiError::PayloadTooLarge(format!(
                    "File exceeds the {} MB limit",
                    max_bytes / (1024 * 1024)
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        if bytes.is_empty() {
            return Err(ApiError::Validation("Uploaded file is empty".to_string()));
        }
        debug!("Received upload {:?} ({} bytes)", file_name, bytes.len());
        return Ok(Upload {
            file_name,
            content_type,
            bytes,
        });
    }

    Err(ApiError::Validation("Missing 'file' field".to_string()))
}
