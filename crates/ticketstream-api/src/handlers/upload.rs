//! Submission endpoint.
//!
//! `POST /api/tickets/bulk/upload` — multipart with a required `file`
//! field and an optional `uploadedBy` defaulting to "system". Responds
//! 202 with batch tracking information; parse failures map to 400/413
//! and producer outages to 503 with a retryable flag.

use axum::extract::{Extension, Multipart};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;
use tracing::info;

use crate::error::ApiError;
use crate::models::UploadAcceptedResponse;
use crate::router::ApiState;

pub async fn upload_bulk_tickets(
    Extension(state): Extension<Arc<ApiState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadAcceptedResponse>), ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut uploaded_by = "system".to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest {
            reason: format!("multipart decode failed: {e}"),
        })?
    {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload.csv").to_string();
                let data = field.bytes().await.map_err(|e| ApiError::BadRequest {
                    reason: format!("failed to read file field: {e}"),
                })?;
                file = Some((filename, data.to_vec()));
            }
            Some("uploadedBy") => {
                let value = field.text().await.unwrap_or_default();
                if !value.trim().is_empty() {
                    uploaded_by = value.trim().to_string();
                }
            }
            _ => {}
        }
    }

    let (filename, data) = file.ok_or_else(|| ApiError::BadRequest {
        reason: "missing required field 'file'".to_string(),
    })?;

    info!(filename = %filename, uploaded_by = %uploaded_by, "Upload request");
    let response = state.service.upload(&filename, &data, &uploaded_by).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}
