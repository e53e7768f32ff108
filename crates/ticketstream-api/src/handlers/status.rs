//! Batch status, failures, active-batch, and cancel endpoints.

use axum::extract::{Extension, Path, Query};
use axum::Json;
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::{
    ActiveBatchesResponse, BatchFailuresResponse, BatchStatusResponse, CancelParams,
    CancelResponse, FailuresParams,
};
use crate::router::ApiState;

/// GET `/api/tickets/bulk/status/:batch_id`
pub async fn get_batch_status(
    Extension(state): Extension<Arc<ApiState>>,
    Path(batch_id): Path<String>,
) -> Result<Json<BatchStatusResponse>, ApiError> {
    let response = state.service.batch_status(&batch_id).await?;
    Ok(Json(response))
}

/// GET `/api/tickets/bulk/failures/:batch_id?page=&size=`
pub async fn get_batch_failures(
    Extension(state): Extension<Arc<ApiState>>,
    Path(batch_id): Path<String>,
    Query(params): Query<FailuresParams>,
) -> Json<BatchFailuresResponse> {
    Json(
        state
            .service
            .batch_failures(&batch_id, params.page, params.size)
            .await,
    )
}

/// GET `/api/tickets/bulk/active`
pub async fn get_active_batches(
    Extension(state): Extension<Arc<ApiState>>,
) -> Json<ActiveBatchesResponse> {
    Json(state.service.active_batches().await)
}

/// POST `/api/tickets/bulk/cancel/:batch_id?reason=`
pub async fn cancel_batch(
    Extension(state): Extension<Arc<ApiState>>,
    Path(batch_id): Path<String>,
    Query(params): Query<CancelParams>,
) -> Json<CancelResponse> {
    Json(
        state
            .service
            .cancel(&batch_id, params.reason.as_deref())
            .await,
    )
}
