//! Dead-letter inspection endpoints.

use axum::extract::{Extension, Path, Query};
use axum::Json;
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::{DltMessagesResponse, DltParams};
use crate::router::ApiState;

/// GET `/api/tickets/bulk/dlt?topic=&limit=`
pub async fn get_dlt_messages(
    Extension(state): Extension<Arc<ApiState>>,
    Query(params): Query<DltParams>,
) -> Json<DltMessagesResponse> {
    Json(
        state
            .service
            .dlt_messages(params.topic.as_deref(), params.limit)
            .await,
    )
}

/// POST `/api/tickets/bulk/dlt/reprocess/:id`
///
/// Present in the surface, pending a reprocessing policy. Always answers
/// 501 until one is defined.
pub async fn reprocess_dlt_message(
    Extension(_state): Extension<Arc<ApiState>>,
    Path(_id): Path<String>,
) -> Result<(), ApiError> {
    Err(ApiError::NotImplemented {
        feature: "DLT reprocessing",
    })
}
