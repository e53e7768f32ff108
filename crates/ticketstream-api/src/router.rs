//! Router and shared state for the bulk API.

use axum::routing::{get, post};
use axum::{Extension, Router};
use std::sync::Arc;

use crate::handlers;
use crate::services::bulk_service::BulkUploadService;

/// Shared state for bulk routes.
pub struct ApiState {
    /// Upload orchestrator and query facade.
    pub service: BulkUploadService,
}

impl ApiState {
    #[must_use]
    pub fn new(service: BulkUploadService) -> Self {
        Self { service }
    }
}

/// Build the bulk ticket router.
///
/// Routes:
/// - POST `/api/tickets/bulk/upload`              — Upload CSV
/// - GET  `/api/tickets/bulk/status/:batch_id`    — Batch status
/// - GET  `/api/tickets/bulk/failures/:batch_id`  — Paginated failures
/// - GET  `/api/tickets/bulk/active`              — Active batches
/// - POST `/api/tickets/bulk/cancel/:batch_id`    — Advisory cancel
/// - GET  `/api/tickets/bulk/dlt`                 — DLT snapshot
/// - POST `/api/tickets/bulk/dlt/reprocess/:id`   — Not implemented (501)
pub fn bulk_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route(
            "/api/tickets/bulk/upload",
            post(handlers::upload::upload_bulk_tickets),
        )
        .route(
            "/api/tickets/bulk/status/:batch_id",
            get(handlers::status::get_batch_status),
        )
        .route(
            "/api/tickets/bulk/failures/:batch_id",
            get(handlers::status::get_batch_failures),
        )
        .route(
            "/api/tickets/bulk/active",
            get(handlers::status::get_active_batches),
        )
        .route(
            "/api/tickets/bulk/cancel/:batch_id",
            post(handlers::status::cancel_batch),
        )
        .route(
            "/api/tickets/bulk/dlt",
            get(handlers::dlt::get_dlt_messages),
        )
        .route(
            "/api/tickets/bulk/dlt/reprocess/:id",
            post(handlers::dlt::reprocess_dlt_message),
        )
        .layer(Extension(state))
}
