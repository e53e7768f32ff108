//! Liveness and readiness handlers.
//!
//! `/livez` answers as long as the process is serving. `/readyz` probes
//! the broker through the bulk producer: the server is ready only when
//! the cluster is reachable and the bulk request topic exists.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use ticketstream_events::{BrokerHealth, BulkProducer};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadinessBody {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    broker: Option<BrokerHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// GET `/livez`
pub async fn livez_handler() -> &'static str {
    "ok"
}

/// GET `/readyz`
pub async fn readyz_handler(
    Extension(producer): Extension<Arc<BulkProducer>>,
) -> impl IntoResponse {
    match producer.health_check().await {
        Ok(health) if health.is_ready() => (
            StatusCode::OK,
            Json(ReadinessBody {
                status: "ready",
                broker: Some(health),
                error: None,
            }),
        ),
        Ok(health) => {
            warn!(
                brokers = health.brokers,
                bulk_topic_found = health.bulk_topic_found,
                "Broker reachable but pipeline not ready"
            );
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessBody {
                    status: "degraded",
                    broker: Some(health),
                    error: None,
                }),
            )
        }
        Err(e) => {
            warn!(error = %e, "Broker health probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessBody {
                    status: "unavailable",
                    broker: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}
