//! HTTP surface tests using the router with a stubbed chunk publisher.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

use ticketstream_api::{bulk_router, ApiState, BulkUploadService, ChunkPublisher};
use ticketstream_core::{BulkConfig, TicketRecord};
use ticketstream_events::{BatchSubmission, EventError, TopicConfig};
use ticketstream_tracking::TrackingStore;

struct StubPublisher {
    fail: bool,
}

#[async_trait]
impl ChunkPublisher for StubPublisher {
    async fn publish_batch(
        &self,
        records: Vec<TicketRecord>,
        _submitted_by: &str,
        _source_filename: &str,
    ) -> Result<BatchSubmission, EventError> {
        if self.fail {
            return Err(EventError::AllChunksFailed {
                batch_id: "BATCH-HTTP".to_string(),
                total_chunks: 1,
            });
        }
        Ok(BatchSubmission {
            batch_id: "BATCH-HTTP".to_string(),
            total_records: records.len(),
            total_chunks: records.len().div_ceil(100) as u32,
        })
    }
}

fn app(fail_publish: bool) -> (Arc<TrackingStore>, axum::Router) {
    let tracking = Arc::new(TrackingStore::in_memory(3600, 3600));
    let service = BulkUploadService::new(
        Arc::new(StubPublisher { fail: fail_publish }),
        tracking.clone(),
        TopicConfig::default(),
        BulkConfig::default(),
    );
    (tracking, bulk_router(Arc::new(ApiState::new(service))))
}

fn multipart_upload(filename: &str, content: &str, uploaded_by: Option<&str>) -> Request<Body> {
    let boundary = "testboundary42";
    let mut body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {content}\r\n"
    );
    if let Some(user) = uploaded_by {
        body.push_str(&format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"uploadedBy\"\r\n\r\n\
             {user}\r\n"
        ));
    }
    body.push_str(&format!("--{boundary}--\r\n"));

    Request::builder()
        .method("POST")
        .uri("/api/tickets/bulk/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

const CSV: &str = "ticketnumber,title,customerid\n\
                   TKT-001,Login,1001\n\
                   TKT-002,Reset,1002\n\
                   TKT-003,Dash,1003";

#[tokio::test]
async fn upload_returns_202_with_tracking_urls() {
    let (_, app) = app(false);
    let response = app
        .oneshot(multipart_upload("tickets.csv", CSV, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = json_body(response).await;
    assert_eq!(body["batchId"], "BATCH-HTTP");
    assert_eq!(body["status"], "ACCEPTED");
    assert_eq!(body["totalRecords"], 3);
    assert_eq!(body["totalChunks"], 1);
    assert_eq!(body["statusUrl"], "/api/tickets/bulk/status/BATCH-HTTP");
    assert_eq!(body["failuresUrl"], "/api/tickets/bulk/failures/BATCH-HTTP");
}

#[tokio::test]
async fn upload_rejects_wrong_extension_with_400() {
    let (_, app) = app(false);
    let response = app
        .oneshot(multipart_upload("tickets.xlsx", CSV, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "V1002");
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn upload_maps_producer_outage_to_503_retryable() {
    let (_, app) = app(true);
    let response = app
        .oneshot(multipart_upload("tickets.csv", CSV, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["code"], "K4001");
    assert_eq!(body["retryable"], true);
}

#[tokio::test]
async fn upload_without_file_field_is_400() {
    let (_, app) = app(false);
    let boundary = "emptyboundary";
    let request = Request::builder()
        .method("POST")
        .uri("/api/tickets/bulk/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(format!("--{boundary}--\r\n")))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_of_unknown_batch_is_404() {
    let (_, app) = app(false);
    let response = app
        .oneshot(
            Request::get("/api/tickets/bulk/status/BATCH-NOPE")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_reflects_tracked_batch() {
    let (tracking, app) = app(false);
    tracking
        .initialize("BATCH-HTTP", 2, 150, "alice", "tickets.csv")
        .await;
    tracking.record_success("BATCH-HTTP", "TKT-001").await;

    let response = app
        .oneshot(
            Request::get("/api/tickets/bulk/status/BATCH-HTTP")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "IN_PROGRESS");
    assert_eq!(body["successCount"], 1);
    assert_eq!(body["submittedBy"], "alice");
}

#[tokio::test]
async fn failures_paginate_in_insertion_order() {
    let (tracking, app) = app(false);
    tracking
        .initialize("BATCH-HTTP", 1, 10, "system", "t.csv")
        .await;
    for i in 0..5 {
        tracking
            .record_failure(
                "BATCH-HTTP",
                &format!("TKT-{i}"),
                ticketstream_core::BulkErrorCode::InvalidRowData,
                "bad row",
            )
            .await;
    }

    let response = app
        .oneshot(
            Request::get("/api/tickets/bulk/failures/BATCH-HTTP?page=1&size=2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["totalFailures"], 5);
    assert_eq!(body["page"], 1);
    assert_eq!(body["failures"].as_array().unwrap().len(), 2);
    assert_eq!(body["failures"][0]["ticketNumber"], "TKT-2");
}

#[tokio::test]
async fn active_batches_listed_until_cancelled() {
    let (tracking, app) = app(false);
    tracking
        .initialize("BATCH-HTTP", 2, 10, "system", "t.csv")
        .await;

    let response = app
        .clone()
        .oneshot(
            Request::get("/api/tickets/bulk/active")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["count"], 1);

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/tickets/bulk/cancel/BATCH-HTTP?reason=typo")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["cancelled"], true);
    assert_eq!(body["reason"], "typo");

    let response = app
        .oneshot(
            Request::get("/api/tickets/bulk/active")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn dlt_endpoint_lists_records() {
    let (tracking, app) = app(false);
    tracking
        .append_dlt(
            "ticket.bulk.requests.DLT",
            ticketstream_tracking::DltRecord::new(
                "ticket.bulk.requests",
                "BATCH-X-CHUNK-0",
                "{}",
                "db down",
                "I3001",
            ),
        )
        .await;

    let response = app
        .oneshot(
            Request::get("/api/tickets/bulk/dlt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["topic"], "ticket.bulk.requests.DLT");
    assert_eq!(body["returnedMessages"], 1);
    assert_eq!(body["messages"][0]["error_class_tag"], "I3001");
}

#[tokio::test]
async fn dlt_reprocess_is_not_implemented() {
    let (_, app) = app(false);
    let response = app
        .oneshot(
            Request::post("/api/tickets/bulk/dlt/reprocess/some-id")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
}
