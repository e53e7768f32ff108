//! End-to-end pipeline tests without external brokers.
//!
//! Drives a submission from CSV bytes through parsing, chunking, and
//! chunk processing into the tracking store, asserting the externally
//! observable batch lifecycle.

use std::sync::Arc;

use ticketstream_api::services::csv_parser::parse_submission;
use ticketstream_core::{BulkConfig, TicketRecord};
use ticketstream_events::consumer::ChunkProcessor;
use ticketstream_events::BulkChunkEvent;
use ticketstream_ticketing::{EventBus, InMemoryTicketService};
use ticketstream_tracking::{BatchStatus, TrackingStore};

struct Pipeline {
    service: Arc<InMemoryTicketService>,
    tracking: Arc<TrackingStore>,
    processor: ChunkProcessor,
    cfg: BulkConfig,
}

impl Pipeline {
    fn new() -> Self {
        let service = Arc::new(InMemoryTicketService::new(Arc::new(EventBus::new())));
        let tracking = Arc::new(TrackingStore::in_memory(3600, 3600));
        let processor = ChunkProcessor::new(service.clone(), tracking.clone());
        Self {
            service,
            tracking,
            processor,
            cfg: BulkConfig::default(),
        }
    }

    /// Chunk accepted records the way the producer would.
    fn chunk(&self, batch_id: &str, records: Vec<TicketRecord>) -> Vec<BulkChunkEvent> {
        let total_records = records.len() as u64;
        let chunks: Vec<Vec<TicketRecord>> = records
            .chunks(self.cfg.chunk_size)
            .map(<[TicketRecord]>::to_vec)
            .collect();
        let total_chunks = chunks.len() as u32;
        chunks
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| {
                BulkChunkEvent::new(
                    batch_id,
                    index as u32,
                    total_chunks,
                    total_records,
                    chunk,
                    "system",
                    "tickets.csv",
                )
            })
            .collect()
    }

    async fn drain(&self, events: &[BulkChunkEvent]) {
        for event in events {
            self.processor.process(event).await.unwrap();
        }
    }
}

fn csv_rows(n: usize) -> String {
    let mut data = String::from("ticketnumber,title,customerid\n");
    for i in 0..n {
        data.push_str(&format!("TKT-{i:04},Issue {i},{}\n", 1000 + i));
    }
    data
}

#[tokio::test]
async fn small_batch_completes_with_all_successes() {
    let pipeline = Pipeline::new();
    let data = "ticketnumber,title,customerid\n\
                TKT-001,Login,1001\n\
                TKT-002,Reset,1002\n\
                TKT-003,Dash,1003\n";
    let outcome = parse_submission("tickets.csv", data.as_bytes(), &pipeline.cfg).unwrap();
    assert_eq!(outcome.records.len(), 3);

    let events = pipeline.chunk("BATCH-E2E-1", outcome.records);
    assert_eq!(events.len(), 1);
    pipeline.drain(&events).await;

    let state = pipeline.tracking.get("BATCH-E2E-1").await.unwrap();
    assert_eq!(state.status, BatchStatus::Completed);
    assert_eq!(state.success_count, 3);
    assert_eq!(state.total_records, 3);
    assert!(state.ended_at.is_some());
    assert!(state.invariants_hold());
    assert_eq!(pipeline.service.len().await, 3);
}

#[tokio::test]
async fn invalid_row_is_dropped_and_batch_still_completes() {
    let pipeline = Pipeline::new();
    let data = "ticketnumber,title,customerid\n\
                TKT-001,Login,1001\n\
                TKT-002,Reset,abc\n\
                TKT-003,Dash,1003\n";
    let outcome = parse_submission("tickets.csv", data.as_bytes(), &pipeline.cfg).unwrap();
    // Row 2 is individually invalid but under the bulk-reject threshold.
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.row_errors.len(), 1);
    assert_eq!(outcome.row_errors[0].line_number, 3);

    let events = pipeline.chunk("BATCH-E2E-2", outcome.records);
    pipeline.drain(&events).await;

    let state = pipeline.tracking.get("BATCH-E2E-2").await.unwrap();
    assert_eq!(state.status, BatchStatus::Completed);
    assert_eq!(state.success_count, 2);
}

#[tokio::test]
async fn large_batch_chunks_and_completes_in_any_order() {
    let pipeline = Pipeline::new();
    let data = csv_rows(350);
    let outcome = parse_submission("tickets.csv", data.as_bytes(), &pipeline.cfg).unwrap();
    assert_eq!(outcome.records.len(), 350);

    let mut events = pipeline.chunk("BATCH-E2E-3", outcome.records);
    assert_eq!(events.len(), 4);
    assert_eq!(events[0].records.len(), 100);
    assert_eq!(events[3].records.len(), 50);

    // Chunks may complete in any order across workers.
    events.reverse();
    pipeline.drain(&events).await;

    let state = pipeline.tracking.get("BATCH-E2E-3").await.unwrap();
    assert_eq!(state.status, BatchStatus::Completed);
    assert_eq!(state.success_count, 350);
    assert_eq!(state.completed_chunks, 4);
    assert!(state.invariants_hold());
}

#[tokio::test]
async fn existing_ticket_is_skipped_and_batch_partially_completes() {
    let pipeline = Pipeline::new();
    let data = csv_rows(200);
    let outcome = parse_submission("tickets.csv", data.as_bytes(), &pipeline.cfg).unwrap();

    // TKT-0050 already exists in the store.
    pipeline
        .service
        .seed(&TicketRecord::new("TKT-0050", "Pre-existing", 1050))
        .await;

    let events = pipeline.chunk("BATCH-E2E-4", outcome.records);
    pipeline.drain(&events).await;

    let state = pipeline.tracking.get("BATCH-E2E-4").await.unwrap();
    assert_eq!(state.success_count, 199);
    assert_eq!(state.skipped_count, 1);
    assert_eq!(state.failure_count, 0);
    // One record did not result in a fresh ticket, so the batch is
    // partial rather than clean.
    assert_eq!(state.status, BatchStatus::PartiallyCompleted);

    let (failures, total) = pipeline.tracking.list_failures("BATCH-E2E-4", 0, 10).await;
    assert_eq!(total, 1);
    assert_eq!(failures[0].ticket_number, "TKT-0050");
}

#[tokio::test]
async fn every_record_gets_exactly_one_outcome() {
    let pipeline = Pipeline::new();
    let mut data = csv_rows(120);
    data.push_str("TKT-BAD,Broken,-5\n");
    let outcome = parse_submission("tickets.csv", data.as_bytes(), &pipeline.cfg).unwrap();
    assert_eq!(outcome.records.len(), 120);

    let events = pipeline.chunk("BATCH-E2E-5", outcome.records);
    pipeline.drain(&events).await;

    let state = pipeline.tracking.get("BATCH-E2E-5").await.unwrap();
    assert_eq!(
        state.success_count + state.failure_count + state.skipped_count,
        state.total_records
    );
}
