//! ticketstream server
//!
//! Wires the bulk pipeline end to end: the axum submission/query surface,
//! the chunk producer, the consumer worker pool, the dead-letter reader,
//! and the Redis-backed tracking store and ticket cache. Degrades to
//! process-local tracking and a disabled cache when Redis is
//! unreachable at startup.

mod config;
mod health;
mod logging;

use std::sync::Arc;

use axum::routing::get;
use axum::{Extension, Router};
use config::ServerConfig;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use ticketstream_api::{bulk_router, ApiState, BulkUploadService};
use ticketstream_core::BulkConfig;
use ticketstream_events::{
    BulkProducer, ChunkWorkerPool, DltPublisher, DltReader, KafkaConfig, TopicConfig,
};
use ticketstream_ticketing::{CacheSubscriber, EventBus, InMemoryTicketService, TicketCacheService};
use ticketstream_tracking::TrackingStore;

#[tokio::main]
async fn main() {
    // Fail fast on unusable configuration.
    let server_config = match ServerConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    logging::init_logging(&server_config.rust_log);

    let bulk_config = match BulkConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Invalid bulk configuration");
            std::process::exit(1);
        }
    };
    let kafka_config = match KafkaConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Invalid Kafka configuration");
            std::process::exit(1);
        }
    };
    let topics = TopicConfig::from_env();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %server_config.host,
        port = server_config.port,
        topic = %topics.bulk_requests,
        "Starting ticketstream server"
    );

    // Tracking store: Redis with process-local degradation.
    let tracking = match TrackingStore::connect(
        &server_config.redis_url,
        bulk_config.batch_ttl_secs(),
        bulk_config.dlt_ttl_secs(),
    )
    .await
    {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %e, "Redis unreachable; tracking is process-local only");
            Arc::new(TrackingStore::in_memory(
                bulk_config.batch_ttl_secs(),
                bulk_config.dlt_ttl_secs(),
            ))
        }
    };

    // Ticket read cache, kept coherent through the post-commit bus.
    let cache = match TicketCacheService::connect(
        &server_config.redis_url,
        bulk_config.cache_ttl_minutes * 60,
    )
    .await
    {
        Ok(cache) => Arc::new(cache),
        Err(e) => {
            warn!(error = %e, "Redis unreachable; ticket cache disabled");
            Arc::new(TicketCacheService::disabled())
        }
    };
    let bus = Arc::new(EventBus::new());
    bus.subscribe(Arc::new(CacheSubscriber::new(cache))).await;

    let ticket_service = Arc::new(InMemoryTicketService::new(bus));

    // Kafka side: producer, dead-letter publisher, worker pool, reader.
    let producer = match BulkProducer::new(&kafka_config, topics.clone(), bulk_config.clone()) {
        Ok(producer) => Arc::new(producer),
        Err(e) => {
            error!(error = %e, "Failed to create bulk producer");
            std::process::exit(1);
        }
    };
    let dlt_publisher =
        match DltPublisher::new(&kafka_config, topics.clone(), Arc::clone(&tracking)) {
            Ok(publisher) => Arc::new(publisher),
            Err(e) => {
                error!(error = %e, "Failed to create dead-letter publisher");
                std::process::exit(1);
            }
        };

    let pool = Arc::new(ChunkWorkerPool::new(
        kafka_config.clone(),
        topics.clone(),
        bulk_config.clone(),
        ticket_service,
        Arc::clone(&tracking),
        dlt_publisher,
    ));
    let mut worker_handles = pool.spawn();

    match DltReader::new(&kafka_config, topics.clone()) {
        Ok(reader) => {
            worker_handles.push(tokio::spawn(async move {
                if let Err(e) = reader.run().await {
                    error!(error = %e, "Dead-letter reader terminated");
                }
            }));
        }
        Err(e) => {
            error!(error = %e, "Failed to create dead-letter reader");
            std::process::exit(1);
        }
    }

    // HTTP surface, with liveness/readiness probing the broker through
    // the producer.
    let health_routes = Router::new()
        .route("/livez", get(health::livez_handler))
        .route("/readyz", get(health::readyz_handler))
        .layer(Extension(Arc::clone(&producer)));

    let service = BulkUploadService::new(producer, tracking, topics, bulk_config);
    let router = bulk_router(Arc::new(ApiState::new(service)))
        .merge(health_routes)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr = match server_config.bind_addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!(error = %e, "Invalid bind address");
            std::process::exit(1);
        }
    };
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, addr = %addr, "Failed to bind");
            std::process::exit(1);
        }
    };
    info!(addr = %addr, "ticketstream server listening");

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "Server error");
    }

    info!("Shutting down workers");
    for handle in worker_handles {
        handle.abort();
    }
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to install shutdown signal handler");
        return;
    }
    info!("Shutdown signal received");
}
