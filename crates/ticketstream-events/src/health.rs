//! Broker health probe for the bulk pipeline.

use serde::{Deserialize, Serialize};

/// Result of probing the durable log that carries bulk chunks.
///
/// Beyond raw connectivity, readiness requires the bulk request topic to
/// exist: a cluster without it accepts no submissions. The dead-letter
/// topic is reported but does not gate readiness, since it only receives
/// traffic after retries exhaust.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerHealth {
    /// Whether the metadata fetch succeeded.
    pub connected: bool,
    /// Brokers visible in the cluster metadata.
    pub brokers: usize,
    /// Whether the bulk request topic exists.
    pub bulk_topic_found: bool,
    /// Whether the dead-letter topic exists.
    pub dlt_topic_found: bool,
}

impl BrokerHealth {
    /// Ready to accept bulk submissions.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.connected && self.brokers > 0 && self.bulk_topic_found
    }
}
