use std::sync::Arc;

use prometheus::{HistogramVec, IntCounterVec, IntGaugeVec};

use crate::CoreMetrics;

/// Struct encapsulating prometheus metrics used by the stream pollers.
#[derive(Debug, Clone)]
pub struct PollerSyncMetrics {
    /// Records pulled from agents and durably stored (label values
    /// differentiate data types and agents).
    pub stored_records: IntCounterVec,
    /// Last committed checkpoint seq-id per stream and agent.
    pub committed_seq_id: IntGaugeVec,
    /// Sequence gaps recorded into the ledger.
    pub detected_gaps: IntCounterVec,
    /// Per-agent failures, by data type.
    pub agent_errors: IntCounterVec,
    /// Wall time of a full poll cycle, by poller.
    pub cycle_duration: HistogramVec,
}

impl PollerSyncMetrics {
    /// Instantiate a new PollerSyncMetrics object.
    pub fn new(metrics: &Arc<CoreMetrics>) -> Self {
        let stored_records = metrics
            .new_int_counter(
                "poller_stored_records",
                "Number of records pulled and durably stored",
                &["data_type", "agent_id"],
            )
            .expect("failed to register stored_records metric");

        let committed_seq_id = metrics
            .new_int_gauge(
                "poller_committed_seq_id",
                "Last committed checkpoint seq-id",
                &["data_type", "agent_id"],
            )
            .expect("failed to register committed_seq_id metric");

        let detected_gaps = metrics
            .new_int_counter(
                "poller_detected_gaps",
                "Sequence gaps recorded into the ledger",
                &["data_type", "agent_id"],
            )
            .expect("failed to register detected_gaps metric");

        let agent_errors = metrics
            .new_int_counter(
                "poller_agent_errors",
                "Per-agent poll failures",
                &["data_type"],
            )
            .expect("failed to register agent_errors metric");

        let cycle_duration = metrics
            .new_histogram(
                "poller_cycle_duration_seconds",
                "Wall time of a full poll cycle",
                &["poller"],
                crate::NETWORK_HISTOGRAM_BUCKETS.into(),
            )
            .expect("failed to register cycle_duration metric");

        PollerSyncMetrics {
            stored_records,
            committed_seq_id,
            detected_gaps,
            agent_errors,
            cycle_duration,
        }
    }
}
