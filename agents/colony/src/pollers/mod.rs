//! The stream pollers: per-data-type checkpointed pull, gap detection,
//! session-mismatch handling, aggregation and atomic commit.
//!
//! All of them follow the same algorithm per cycle, per pollable agent:
//! checkpoint lookup, query from `last_seq_id`, reset-and-retry on session
//! mismatch, grace-period gap detection, aggregation, then
//! commit-aggregates-before-advancing-checkpoint. A storage failure leaves
//! the checkpoint untouched so the next cycle re-fetches the same records.

use std::sync::Mutex;

use eyre::Result;
use time::OffsetDateTime;

use colony_base::PollerSyncMetrics;
use colony_core::DataType;

use crate::db::ColonyDb;

#[cfg(test)]
mod tests;

mod services;
pub use services::ServicePoller;

mod telemetry;
pub use telemetry::TelemetryPoller;

mod beyla;
pub use beyla::BeylaPoller;

mod system_metrics;
pub use system_metrics::SystemMetricsPoller;

mod memory_profile;
pub use memory_profile::MemoryProfilePoller;

mod functions;
pub use functions::FunctionPoller;

/// Gaps still open after this long are expired by the cleanup sweep.
pub(crate) const GAP_RETENTION: time::Duration = time::Duration::hours(24);

/// Mutable state threaded through one poll cycle's sequential agent visits.
#[derive(Default)]
pub(crate) struct CycleState {
    pub records: u64,
    pub first_storage_error: Option<eyre::Report>,
}

impl CycleState {
    pub(crate) fn shared() -> Mutex<Self> {
        Mutex::new(Self::default())
    }

    /// Record a failed agent visit; the first storage failure is kept so
    /// `poll_once` can surface it.
    pub(crate) fn note_failure(state: &Mutex<Self>, report: &eyre::Report) {
        let mut st = state.lock().expect("cycle state lock poisoned");
        if st.first_storage_error.is_none() && is_storage_error(report) {
            st.first_storage_error = Some(eyre::eyre!("{report:#}"));
        }
    }

    pub(crate) fn add_records(state: &Mutex<Self>, records: u64) {
        state.lock().expect("cycle state lock poisoned").records += records;
    }

    pub(crate) fn into_parts(state: Mutex<Self>) -> (u64, Option<eyre::Report>) {
        let st = state.into_inner().expect("cycle state lock poisoned");
        (st.records, st.first_storage_error)
    }
}

/// Whether a failure came from the analytic store (retried next cycle with
/// the checkpoint untouched) rather than from the agent.
pub(crate) fn is_storage_error(report: &eyre::Report) -> bool {
    report
        .chain()
        .any(|cause| cause.downcast_ref::<sea_orm::DbErr>().is_some())
}

/// The stored session and next start seq-id for `(agent, data_type)`.
pub(crate) async fn checkpoint_state(
    db: &ColonyDb,
    agent_id: &str,
    data_type: DataType,
) -> Result<(u64, String)> {
    Ok(db
        .checkpoint(agent_id, data_type)
        .await?
        .map(|cp| (cp.last_seq_id, cp.session_id))
        .unwrap_or((0, String::new())))
}

/// Seq-ids are only ordered within a session; a changed session id means
/// the agent's local store was recreated and seq-ids restarted.
pub(crate) fn session_mismatch(stored: &str, received: &str) -> bool {
    !stored.is_empty() && !received.is_empty() && stored != received
}

/// Persist detected gaps to the ledger and bump the gap metric.
pub(crate) async fn record_gaps(
    db: &ColonyDb,
    metrics: &PollerSyncMetrics,
    agent_id: &str,
    data_type: DataType,
    start_seq: u64,
    seq_and_ts: &[(u64, i64)],
) -> Result<()> {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    for gap in colony_base::detect_gaps(start_seq, seq_and_ts, now, colony_core::SEQ_GAP_GRACE) {
        db.record_gap(agent_id, data_type, *gap.start(), *gap.end())
            .await?;
        metrics
            .detected_gaps
            .with_label_values(&[data_type.as_str(), agent_id])
            .inc();
    }
    Ok(())
}

/// Expire open gaps for one stream that outlived the retention horizon.
/// This is the colony-side half of gap recovery; agent-side replays close
/// gaps sooner by simply re-delivering the missing seq-ids.
pub(crate) async fn expire_stale_gaps(db: &ColonyDb, data_type: DataType) -> Result<usize> {
    let horizon = OffsetDateTime::now_utc() - GAP_RETENTION;
    let mut expired = 0;
    for gap in db.pending_gaps(None, data_type).await? {
        if gap.created_at < horizon {
            db.mark_gap_recovered(gap.id).await?;
            expired += 1;
        }
    }
    Ok(expired)
}
