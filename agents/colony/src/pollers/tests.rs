use std::sync::Arc;

use mockall::Sequence;
use sea_orm::ConnectionTrait;

use colony_base::{AgentRegistry, CoreMetrics, Poller, PollerSyncMetrics};
use colony_core::{DataType, GapStatus, QueryEbpfMetricsResponse, QueryTelemetryResponse};
use colony_test::mocks::{MockAgentRpc, StaticConnector};
use colony_test::test_utils::{healthy_agent, spans};

use crate::aggregation::FrameInterner;
use crate::db::ColonyDb;

use super::*;

async fn test_db() -> ColonyDb {
    ColonyDb::connect("sqlite::memory:")
        .await
        .expect("in-memory store")
}

fn test_registry() -> Arc<AgentRegistry> {
    let registry = Arc::new(AgentRegistry::new());
    registry.upsert(healthy_agent("a1"));
    registry
}

fn sync_metrics() -> PollerSyncMetrics {
    let metrics = Arc::new(
        CoreMetrics::new("test", None, prometheus::Registry::new()).expect("metrics registry"),
    );
    PollerSyncMetrics::new(&metrics)
}

fn now_ts() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

fn telemetry_response(
    service: &str,
    first_seq: u64,
    count: u64,
    session: &str,
) -> QueryTelemetryResponse {
    QueryTelemetryResponse {
        spans: spans(service, first_seq, count, now_ts() - 30),
        max_seq_id: first_seq + count - 1,
        session_id: session.into(),
    }
}

#[tokio::test]
async fn end_to_end_checkpointed_poll() {
    let db = test_db().await;
    let registry = test_registry();

    let mut mock = MockAgentRpc::new();
    let mut seq = Sequence::new();
    // First poll: no checkpoint, five spans, advance to {S1, 5}.
    mock.expect__query_telemetry()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|req| req.start_seq_id == 0)
        .return_once(|_| Ok(telemetry_response("checkout", 1, 5, "S1")));
    // Second poll resumes at 5 and gets three more.
    mock.expect__query_telemetry()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|req| req.start_seq_id == 5)
        .return_once(|_| Ok(telemetry_response("checkout", 6, 3, "S1")));

    let poller = TelemetryPoller::new(
        db.clone(),
        registry,
        Arc::new(StaticConnector(Arc::new(mock))),
        sync_metrics(),
    );

    let summary = poller.poll_once().await.expect("first cycle");
    assert_eq!(summary.agents_queried, 1);
    assert_eq!(summary.records, 5);

    let cp = db
        .checkpoint("a1", DataType::Telemetry)
        .await
        .unwrap()
        .expect("checkpoint created lazily on first successful batch");
    assert_eq!(cp.session_id, "S1");
    assert_eq!(cp.last_seq_id, 5);

    let summary = poller.poll_once().await.expect("second cycle");
    assert_eq!(summary.records, 3);
    let cp = db.checkpoint("a1", DataType::Telemetry).await.unwrap().unwrap();
    assert_eq!(cp.last_seq_id, 8);

    // The aggregates behind the checkpoint are present.
    let stored = db
        .telemetry_summaries_in_range(Some("checkout"), 0, now_ts())
        .await
        .unwrap();
    assert_eq!(stored.iter().map(|s| s.total_spans).sum::<u64>(), 8);
}

#[tokio::test]
async fn session_change_resets_checkpoint_and_refetches() {
    let db = test_db().await;
    let registry = test_registry();

    db.update_checkpoint("a1", DataType::Telemetry, "S_old", 500)
        .await
        .unwrap();

    let mut mock = MockAgentRpc::new();
    let mut seq = Sequence::new();
    // Resume attempt hits the recreated store.
    mock.expect__query_telemetry()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|req| req.start_seq_id == 500)
        .return_once(|_| Ok(telemetry_response("checkout", 1, 4, "S_new")));
    // Reset path re-issues from zero.
    mock.expect__query_telemetry()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|req| req.start_seq_id == 0)
        .return_once(|_| Ok(telemetry_response("checkout", 1, 4, "S_new")));

    let poller = TelemetryPoller::new(
        db.clone(),
        registry,
        Arc::new(StaticConnector(Arc::new(mock))),
        sync_metrics(),
    );
    poller.poll_once().await.expect("cycle");

    let cp = db.checkpoint("a1", DataType::Telemetry).await.unwrap().unwrap();
    assert_eq!(cp.session_id, "S_new");
    assert_eq!(cp.last_seq_id, 4);
}

#[tokio::test]
async fn gaps_are_recorded_and_recoverable() {
    let db = test_db().await;
    let registry = test_registry();

    let mut mock = MockAgentRpc::new();
    mock.expect__query_telemetry().return_once(|_| {
        let ts = now_ts() - 30;
        let mut spans = spans("checkout", 1, 3, ts);
        spans.extend(spans_from(5, 2, ts));
        Ok(QueryTelemetryResponse {
            spans,
            max_seq_id: 6,
            session_id: "S1".into(),
        })
    });

    let poller = TelemetryPoller::new(
        db.clone(),
        registry,
        Arc::new(StaticConnector(Arc::new(mock))),
        sync_metrics(),
    );
    poller.poll_once().await.expect("cycle");

    let gaps = db.pending_gaps(Some("a1"), DataType::Telemetry).await.unwrap();
    assert_eq!(gaps.len(), 1);
    assert_eq!(gaps[0].start_seq_id, 4);
    assert_eq!(gaps[0].end_seq_id, 4);
    assert_eq!(gaps[0].status, GapStatus::Detected);

    db.mark_gap_recovered(gaps[0].id).await.unwrap();
    assert!(db
        .pending_gaps(Some("a1"), DataType::Telemetry)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn storage_failure_leaves_checkpoint_for_retry() {
    let db = test_db().await;
    let registry = test_registry();

    let mut mock = MockAgentRpc::new();
    // The same five records are served on both cycles; the agent does not
    // care that the first commit failed.
    mock.expect__query_telemetry()
        .times(2)
        .withf(|req| req.start_seq_id == 0)
        .returning(|_| Ok(telemetry_response("checkout", 1, 5, "S1")));

    let poller = TelemetryPoller::new(
        db.clone(),
        registry,
        Arc::new(StaticConnector(Arc::new(mock))),
        sync_metrics(),
    );

    // Break the aggregate table so the commit fails after a successful RPC.
    db.conn()
        .execute_unprepared("ALTER TABLE telemetry_summary RENAME TO telemetry_summary_hidden")
        .await
        .unwrap();
    let err = poller.poll_once().await.expect_err("storage failure surfaces");
    assert!(format!("{err:#}").contains("telemetry"));
    assert!(
        db.checkpoint("a1", DataType::Telemetry).await.unwrap().is_none(),
        "checkpoint must not advance past a failed commit"
    );

    // Heal the store; the retry re-fetches the same seq-ids and commits.
    db.conn()
        .execute_unprepared("ALTER TABLE telemetry_summary_hidden RENAME TO telemetry_summary")
        .await
        .unwrap();
    let summary = poller.poll_once().await.expect("retry cycle");
    assert_eq!(summary.records, 5);
    let cp = db.checkpoint("a1", DataType::Telemetry).await.unwrap().unwrap();
    assert_eq!(cp.last_seq_id, 5);

    let stored = db
        .telemetry_summaries_in_range(Some("checkout"), 0, now_ts())
        .await
        .unwrap();
    // No duplicates: exactly the five spans, counted once.
    assert_eq!(stored.iter().map(|s| s.total_spans).sum::<u64>(), 5);
}

#[tokio::test]
async fn catch_up_drains_backlog_in_bounded_batches() {
    let db = test_db().await;
    let registry = test_registry();

    // The agent holds 25 records and serves at most 10 per call; the
    // colony keeps polling until an empty response confirms completion.
    const TOTAL: u64 = 25;
    const AGENT_BATCH: u64 = 10;

    let base_ts = now_ts() - 100_000;
    let mut mock = MockAgentRpc::new();
    mock.expect__query_telemetry().returning(move |req| {
        let first = req.start_seq_id + 1;
        let count = TOTAL.saturating_sub(req.start_seq_id).min(AGENT_BATCH);
        let spans = (0..count)
            .flat_map(|i| {
                let seq = first + i;
                spans("checkout", seq, 1, base_ts + seq as i64 * 60)
            })
            .collect();
        Ok(QueryTelemetryResponse {
            spans,
            max_seq_id: if count == 0 { TOTAL } else { first + count - 1 },
            session_id: "S1".into(),
        })
    });

    let poller = TelemetryPoller::new(
        db.clone(),
        registry,
        Arc::new(StaticConnector(Arc::new(mock))),
        sync_metrics(),
    );

    let mut cycles = 0;
    let mut pulled = 0;
    loop {
        let summary = poller.poll_once().await.expect("cycle");
        cycles += 1;
        pulled += summary.records;
        if summary.records == 0 {
            break;
        }
        assert!(cycles < 10, "catch-up did not converge");
    }

    // 10 + 10 + 5, then one empty confirmation poll.
    assert_eq!(cycles, 4);
    assert_eq!(pulled, TOTAL);

    let cp = db.checkpoint("a1", DataType::Telemetry).await.unwrap().unwrap();
    assert_eq!(cp.last_seq_id, TOTAL);

    // No gaps, no duplicates.
    assert!(db
        .pending_gaps(Some("a1"), DataType::Telemetry)
        .await
        .unwrap()
        .is_empty());
    let stored = db
        .telemetry_summaries_in_range(Some("checkout"), 0, now_ts())
        .await
        .unwrap();
    assert_eq!(stored.iter().map(|s| s.total_spans).sum::<u64>(), TOTAL);
}

#[tokio::test]
async fn beyla_session_change_resets_all_four_substreams() {
    let db = test_db().await;
    let registry = test_registry();

    for data_type in DataType::BEYLA {
        db.update_checkpoint("a1", data_type, "S_old", 100)
            .await
            .unwrap();
    }

    fn beyla_response(session: &str) -> QueryEbpfMetricsResponse {
        QueryEbpfMetricsResponse {
            http_metrics: vec![colony_core::BeylaHttpMetric {
                seq_id: 1,
                last_seen: time::OffsetDateTime::now_utc().unix_timestamp(),
                service: "checkout".into(),
                method: "GET".into(),
                route: "/cart".into(),
                status_code: 200,
                latency_bucket_ms: 10.0,
                count: 7,
            }],
            http_max_seq_id: 1,
            session_id: session.into(),
            ..Default::default()
        }
    }

    let mut mock = MockAgentRpc::new();
    let mut seq = Sequence::new();
    mock.expect__query_ebpf_metrics()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|req| req.http_start_seq == 100)
        .return_once(|_| Ok(beyla_response("S_new")));
    mock.expect__query_ebpf_metrics()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|req| {
            req.http_start_seq == 0
                && req.grpc_start_seq == 0
                && req.sql_start_seq == 0
                && req.traces_start_seq == 0
        })
        .return_once(|_| Ok(beyla_response("S_new")));

    let poller = BeylaPoller::new(
        db.clone(),
        registry,
        Arc::new(StaticConnector(Arc::new(mock))),
        sync_metrics(),
    );
    poller.poll_once().await.expect("cycle");

    // Only the sub-stream that carried records advanced; the other three
    // were reset and stay reset.
    let http = db.checkpoint("a1", DataType::BeylaHttp).await.unwrap().unwrap();
    assert_eq!(http.session_id, "S_new");
    assert_eq!(http.last_seq_id, 1);
    for data_type in [DataType::BeylaGrpc, DataType::BeylaSql, DataType::BeylaTraces] {
        assert!(db.checkpoint("a1", data_type).await.unwrap().is_none());
    }

    let stored = db
        .beyla_http_summaries_in_range(Some("checkout"), 0, now_ts())
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].request_count, 7);
}

#[tokio::test]
async fn unhealthy_agents_are_never_contacted() {
    let db = test_db().await;

    let registry = Arc::new(AgentRegistry::new());
    let mut dead = healthy_agent("a-dead");
    dead.last_seen = time::OffsetDateTime::now_utc() - time::Duration::hours(2);
    registry.upsert(dead);

    // No expectations: any call on the mock is a test failure.
    let mock = MockAgentRpc::new();
    let poller = TelemetryPoller::new(
        db,
        registry,
        Arc::new(StaticConnector(Arc::new(mock))),
        sync_metrics(),
    );

    let summary = poller.poll_once().await.expect("cycle");
    assert_eq!(summary.agents_queried, 0);
    assert_eq!(summary.agents_failed, 0);
}

#[tokio::test]
async fn memory_profile_poller_interns_and_commits() {
    use colony_core::QueryMemoryProfileSamplesResponse;
    use colony_test::test_utils::memory_sample;

    let db = test_db().await;
    let registry = test_registry();

    let mut mock = MockAgentRpc::new();
    mock.expect__query_memory_profile_samples().return_once(|_| {
        let ts = now_ts() - 30;
        Ok(QueryMemoryProfileSamplesResponse {
            samples: vec![
                memory_sample(1, ts, "checkout", 4096),
                memory_sample(2, ts, "checkout", 4096),
            ],
            max_seq_id: 2,
            session_id: "S1".into(),
            error: None,
        })
    });

    let interner = Arc::new(FrameInterner::new(db.clone()));
    let poller = MemoryProfilePoller::new(
        db.clone(),
        registry,
        Arc::new(StaticConnector(Arc::new(mock))),
        interner,
        sync_metrics(),
    );
    let summary = poller.poll_once().await.expect("cycle");
    assert_eq!(summary.records, 2);

    let cp = db
        .checkpoint("a1", DataType::MemoryProfile)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cp.last_seq_id, 2);

    // Identical stacks collapse into one summary row with summed bytes.
    let (total, hotspots) = db
        .top_k_hotspots_for(
            colony_core::ProfileKind::Memory,
            "checkout",
            None,
            0,
            now_ts(),
            5,
        )
        .await
        .unwrap();
    assert_eq!(total, 8192);
    assert_eq!(hotspots.len(), 1);
    assert_eq!(hotspots[0].frames[0], "alloc_buffer");
}

#[tokio::test]
async fn function_poller_skips_unchanged_content() {
    use colony_core::{FunctionInfo, GetFunctionsResponse};

    let db = test_db().await;
    let registry = test_registry();

    let mut mock = MockAgentRpc::new();
    // Two cycles, same content; the second must not re-upsert.
    mock.expect__get_functions().times(2).returning(|_| {
        Ok(GetFunctionsResponse {
            functions: vec![FunctionInfo {
                name: "handle_request".into(),
                package: "checkout/http".into(),
                file_path: "handler.go".into(),
                line: 31,
                offset: 0x100,
                has_dwarf: true,
                embedding: Some(vec![0.25; colony_core::EMBEDDING_DIM]),
            }],
            binary_hash: Some("bld-1".into()),
        })
    });

    let poller = FunctionPoller::new(
        db.clone(),
        registry,
        Arc::new(StaticConnector(Arc::new(mock))),
        sync_metrics(),
    );

    let first = poller.poll_once().await.expect("first cycle");
    assert_eq!(first.records, 1);
    let second = poller.poll_once().await.expect("second cycle");
    assert_eq!(second.records, 0, "unchanged content skips the upsert");

    assert_eq!(db.function_count("checkout", "bld-1").await.unwrap(), 1);
    let versions = db.binary_versions_for("checkout").await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].build_id, "bld-1");
}

fn spans_from(first_seq: u64, count: u64, ts: i64) -> Vec<colony_core::SpanRecord> {
    spans("checkout", first_seq, count, ts)
}
