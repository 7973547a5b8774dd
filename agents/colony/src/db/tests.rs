use migration::{Migrator, MigratorTrait};
use sea_orm::prelude::*;

use colony_core::{DataType, FunctionInfo, ServiceInfo, EMBEDDING_DIM};

use super::entities::function;
use super::ColonyDb;

async fn test_db() -> ColonyDb {
    ColonyDb::connect("sqlite::memory:")
        .await
        .expect("in-memory store")
}

#[tokio::test]
async fn checkpoint_read_your_writes_and_reset() {
    let db = test_db().await;

    assert!(db
        .checkpoint("a1", DataType::Telemetry)
        .await
        .unwrap()
        .is_none());

    db.update_checkpoint("a1", DataType::Telemetry, "S1", 5)
        .await
        .unwrap();
    let cp = db.checkpoint("a1", DataType::Telemetry).await.unwrap().unwrap();
    assert_eq!(cp.session_id, "S1");
    assert_eq!(cp.last_seq_id, 5);

    // Overwrite; the store does not police monotonicity, the caller does.
    db.update_checkpoint("a1", DataType::Telemetry, "S1", 8)
        .await
        .unwrap();
    let cp = db.checkpoint("a1", DataType::Telemetry).await.unwrap().unwrap();
    assert_eq!(cp.last_seq_id, 8);

    // Keys are independent per data type.
    assert!(db
        .checkpoint("a1", DataType::SystemMetrics)
        .await
        .unwrap()
        .is_none());

    db.reset_checkpoint("a1", DataType::Telemetry).await.unwrap();
    assert!(db
        .checkpoint("a1", DataType::Telemetry)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn gap_ledger_round_trip() {
    let db = test_db().await;

    db.record_gap("a1", DataType::BeylaHttp, 4, 7).await.unwrap();
    db.record_gap("a2", DataType::BeylaHttp, 10, 12).await.unwrap();

    let all = db.pending_gaps(None, DataType::BeylaHttp).await.unwrap();
    assert_eq!(all.len(), 2);

    let a1 = db.pending_gaps(Some("a1"), DataType::BeylaHttp).await.unwrap();
    assert_eq!(a1.len(), 1);
    assert_eq!((a1[0].start_seq_id, a1[0].end_seq_id), (4, 7));

    db.mark_gap_recovered(a1[0].id).await.unwrap();
    assert!(db
        .pending_gaps(Some("a1"), DataType::BeylaHttp)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn reopening_a_populated_store_keeps_rows() {
    // Connecting runs the migrations; doing it twice over the same file
    // must not destroy rows. In-memory stores vanish on close, so exercise
    // the migration idempotence directly on one connection.
    let db = test_db().await;
    db.update_checkpoint("a1", DataType::Telemetry, "S1", 5)
        .await
        .unwrap();

    Migrator::up(db.conn(), None).await.unwrap();

    assert!(db
        .checkpoint("a1", DataType::Telemetry)
        .await
        .unwrap()
        .is_some());
}

fn func(name: &str, embedding: Option<Vec<f32>>) -> FunctionInfo {
    FunctionInfo {
        name: name.into(),
        package: "pkg".into(),
        file_path: "lib.rs".into(),
        line: 10,
        offset: 0x40,
        has_dwarf: true,
        embedding,
    }
}

#[tokio::test]
async fn function_upsert_is_single_row_and_embedding_immutable() {
    let db = test_db().await;

    db.upsert_functions("svc", "bld-1", &[func("f", Some(vec![0.5; EMBEDDING_DIM]))])
        .await
        .unwrap();
    // Same identity, new scalar fields, different embedding.
    let mut changed = func("f", Some(vec![0.9; EMBEDDING_DIM]));
    changed.line = 99;
    db.upsert_functions("svc", "bld-1", &[changed]).await.unwrap();

    let rows = function::Entity::find().all(db.conn()).await.unwrap();
    assert_eq!(rows.len(), 1, "one row per (service, function, binary)");
    assert_eq!(rows[0].line, 99, "scalar columns follow the upsert");

    let embedding: Vec<f32> =
        serde_json::from_str(rows[0].embedding.as_deref().unwrap()).unwrap();
    assert_eq!(embedding[0], 0.5, "embedding is write-once");

    // A different binary hash is a different row.
    db.upsert_functions("svc", "bld-2", &[func("f", None)])
        .await
        .unwrap();
    assert_eq!(db.function_count("svc", "bld-2").await.unwrap(), 1);
    assert_eq!(
        function::Entity::find().all(db.conn()).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn binary_version_first_seen_survives_replay() {
    let db = test_db().await;

    db.record_binary_version("svc", "bld-1").await.unwrap();
    let first = db.binary_versions_for("svc").await.unwrap()[0].first_seen;

    db.record_binary_version("svc", "bld-1").await.unwrap();
    let versions = db.binary_versions_for("svc").await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].first_seen, first);
}

#[tokio::test]
async fn service_reconciliation_upserts_active_rows() {
    let db = test_db().await;

    let services = vec![
        ServiceInfo {
            name: "checkout".into(),
            binary_hash: Some("bld-1".into()),
            language: Some("go".into()),
            pid: Some(1),
        },
        ServiceInfo {
            name: "billing".into(),
            binary_hash: None,
            language: None,
            pid: None,
        },
    ];
    db.upsert_services("a1", &services).await.unwrap();
    db.upsert_services("a1", &services).await.unwrap();

    let names = db.registered_service_names().await.unwrap();
    assert_eq!(names, vec!["billing", "checkout"]);

    let pairs = db.registered_service_agents().await.unwrap();
    assert_eq!(pairs.len(), 2);
    assert!(pairs.iter().all(|(_, agent)| agent == "a1"));
}
