//! Poll-response merges against the SQLite adapters
//!
//! Runs the `Reconciler` over `SqliteEventStore` and `SqliteSettingsStore` so
//! that what the merge compares is exactly what the database stores.

use std::sync::Arc;

use evtrack_cache::{DatabasePool, SqliteEventStore, SqliteSettingsStore};
use evtrack_core::domain::{EventId, EventRecord, UpdatedAt};
use evtrack_core::ports::{ILocalStore, IPollWatermark};
use evtrack_core::usecases::Reconciler;
use serde_json::{json, Value};

// ============================================================================
// Test helpers
// ============================================================================

struct Fixture {
    _pool: DatabasePool,
    store: Arc<SqliteEventStore>,
    settings: Arc<SqliteSettingsStore>,
    reconciler: Reconciler,
}

async fn setup() -> Fixture {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    let store = Arc::new(SqliteEventStore::new(pool.pool().clone()));
    let settings = Arc::new(SqliteSettingsStore::new(pool.pool().clone()));
    let reconciler = Reconciler::new(store.clone(), settings.clone());
    Fixture {
        _pool: pool,
        store,
        settings,
        reconciler,
    }
}

fn id(s: &str) -> EventId {
    EventId::new(s.to_string()).unwrap()
}

fn ts(s: &str) -> UpdatedAt {
    UpdatedAt::parse(s).unwrap()
}

fn snapshot(updated_at: &str, name: &str, deleted: bool) -> Value {
    json!({
        "uuid": "A",
        "updated_at": updated_at,
        "name": name,
        "notes": "",
        "startTime": 1_000,
        "endTime": 2_000,
        "deleted": deleted,
    })
}

fn body(poll_time: &str, events: Vec<Value>) -> Vec<u8> {
    serde_json::to_vec(&json!({ "pollTime": poll_time, "events": events })).unwrap()
}

// ============================================================================
// Merges
// ============================================================================

#[tokio::test]
async fn test_sub_millisecond_order_survives_storage() {
    let f = setup().await;

    f.reconciler
        .apply_poll_response(&body(
            "T1",
            vec![snapshot("2020-01-01T10:00:00.123900Z", "Newer", false)],
        ))
        .await
        .unwrap();
    let report = f
        .reconciler
        .apply_poll_response(&body(
            "T2",
            vec![snapshot("2020-01-01T10:00:00.123500Z", "Older", false)],
        ))
        .await
        .unwrap();

    assert_eq!(report.skipped_local_newer, 1);
    assert_eq!(report.applied, 0);
    let a = f.store.find_by_uuid(&id("A")).await.unwrap().unwrap();
    assert_eq!(a.name(), "Newer");
    assert_eq!(a.updated_at(), Some(&ts("2020-01-01T10:00:00.123900Z")));
}

#[tokio::test]
async fn test_partial_snapshot_leaves_stored_tombstone() {
    let f = setup().await;
    f.store
        .upsert(
            &EventRecord::new("Lunch", "soup", 1_000)
                .with_uuid(id("A"))
                .with_end_time(2_000)
                .with_updated_at(Some(ts("2020-01-01T10:00:00Z")))
                .with_persisted(true),
        )
        .await
        .unwrap();

    f.reconciler
        .apply_poll_response(&body(
            "T1",
            vec![snapshot("2020-01-01T11:00:00Z", "Lunch", true)],
        ))
        .await
        .unwrap();
    let report = f
        .reconciler
        .apply_poll_response(&body(
            "T2",
            vec![json!({ "uuid": "A", "updated_at": "2020-01-01T12:00:00Z", "startTime": 1 })],
        ))
        .await
        .unwrap();

    assert_eq!(report.malformed, 1);
    let a = f.store.find_by_uuid(&id("A")).await.unwrap().unwrap();
    assert!(a.is_deleted());
    assert_eq!(a.name(), "Lunch");
    assert_eq!(a.end_time(), 2_000);
    assert_eq!(a.updated_at(), Some(&ts("2020-01-01T11:00:00Z")));
    assert_eq!(
        f.settings.get().await.unwrap().map(|w| w.as_str().to_string()),
        Some("T2".to_string())
    );
}

#[tokio::test]
async fn test_merge_twice_is_idempotent_on_disk() {
    let f = setup().await;
    let response = body(
        "T1",
        vec![snapshot("2020-01-01T11:00:00.000250Z", "Dinner", false)],
    );

    f.reconciler.apply_poll_response(&response).await.unwrap();
    let first = f.store.find_by_uuid(&id("A")).await.unwrap().unwrap();
    f.reconciler.apply_poll_response(&response).await.unwrap();
    let second = f.store.find_by_uuid(&id("A")).await.unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(f.store.list(true).await.unwrap().len(), 1);
}
