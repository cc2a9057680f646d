//! Integration tests for SqliteEventStore and SqliteSettingsStore
//!
//! Each test function creates a fresh in-memory database to ensure test
//! isolation.

use evtrack_cache::{DatabasePool, SqliteEventStore, SqliteSettingsStore};
use evtrack_core::domain::{EventId, EventRecord, GpsCoordinate, RowId, UpdatedAt, Watermark};
use evtrack_core::ports::{IDeviceRegistry, ILocalStore, IPollWatermark};

// ============================================================================
// Test helpers
// ============================================================================

async fn setup() -> (DatabasePool, SqliteEventStore) {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    let store = SqliteEventStore::new(pool.pool().clone());
    (pool, store)
}

fn id(s: &str) -> EventId {
    EventId::new(s.to_string()).unwrap()
}

fn ts(s: &str) -> UpdatedAt {
    UpdatedAt::parse(s).unwrap()
}

fn lunch() -> EventRecord {
    EventRecord::new("Lunch", "soup", 1_000)
        .with_uuid(id("A"))
        .with_end_time(2_000)
        .with_updated_at(Some(ts("2020-01-01T10:00:00Z")))
        .with_persisted(true)
}

// ============================================================================
// Event store
// ============================================================================

#[tokio::test]
async fn test_upsert_then_find_by_uuid() {
    let (_pool, store) = setup().await;

    let row_id = store.upsert(&lunch()).await.unwrap();
    let found = store.find_by_uuid(&id("A")).await.unwrap().unwrap();

    assert_eq!(found.row_id(), Some(row_id));
    assert_eq!(found.name(), "Lunch");
    assert_eq!(found.notes(), "soup");
    assert_eq!(found.start_time(), 1_000);
    assert_eq!(found.end_time(), 2_000);
    assert_eq!(found.updated_at(), Some(&ts("2020-01-01T10:00:00Z")));
    assert!(found.is_persisted());
    assert!(!found.is_deleted());
}

#[tokio::test]
async fn test_upsert_same_uuid_keeps_row_id() {
    let (_pool, store) = setup().await;

    let first = store.upsert(&lunch()).await.unwrap();
    let edited = EventRecord::new("Dinner", "", 1_000)
        .with_uuid(id("A"))
        .with_updated_at(Some(ts("2020-01-01T11:00:00Z")))
        .with_persisted(true);
    let second = store.upsert(&edited).await.unwrap();

    assert_eq!(first, second);
    let found = store.find_by_row_id(first).await.unwrap().unwrap();
    assert_eq!(found.name(), "Dinner");
    assert_eq!(store.list(true).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_find_missing_returns_none() {
    let (_pool, store) = setup().await;

    assert!(store.find_by_uuid(&id("nope")).await.unwrap().is_none());
    assert!(store.find_by_row_id(RowId::new(99)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_gps_trace_roundtrip() {
    let (_pool, store) = setup().await;
    let record = lunch().with_gps(vec![
        GpsCoordinate::new(40.4168, -3.7038, 1_000),
        GpsCoordinate::new(40.4170, -3.7040, 1_500),
    ]);

    store.upsert(&record).await.unwrap();
    let found = store.find_by_uuid(&id("A")).await.unwrap().unwrap();

    assert_eq!(found.gps(), record.gps());
}

#[tokio::test]
async fn test_placeholder_without_updated_at() {
    let (_pool, store) = setup().await;

    store
        .upsert(&EventRecord::placeholder(id("B")))
        .await
        .unwrap();
    let found = store.find_by_uuid(&id("B")).await.unwrap().unwrap();

    assert!(found.updated_at().is_none());
    assert!(!found.is_persisted());
}

#[tokio::test]
async fn test_mark_deleted_keeps_row_and_touches() {
    let (_pool, store) = setup().await;
    let row_id = store.upsert(&lunch()).await.unwrap();

    let tombstone = store.mark_deleted(row_id).await.unwrap().unwrap();
    assert!(tombstone.is_deleted());
    assert!(*tombstone.updated_at().unwrap() > ts("2020-01-01T10:00:00Z"));

    let found = store.find_by_row_id(row_id).await.unwrap().unwrap();
    assert!(found.is_deleted());
    assert_eq!(found.updated_at(), tombstone.updated_at());
    assert_eq!(found.name(), "Lunch");
}

#[tokio::test]
async fn test_mark_deleted_unknown_row() {
    let (_pool, store) = setup().await;
    assert!(store.mark_deleted(RowId::new(7)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_orders_by_start_and_filters_tombstones() {
    let (_pool, store) = setup().await;
    store.upsert(&lunch()).await.unwrap();
    store
        .upsert(&EventRecord::new("Gym", "", 5_000).with_uuid(id("B")))
        .await
        .unwrap();
    let deleted = store
        .upsert(&EventRecord::new("Nap", "", 3_000).with_uuid(id("C")))
        .await
        .unwrap();
    store.mark_deleted(deleted).await.unwrap();

    let live: Vec<String> = store
        .list(false)
        .await
        .unwrap()
        .iter()
        .map(|r| r.name().to_string())
        .collect();
    assert_eq!(live, vec!["Gym", "Lunch"]);
    assert_eq!(store.list(true).await.unwrap().len(), 3);
    assert_eq!(store.count_live().await.unwrap(), 2);
}

#[tokio::test]
async fn test_file_database_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("evtrack.db");

    {
        let pool = DatabasePool::new(&path).await.unwrap();
        SqliteEventStore::new(pool.pool().clone())
            .upsert(&lunch())
            .await
            .unwrap();
        pool.close().await;
    }

    let pool = DatabasePool::new(&path).await.unwrap();
    let store = SqliteEventStore::new(pool.pool().clone());
    assert!(store.find_by_uuid(&id("A")).await.unwrap().is_some());
}

// ============================================================================
// Settings
// ============================================================================

#[tokio::test]
async fn test_watermark_starts_empty_and_updates() {
    let (pool, _) = setup().await;
    let settings = SqliteSettingsStore::new(pool.pool().clone());

    assert!(IPollWatermark::get(&settings).await.unwrap().is_none());

    settings
        .set(&Watermark::new("T1".to_string()).unwrap())
        .await
        .unwrap();
    settings
        .set(&Watermark::new("T2".to_string()).unwrap())
        .await
        .unwrap();

    let current = IPollWatermark::get(&settings).await.unwrap().unwrap();
    assert_eq!(current.as_str(), "T2");
}

#[tokio::test]
async fn test_registration_flag() {
    let (pool, _) = setup().await;
    let settings = SqliteSettingsStore::new(pool.pool().clone());

    assert!(!settings.is_registered().await.unwrap());
    settings.mark_registered().await.unwrap();
    assert!(settings.is_registered().await.unwrap());
}
