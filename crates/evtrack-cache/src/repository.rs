//! SQLite implementation of ILocalStore
//!
//! ## Type Mapping
//!
//! | Domain Type          | SQL Type | Strategy                                  |
//! |----------------------|----------|-------------------------------------------|
//! | RowId                | INTEGER  | `row_id` primary key                      |
//! | EventId              | TEXT     | `.as_str()` / `EventId::new()`, UNIQUE    |
//! | UpdatedAt            | TEXT     | RFC 3339 millis via `Display` / `parse()` |
//! | bool                 | INTEGER  | 0 / 1                                     |
//! | Vec<GpsCoordinate>   | TEXT     | serde_json array                          |

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use evtrack_core::domain::{EventId, EventRecord, GpsCoordinate, RowId, UpdatedAt};
use evtrack_core::ports::ILocalStore;

use crate::CacheError;

/// SQLite-based implementation of the local event store port
pub struct SqliteEventStore {
    pool: SqlitePool,
}

impl SqliteEventStore {
    /// Creates a new store instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Number of live (non-deleted) records
    pub async fn count_live(&self) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE deleted = 0")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn event_from_row(row: &SqliteRow) -> Result<EventRecord, CacheError> {
    let row_id: i64 = row.get("row_id");
    let uuid_str: String = row.get("uuid");
    let name: String = row.get("name");
    let notes: String = row.get("notes");
    let start_time: i64 = row.get("start_time");
    let end_time: i64 = row.get("end_time");
    let updated_at_str: Option<String> = row.get("updated_at");
    let deleted: bool = row.get("deleted");
    let persisted: bool = row.get("persisted");
    let gps_data: String = row.get("gps_data");

    let uuid = EventId::new(uuid_str)
        .map_err(|e| CacheError::SerializationError(format!("Invalid uuid: {}", e)))?;
    let updated_at = match updated_at_str {
        Some(ref s) if !s.is_empty() => Some(UpdatedAt::parse(s).map_err(|e| {
            CacheError::SerializationError(format!("Invalid updated_at '{}': {}", s, e))
        })?),
        _ => None,
    };
    let gps: Vec<GpsCoordinate> = serde_json::from_str(&gps_data)
        .map_err(|e| CacheError::SerializationError(format!("Invalid gps_data: {}", e)))?;

    Ok(EventRecord::from_parts(
        RowId::new(row_id),
        uuid,
        name,
        notes,
        start_time,
        end_time,
        updated_at,
        deleted,
        persisted,
        gps,
    ))
}

// ============================================================================
// ILocalStore implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalStore for SqliteEventStore {
    async fn find_by_uuid(&self, uuid: &EventId) -> anyhow::Result<Option<EventRecord>> {
        let row = sqlx::query("SELECT * FROM events WHERE uuid = ?")
            .bind(uuid.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(event_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_row_id(&self, row_id: RowId) -> anyhow::Result<Option<EventRecord>> {
        let row = sqlx::query("SELECT * FROM events WHERE row_id = ?")
            .bind(row_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(event_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, record: &EventRecord) -> anyhow::Result<RowId> {
        let updated_at = record.updated_at().map(|u| u.to_string());
        let gps_data = serde_json::to_string(record.gps())
            .map_err(|e| anyhow::anyhow!("Failed to serialize gps_data: {}", e))?;

        let row_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO events
                (uuid, name, notes, start_time, end_time, updated_at, deleted, persisted, gps_data)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(uuid) DO UPDATE SET
                name = excluded.name,
                notes = excluded.notes,
                start_time = excluded.start_time,
                end_time = excluded.end_time,
                updated_at = excluded.updated_at,
                deleted = excluded.deleted,
                persisted = excluded.persisted,
                gps_data = excluded.gps_data
            RETURNING row_id
            "#,
        )
        .bind(record.uuid().as_str())
        .bind(record.name())
        .bind(record.notes())
        .bind(record.start_time())
        .bind(record.end_time())
        .bind(updated_at)
        .bind(record.is_deleted())
        .bind(record.is_persisted())
        .bind(gps_data)
        .fetch_one(&self.pool)
        .await?;

        tracing::trace!(uuid = %record.uuid(), row_id, "Event upserted");
        Ok(RowId::new(row_id))
    }

    async fn mark_deleted(&self, row_id: RowId) -> anyhow::Result<Option<EventRecord>> {
        let Some(mut record) = self.find_by_row_id(row_id).await? else {
            return Ok(None);
        };

        record.mark_deleted();
        let updated_at = record.updated_at().map(|u| u.to_string());

        sqlx::query("UPDATE events SET deleted = 1, updated_at = ? WHERE row_id = ?")
            .bind(updated_at)
            .bind(row_id.as_i64())
            .execute(&self.pool)
            .await?;

        Ok(Some(record))
    }

    async fn list(&self, include_deleted: bool) -> anyhow::Result<Vec<EventRecord>> {
        let sql = if include_deleted {
            "SELECT * FROM events ORDER BY start_time DESC, row_id DESC"
        } else {
            "SELECT * FROM events WHERE deleted = 0 ORDER BY start_time DESC, row_id DESC"
        };

        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|r| event_from_row(r).map_err(Into::into))
            .collect()
    }
}
