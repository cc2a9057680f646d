//! SQLite implementation of IOutbox
//!
//! Queue order is the autoincrement `id`. Push payloads are stored as the
//! JSON form of the full `EventRecord` snapshot taken at enqueue time.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use evtrack_core::domain::{EventRecord, RequestKind, SyncTask};
use evtrack_core::ports::{IOutbox, OutboxEntry, OutboxStatus};

use crate::{parse_datetime, CacheError};

/// SQLite-based durable task queue
pub struct SqliteOutbox {
    pool: SqlitePool,
}

impl SqliteOutbox {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Number of dead-lettered entries
    pub async fn failed_count(&self) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM outbox WHERE status = 'failed'")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn entry_from_row(row: &SqliteRow) -> Result<OutboxEntry, CacheError> {
    let id: i64 = row.get("id");
    let kind_str: String = row.get("kind");
    let payload_str: Option<String> = row.get("payload");
    let status_str: String = row.get("status");
    let attempts: i64 = row.get("attempts");
    let next_attempt_at: String = row.get("next_attempt_at");
    let last_error: Option<String> = row.get("last_error");
    let created_at: String = row.get("created_at");

    let kind: RequestKind = kind_str
        .parse()
        .map_err(|e| CacheError::SerializationError(format!("{}", e)))?;
    let payload = match payload_str {
        Some(ref json) => Some(serde_json::from_str::<EventRecord>(json).map_err(|e| {
            CacheError::SerializationError(format!("Invalid outbox payload {}: {}", id, e))
        })?),
        None => None,
    };
    let task = SyncTask::new(kind, payload)
        .map_err(|e| CacheError::SerializationError(format!("Outbox entry {}: {}", id, e)))?;
    let status: OutboxStatus = status_str
        .parse()
        .map_err(|e| CacheError::SerializationError(format!("{}", e)))?;

    Ok(OutboxEntry {
        id,
        task,
        attempts: attempts.max(0) as u32,
        next_attempt_at: parse_datetime(&next_attempt_at)?,
        last_error,
        status,
        created_at: parse_datetime(&created_at)?,
    })
}

#[async_trait::async_trait]
impl IOutbox for SqliteOutbox {
    async fn enqueue(&self, task: &SyncTask) -> anyhow::Result<i64> {
        let payload = match task.payload() {
            Some(event) => Some(
                serde_json::to_string(event)
                    .map_err(|e| anyhow::anyhow!("Failed to serialize task payload: {}", e))?,
            ),
            None => None,
        };
        let now = format_datetime(Utc::now());

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO outbox (kind, payload, status, attempts, next_attempt_at, created_at)
            VALUES (?, ?, 'pending', 0, ?, ?)
            RETURNING id
            "#,
        )
        .bind(task.kind().as_str())
        .bind(payload)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(id, task = %task, "Task enqueued");
        Ok(id)
    }

    async fn head(&self) -> anyhow::Result<Option<OutboxEntry>> {
        let row = sqlx::query("SELECT * FROM outbox WHERE status = 'pending' ORDER BY id LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(entry_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn complete(&self, id: i64) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM outbox WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reschedule(
        &self,
        id: i64,
        attempts: u32,
        next_attempt_at: DateTime<Utc>,
        last_error: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE outbox SET attempts = ?, next_attempt_at = ?, last_error = ? WHERE id = ?",
        )
        .bind(i64::from(attempts))
        .bind(format_datetime(next_attempt_at))
        .bind(last_error)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail(&self, id: i64, error: &str) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE outbox SET status = 'failed', attempts = attempts + 1, last_error = ? WHERE id = ?",
        )
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn depth(&self) -> anyhow::Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM outbox WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    async fn has_pending(&self, kind: RequestKind) -> anyhow::Result<bool> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM outbox WHERE status = 'pending' AND kind = ?)",
        )
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists != 0)
    }

    async fn list(&self) -> anyhow::Result<Vec<OutboxEntry>> {
        let rows = sqlx::query("SELECT * FROM outbox ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| entry_from_row(r).map_err(Into::into))
            .collect()
    }

    async fn requeue_failed(&self) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE outbox
            SET status = 'pending', attempts = 0, next_attempt_at = ?
            WHERE status = 'failed'
            "#,
        )
        .bind(format_datetime(Utc::now()))
        .execute(&self.pool)
        .await?;

        let revived = result.rows_affected();
        if revived > 0 {
            tracing::info!(revived, "Failed outbox entries requeued");
        }
        Ok(revived)
    }
}
