//! Device settings backed by the `settings` key/value table
//!
//! Holds the poll watermark and the registration flag. Both ports are
//! implemented by the same struct since they share the table.

use chrono::Utc;
use sqlx::SqlitePool;

use evtrack_core::domain::Watermark;
use evtrack_core::ports::{IDeviceRegistry, IPollWatermark};

use crate::CacheError;

const KEY_POLL_WATERMARK: &str = "poll_watermark";
const KEY_REGISTERED: &str = "device_registered";

/// SQLite-based settings store
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn get_value(&self, key: &str) -> Result<Option<String>, CacheError> {
        let value = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), CacheError> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl IPollWatermark for SqliteSettingsStore {
    async fn get(&self) -> anyhow::Result<Option<Watermark>> {
        match self.get_value(KEY_POLL_WATERMARK).await? {
            Some(value) => Ok(Some(Watermark::new(value).map_err(|e| {
                CacheError::SerializationError(format!("Stored watermark is invalid: {}", e))
            })?)),
            None => Ok(None),
        }
    }

    async fn set(&self, watermark: &Watermark) -> anyhow::Result<()> {
        self.set_value(KEY_POLL_WATERMARK, watermark.as_str())
            .await?;
        tracing::debug!(watermark = %watermark, "Poll watermark stored");
        Ok(())
    }
}

#[async_trait::async_trait]
impl IDeviceRegistry for SqliteSettingsStore {
    async fn is_registered(&self) -> anyhow::Result<bool> {
        Ok(self.get_value(KEY_REGISTERED).await?.as_deref() == Some("true"))
    }

    async fn mark_registered(&self) -> anyhow::Result<()> {
        self.set_value(KEY_REGISTERED, "true").await?;
        Ok(())
    }
}
