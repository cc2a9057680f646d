//! evtrack Cache - Local persistence
//!
//! SQLite-based storage for:
//! - Event records (including tombstones)
//! - Device settings (poll watermark, registration flag)
//! - The durable sync outbox
//!
//! ## Architecture
//!
//! This crate implements the storage ports from `evtrack-core`
//! using SQLite as the storage backend. It is a driven (secondary) adapter
//! in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteEventStore`] - `ILocalStore` implementation
//! - [`SqliteSettingsStore`] - `IPollWatermark` and `IDeviceRegistry`
//! - [`SqliteOutbox`] - `IOutbox` implementation
//! - [`CacheError`] - Error types for cache operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use evtrack_cache::{DatabasePool, SqliteEventStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/evtrack/evtrack.db")).await?;
//! let store = SqliteEventStore::new(pool.pool().clone());
//! // Use store as ILocalStore...
//! # Ok(())
//! # }
//! ```

pub mod outbox;
pub mod pool;
pub mod repository;
pub mod settings;

pub use outbox::SqliteOutbox;
pub use pool::DatabasePool;
pub use repository::SqliteEventStore;
pub use settings::SqliteSettingsStore;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Serialization or deserialization of domain types failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}

/// Parse a stored RFC 3339 timestamp
pub(crate) fn parse_datetime(s: &str) -> Result<chrono::DateTime<chrono::Utc>, CacheError> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .or_else(|_| {
            // SQLite's own datetime() format
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| {
            CacheError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}
