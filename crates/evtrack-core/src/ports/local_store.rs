//! Local event store port (driven/secondary port)
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   and callers only need to know that the write did not happen.
//! - Each method is a single atomic write or read. The sync worker is the
//!   only writer on the sync side, so no transactions span calls.
//! - Rows are never removed; `mark_deleted` turns a record into a tombstone.

use crate::domain::{EventId, EventRecord, RowId};

/// Port trait for durable storage of [`EventRecord`]s
#[async_trait::async_trait]
pub trait ILocalStore: Send + Sync {
    /// Looks up a record by its global identity
    async fn find_by_uuid(&self, uuid: &EventId) -> anyhow::Result<Option<EventRecord>>;

    /// Looks up a record by its local surrogate key
    async fn find_by_row_id(&self, row_id: RowId) -> anyhow::Result<Option<EventRecord>>;

    /// Inserts or replaces the record with the same uuid
    ///
    /// Returns the row id of the stored record (existing or newly assigned).
    async fn upsert(&self, record: &EventRecord) -> anyhow::Result<RowId>;

    /// Sets the tombstone flag and stamps a fresh `updated_at`
    ///
    /// Returns the tombstoned record, or `None` if no row has this id.
    async fn mark_deleted(&self, row_id: RowId) -> anyhow::Result<Option<EventRecord>>;

    /// Lists records, most recently started first
    async fn list(&self, include_deleted: bool) -> anyhow::Result<Vec<EventRecord>>;
}
