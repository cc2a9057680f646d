//! Poll-response merge
//!
//! Folds the remote snapshots of a poll response into the local store with
//! last-writer-wins on `updated_at`, then advances the poll watermark.
//!
//! ## Merge rules (per snapshot, in server order)
//!
//! 1. Look up the local copy by uuid, or start from an unpersisted placeholder
//! 2. Local strictly newer: skip
//! 3. Remote tombstone for a record never persisted locally: skip
//! 4. Otherwise overwrite content, tombstone and `updated_at`, commit as persisted
//!
//! A malformed snapshot is skipped without affecting its neighbours. The
//! watermark only moves once the whole response has been merged; a store
//! failure on any snapshot holds it back so the next poll re-fetches the
//! same window. Re-applying a snapshot is a no-op, so that is safe.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    domain::{EventRecord, RemoteSnapshot, SyncError, Watermark},
    ports::{ILocalStore, IPollWatermark},
};

/// What happened to one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    Applied,
    SkippedLocalNewer,
    SkippedTombstone,
}

impl SnapshotOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotOutcome::Applied => "applied",
            SnapshotOutcome::SkippedLocalNewer => "skipped_local_newer",
            SnapshotOutcome::SkippedTombstone => "skipped_tombstone",
        }
    }
}

/// Summary of one merged poll response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub applied: u32,
    pub skipped_local_newer: u32,
    pub skipped_tombstone: u32,
    pub malformed: u32,
    pub store_failures: u32,
    pub watermark_advanced: bool,
    /// Watermark carried by the response
    pub watermark: Option<Watermark>,
}

impl MergeReport {
    /// Number of snapshots in the response
    pub fn total(&self) -> u32 {
        self.applied
            + self.skipped_local_newer
            + self.skipped_tombstone
            + self.malformed
            + self.store_failures
    }

    fn record(&mut self, outcome: SnapshotOutcome) {
        match outcome {
            SnapshotOutcome::Applied => self.applied += 1,
            SnapshotOutcome::SkippedLocalNewer => self.skipped_local_newer += 1,
            SnapshotOutcome::SkippedTombstone => self.skipped_tombstone += 1,
        }
    }
}

/// Merges poll responses into the local store
pub struct Reconciler {
    store: Arc<dyn ILocalStore + Send + Sync>,
    watermark: Arc<dyn IPollWatermark + Send + Sync>,
}

impl Reconciler {
    /// Creates a new Reconciler
    ///
    /// # Arguments
    ///
    /// * `store` - Local event store the snapshots are merged into
    /// * `watermark` - Persisted cursor advanced after a complete merge
    pub fn new(
        store: Arc<dyn ILocalStore + Send + Sync>,
        watermark: Arc<dyn IPollWatermark + Send + Sync>,
    ) -> Self {
        Self { store, watermark }
    }

    /// Merges a raw poll response body
    ///
    /// # Errors
    ///
    /// - [`SyncError::Parse`] if the body is not a poll response; nothing is
    ///   merged and the watermark is untouched
    /// - [`SyncError::Store`] if the watermark cannot be written
    #[tracing::instrument(skip(self, body), fields(bytes = body.len()))]
    pub async fn apply_poll_response(&self, body: &[u8]) -> Result<MergeReport, SyncError> {
        let (watermark, events) = parse_envelope(body)?;
        let mut report = MergeReport::default();

        for (index, raw) in events.into_iter().enumerate() {
            let snapshot: RemoteSnapshot = match serde_json::from_value(raw) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(index, error = %e, "Skipping malformed snapshot");
                    report.malformed += 1;
                    continue;
                }
            };

            match self.merge_snapshot(&snapshot).await {
                Ok(outcome) => {
                    debug!(uuid = %snapshot.uuid, outcome = outcome.as_str(), "Snapshot merged");
                    report.record(outcome);
                }
                Err(e) => {
                    warn!(uuid = %snapshot.uuid, error = %e, "Failed to store snapshot");
                    report.store_failures += 1;
                }
            }
        }

        if report.store_failures == 0 {
            self.watermark
                .set(&watermark)
                .await
                .map_err(SyncError::store)?;
            report.watermark_advanced = true;
        } else {
            warn!(
                failures = report.store_failures,
                "Watermark held back after store failures"
            );
        }

        info!(
            applied = report.applied,
            skipped_local_newer = report.skipped_local_newer,
            skipped_tombstone = report.skipped_tombstone,
            malformed = report.malformed,
            watermark = %watermark,
            advanced = report.watermark_advanced,
            "Poll response merged"
        );

        report.watermark = Some(watermark);
        Ok(report)
    }

    /// Merges one snapshot
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] if the lookup or the write fails
    pub async fn merge_snapshot(
        &self,
        snapshot: &RemoteSnapshot,
    ) -> Result<SnapshotOutcome, SyncError> {
        let local = self
            .store
            .find_by_uuid(&snapshot.uuid)
            .await
            .map_err(SyncError::store)?;
        let mut record = local.unwrap_or_else(|| EventRecord::placeholder(snapshot.uuid.clone()));

        if record.is_newer_than(&snapshot.updated_at) {
            return Ok(SnapshotOutcome::SkippedLocalNewer);
        }

        // A tombstone for something this device never had must not create a row
        if snapshot.deleted && !record.is_persisted() {
            return Ok(SnapshotOutcome::SkippedTombstone);
        }

        record.apply_snapshot(snapshot);
        self.store
            .upsert(&record)
            .await
            .map_err(SyncError::store)?;

        Ok(SnapshotOutcome::Applied)
    }
}

/// Splits a poll body into its watermark and raw snapshot list
fn parse_envelope(body: &[u8]) -> Result<(Watermark, Vec<Value>), SyncError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| SyncError::Parse(format!("poll response is not JSON: {e}")))?;

    let poll_time = value
        .get("pollTime")
        .and_then(Value::as_str)
        .ok_or_else(|| SyncError::Parse("pollTime missing or not a string".to_string()))?;
    let watermark = Watermark::new(poll_time.to_string())
        .map_err(|e| SyncError::Parse(e.to_string()))?;

    let events = match value.get("events") {
        Some(Value::Array(events)) => events.clone(),
        _ => {
            return Err(SyncError::Parse(
                "events missing or not an array".to_string(),
            ))
        }
    };

    Ok((watermark, events))
}
