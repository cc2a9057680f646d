//! Event tracking use case
//!
//! Local mutations always hit the store first; the sync task that mirrors
//! them to the server is submitted afterwards. A failure to submit is
//! logged and swallowed: the local write already happened and editing must
//! never block on the network side.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::{
    domain::{
        EventEdit, EventFeatures, EventRecord, GpsCoordinate, NameCatalog, RowId, SyncError,
        SyncTask,
    },
    ports::{IDeviceRegistry, ILocalStore, ITaskSink},
};

/// Use case for creating, editing and deleting tracked events
pub struct EventService {
    store: Arc<dyn ILocalStore + Send + Sync>,
    sink: Arc<dyn ITaskSink + Send + Sync>,
}

impl EventService {
    /// Creates a new EventService
    ///
    /// # Arguments
    ///
    /// * `store` - Local event store
    /// * `sink` - Destination of the sync tasks triggered by mutations
    pub fn new(
        store: Arc<dyn ILocalStore + Send + Sync>,
        sink: Arc<dyn ITaskSink + Send + Sync>,
    ) -> Self {
        Self { store, sink }
    }

    /// Starts tracking a new event
    ///
    /// The event is committed locally but not uploaded until it is finished.
    pub async fn start_event(
        &self,
        name: &str,
        notes: &str,
        start_time: i64,
    ) -> Result<EventRecord> {
        let mut record = EventRecord::new(name, notes, start_time);
        record.mark_persisted();
        let row_id = self
            .store
            .upsert(&record)
            .await
            .context("Failed to store new event")?;
        record.set_row_id(row_id);

        info!(row_id = %row_id, uuid = %record.uuid(), "Event started");
        Ok(record)
    }

    /// Appends a GPS fix to an event's trace
    pub async fn record_location(
        &self,
        row_id: RowId,
        coordinate: GpsCoordinate,
    ) -> Result<EventRecord> {
        let mut record = self.load_live(row_id).await?;
        record.add_gps(coordinate);
        self.store
            .upsert(&record)
            .await
            .context("Failed to store GPS fix")?;
        Ok(record)
    }

    /// Stops tracking an event and uploads it
    ///
    /// # Errors
    ///
    /// Returns an error if the event does not exist, is deleted, or
    /// `end_time` is not a valid end for it
    pub async fn finish_event(&self, row_id: RowId, end_time: i64) -> Result<EventRecord> {
        let mut record = self.load_live(row_id).await?;
        record.finish(end_time)?;
        self.store
            .upsert(&record)
            .await
            .context("Failed to store finished event")?;

        info!(row_id = %row_id, uuid = %record.uuid(), "Event finished");
        self.submit(SyncTask::upload(record.clone())).await;
        Ok(record)
    }

    /// Applies a user edit
    ///
    /// Nothing is written or submitted when the edit changes nothing.
    pub async fn edit_event(&self, row_id: RowId, edit: &EventEdit) -> Result<EventRecord> {
        let mut record = self.load_live(row_id).await?;

        if !record.apply_edit(edit) {
            debug!(row_id = %row_id, "Edit has no changes");
            return Ok(record);
        }
        if !record.has_valid_interval() {
            anyhow::bail!(
                "Event cannot end ({}) before it starts ({})",
                record.end_time(),
                record.start_time()
            );
        }

        self.store
            .upsert(&record)
            .await
            .context("Failed to store edited event")?;

        info!(row_id = %row_id, uuid = %record.uuid(), "Event edited");
        self.submit(SyncTask::update(record.clone())).await;
        Ok(record)
    }

    /// Tombstones an event and propagates the deletion
    pub async fn delete_event(&self, row_id: RowId) -> Result<EventRecord> {
        let record = self
            .store
            .mark_deleted(row_id)
            .await
            .context("Failed to tombstone event")?
            .with_context(|| format!("Event {row_id} not found"))?;

        info!(row_id = %row_id, uuid = %record.uuid(), "Event deleted");
        self.submit(SyncTask::delete(record.clone())).await;
        Ok(record)
    }

    /// Asks for a poll of remote changes
    pub async fn request_poll(&self) -> Result<()> {
        self.sink
            .submit(SyncTask::poll())
            .await
            .context("Failed to queue poll")
    }

    /// Queues device registration on first run
    ///
    /// Returns whether a Register task was submitted.
    pub async fn ensure_registered(&self, registry: &dyn IDeviceRegistry) -> Result<bool> {
        if registry
            .is_registered()
            .await
            .context("Failed to read registration flag")?
        {
            return Ok(false);
        }

        self.sink
            .submit(SyncTask::register())
            .await
            .context("Failed to queue registration")?;
        info!("Device registration queued");
        Ok(true)
    }

    pub async fn get_event(&self, row_id: RowId) -> Result<Option<EventRecord>> {
        self.store
            .find_by_row_id(row_id)
            .await
            .context("Failed to load event")
    }

    pub async fn list_events(&self, include_deleted: bool) -> Result<Vec<EventRecord>> {
        self.store
            .list(include_deleted)
            .await
            .context("Failed to list events")
    }

    /// Classifier features of every finished, live event
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnknownAttribute`] (wrapped) on the first event
    /// whose name is not in `catalog`
    pub async fn training_features(&self, catalog: &NameCatalog) -> Result<Vec<EventFeatures>> {
        let records = self.list_events(false).await?;

        let mut features = Vec::new();
        for record in records.iter().filter(|r| !r.is_in_progress()) {
            match EventFeatures::extract(record, catalog) {
                Ok(Some(f)) => features.push(f),
                Ok(None) => {}
                Err(e @ SyncError::UnknownAttribute(_)) => return Err(e.into()),
                Err(e) => {
                    warn!(uuid = %record.uuid(), error = %e, "Skipping event");
                }
            }
        }
        Ok(features)
    }

    async fn load_live(&self, row_id: RowId) -> Result<EventRecord> {
        let record = self
            .store
            .find_by_row_id(row_id)
            .await
            .context("Failed to load event")?
            .with_context(|| format!("Event {row_id} not found"))?;

        if record.is_deleted() {
            anyhow::bail!("Event {row_id} has been deleted");
        }
        Ok(record)
    }

    async fn submit(&self, task: SyncTask) {
        let label = task.to_string();
        if let Err(e) = self.sink.submit(task).await {
            warn!(task = %label, error = %e, "Failed to queue sync task");
        }
    }
}
