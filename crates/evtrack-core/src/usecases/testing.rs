//! In-memory port implementations shared by the use case tests

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{EventId, EventRecord, RowId, SyncTask, Watermark};
use crate::ports::{IDeviceRegistry, ILocalStore, IPollWatermark, ITaskSink};

/// Event store keyed by uuid, with an optional uuid whose writes fail
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<EventId, EventRecord>>,
    next_row_id: Mutex<i64>,
    failing_uuid: Mutex<Option<EventId>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record as-is, bypassing `upsert`'s row id assignment
    pub fn seed(&self, record: EventRecord) -> RowId {
        let mut next = self.next_row_id.lock().unwrap();
        *next += 1;
        let row_id = RowId::new(*next);
        let record = record.with_row_id(row_id);
        self.records
            .lock()
            .unwrap()
            .insert(record.uuid().clone(), record);
        row_id
    }

    pub fn fail_writes_for(&self, uuid: &EventId) {
        *self.failing_uuid.lock().unwrap() = Some(uuid.clone());
    }

    pub fn get(&self, uuid: &EventId) -> Option<EventRecord> {
        self.records.lock().unwrap().get(uuid).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl ILocalStore for MemoryStore {
    async fn find_by_uuid(&self, uuid: &EventId) -> anyhow::Result<Option<EventRecord>> {
        Ok(self.get(uuid))
    }

    async fn find_by_row_id(&self, row_id: RowId) -> anyhow::Result<Option<EventRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .find(|r| r.row_id() == Some(row_id))
            .cloned())
    }

    async fn upsert(&self, record: &EventRecord) -> anyhow::Result<RowId> {
        if self.failing_uuid.lock().unwrap().as_ref() == Some(record.uuid()) {
            anyhow::bail!("disk full");
        }

        let existing = self
            .records
            .lock()
            .unwrap()
            .get(record.uuid())
            .and_then(|r| r.row_id());
        let row_id = match existing {
            Some(id) => id,
            None => {
                let mut next = self.next_row_id.lock().unwrap();
                *next += 1;
                RowId::new(*next)
            }
        };

        let mut stored = record.clone();
        stored.set_row_id(row_id);
        self.records
            .lock()
            .unwrap()
            .insert(stored.uuid().clone(), stored);
        Ok(row_id)
    }

    async fn mark_deleted(&self, row_id: RowId) -> anyhow::Result<Option<EventRecord>> {
        let mut records = self.records.lock().unwrap();
        let record = records.values_mut().find(|r| r.row_id() == Some(row_id));
        Ok(record.map(|r| {
            r.mark_deleted();
            r.clone()
        }))
    }

    async fn list(&self, include_deleted: bool) -> anyhow::Result<Vec<EventRecord>> {
        let mut records: Vec<EventRecord> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| include_deleted || !r.is_deleted())
            .cloned()
            .collect();
        records.sort_by_key(|r| std::cmp::Reverse(r.start_time()));
        Ok(records)
    }
}

#[derive(Default)]
pub struct MemoryWatermark {
    value: Mutex<Option<Watermark>>,
}

impl MemoryWatermark {
    pub fn with(value: &str) -> Self {
        Self {
            value: Mutex::new(Some(Watermark::new(value.to_string()).unwrap())),
        }
    }

    pub fn current(&self) -> Option<String> {
        self.value
            .lock()
            .unwrap()
            .as_ref()
            .map(|w| w.as_str().to_string())
    }
}

#[async_trait]
impl IPollWatermark for MemoryWatermark {
    async fn get(&self) -> anyhow::Result<Option<Watermark>> {
        Ok(self.value.lock().unwrap().clone())
    }

    async fn set(&self, watermark: &Watermark) -> anyhow::Result<()> {
        *self.value.lock().unwrap() = Some(watermark.clone());
        Ok(())
    }
}

/// Sink that records submitted tasks
#[derive(Default)]
pub struct RecordingSink {
    tasks: Mutex<Vec<SyncTask>>,
}

impl RecordingSink {
    pub fn tasks(&self) -> Vec<SyncTask> {
        self.tasks.lock().unwrap().clone()
    }
}

#[async_trait]
impl ITaskSink for RecordingSink {
    async fn submit(&self, task: SyncTask) -> anyhow::Result<()> {
        self.tasks.lock().unwrap().push(task);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryRegistry {
    registered: Mutex<bool>,
}

#[async_trait]
impl IDeviceRegistry for MemoryRegistry {
    async fn is_registered(&self) -> anyhow::Result<bool> {
        Ok(*self.registered.lock().unwrap())
    }

    async fn mark_registered(&self) -> anyhow::Result<()> {
        *self.registered.lock().unwrap() = true;
        Ok(())
    }
}
