//! Task sink port
//!
//! The seam between use cases and the sync worker. Submission must not
//! wait for the task to run: implementations persist the task and return.

use crate::domain::SyncTask;

#[async_trait::async_trait]
pub trait ITaskSink: Send + Sync {
    /// Queues `task` for serialized dispatch
    async fn submit(&self, task: SyncTask) -> anyhow::Result<()>;
}
