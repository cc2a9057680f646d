//! Outbox port
//!
//! Undelivered sync tasks live in a durable FIFO so they survive restarts.
//! The worker only ever looks at the head: a task waiting for its backoff
//! blocks everything behind it, which keeps pushes for the same uuid in
//! submission order.
//!
//! ```text
//! enqueue ──► Pending ──► complete (removed)
//!               │  ▲
//!    reschedule └──┘
//!               │
//!          fail ▼
//!             Failed ──► requeue_failed ──► Pending
//! ```

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, RequestKind, SyncTask};

/// Delivery state of an outbox entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// Waiting for (re)delivery
    Pending,
    /// Gave up after a permanent error or too many attempts
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Failed => "failed",
        }
    }
}

impl Display for OutboxStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutboxStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OutboxStatus::Pending),
            "failed" => Ok(OutboxStatus::Failed),
            other => Err(DomainError::ValidationFailed(format!(
                "Unknown outbox status: {other}"
            ))),
        }
    }
}

/// A queued task with its delivery bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboxEntry {
    /// Monotonic queue position
    pub id: i64,
    pub task: SyncTask,
    /// Failed attempts so far
    pub attempts: u32,
    /// Earliest instant the next attempt may run
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub status: OutboxStatus,
    pub created_at: DateTime<Utc>,
}

impl OutboxEntry {
    /// Whether the entry may be dispatched at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == OutboxStatus::Pending && self.next_attempt_at <= now
    }
}

/// Port trait for the durable task queue
#[async_trait::async_trait]
pub trait IOutbox: Send + Sync {
    /// Appends a task; it is immediately due
    async fn enqueue(&self, task: &SyncTask) -> anyhow::Result<i64>;

    /// Oldest pending entry, due or not
    async fn head(&self) -> anyhow::Result<Option<OutboxEntry>>;

    /// Removes a delivered entry
    async fn complete(&self, id: i64) -> anyhow::Result<()>;

    /// Records a failed attempt and pushes the entry's next attempt back
    async fn reschedule(
        &self,
        id: i64,
        attempts: u32,
        next_attempt_at: DateTime<Utc>,
        last_error: &str,
    ) -> anyhow::Result<()>;

    /// Moves an entry to the dead letter state
    async fn fail(&self, id: i64, error: &str) -> anyhow::Result<()>;

    /// Number of pending entries
    async fn depth(&self) -> anyhow::Result<u64>;

    /// Whether a pending entry of `kind` exists
    async fn has_pending(&self, kind: RequestKind) -> anyhow::Result<bool>;

    /// All entries (pending and failed) in queue order
    async fn list(&self) -> anyhow::Result<Vec<OutboxEntry>>;

    /// Moves every failed entry back to pending with a fresh attempt count
    ///
    /// Returns how many entries were revived.
    async fn requeue_failed(&self) -> anyhow::Result<u64>;
}
