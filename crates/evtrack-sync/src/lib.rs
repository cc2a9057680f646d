//! evtrack Sync - serialized delivery of sync tasks
//!
//! Provides:
//! - A single worker task draining the durable outbox in FIFO order
//! - Bounded exponential backoff for transient failures
//! - A periodic poll trigger
//!
//! ## Modules
//!
//! - [`worker`] - Outbox-driven dispatch loop and its submission handle
//! - [`retry`] - Backoff schedule
//! - [`scheduler`] - Interval-driven poll submission

pub mod retry;
pub mod scheduler;
pub mod worker;

pub use retry::RetryPolicy;
pub use scheduler::PollScheduler;
pub use worker::{DrainReport, SyncWorker, SyncWorkerHandle, WorkerDeps, WorkerSettings};
