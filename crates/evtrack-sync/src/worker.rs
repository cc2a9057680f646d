//! Outbox-driven sync worker
//!
//! A single task owns all network traffic. Producers go through a cloneable
//! [`SyncWorkerHandle`]: the task is written to the durable outbox first and
//! the worker is then nudged with a non-blocking wake-up, so callers never
//! wait on the network.
//!
//! ```text
//! EventService ──submit──► outbox (SQLite) ──head──► SyncWorker ──POST──► server
//!                   │                                    ▲
//!                   └────────── Wake (try_send) ─────────┘
//! ```
//!
//! Only the head of the outbox is ever dispatched. A head waiting for its
//! backoff blocks the entries behind it, so two pushes for the same event
//! reach the server in the order they were submitted.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use evtrack_core::config::Config;
use evtrack_core::domain::{EventRecord, RequestKind, SyncError, SyncTask};
use evtrack_core::ports::{
    IDeviceRegistry, ILocalStore, IOutbox, IPollWatermark, ITaskSink, ITransport, OutboxEntry,
};
use evtrack_core::usecases::{MergeReport, Reconciler, SnapshotOutcome};
use evtrack_telemetry::MetricsRegistry;

use crate::retry::RetryPolicy;

// ============================================================================
// Configuration and dependencies
// ============================================================================

/// Tunables of the worker
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Server root, e.g. `http://192.168.0.105:3001/`
    pub base_url: String,
    /// Upper bound on a single dispatch
    pub task_timeout: Duration,
    pub retry: RetryPolicy,
    /// Capacity of the wake-up channel
    pub queue_capacity: usize,
}

impl WorkerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.server.base_url(),
            task_timeout: config.sync.task_timeout(),
            retry: RetryPolicy::from_config(&config.sync),
            queue_capacity: config.sync.queue_capacity.max(1),
        }
    }
}

/// Ports the worker drives
pub struct WorkerDeps {
    pub transport: Arc<dyn ITransport + Send + Sync>,
    pub store: Arc<dyn ILocalStore + Send + Sync>,
    pub outbox: Arc<dyn IOutbox + Send + Sync>,
    pub watermark: Arc<dyn IPollWatermark + Send + Sync>,
    pub registry: Arc<dyn IDeviceRegistry + Send + Sync>,
    pub metrics: Option<Arc<MetricsRegistry>>,
}

// ============================================================================
// Commands and reports
// ============================================================================

/// Messages accepted by the worker loop
#[derive(Debug)]
pub enum WorkerCommand {
    /// New work was persisted to the outbox
    Wake,
    /// Dispatch everything now, ignoring backoff schedules, and report back
    Flush {
        reply: oneshot::Sender<anyhow::Result<DrainReport>>,
    },
}

/// Outcome of one pass over the outbox
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Tasks acknowledged by the server
    pub delivered: u32,
    /// Tasks dead-lettered after a permanent error or too many attempts
    pub failed: u32,
    /// Polls that failed and were discarded
    pub dropped: u32,
    /// Whether the pass stopped on a head entry waiting for its backoff
    pub blocked: bool,
    /// Pending entries left in the outbox
    pub remaining: u64,
    /// Poll merge results, in dispatch order
    pub merges: Vec<MergeReport>,
}

/// What happened to a single head entry
enum Disposition {
    Delivered(Option<MergeReport>),
    Rescheduled,
    Failed,
    Dropped,
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable submission handle for the [`SyncWorker`]
#[derive(Clone)]
pub struct SyncWorkerHandle {
    tx: mpsc::Sender<WorkerCommand>,
    outbox: Arc<dyn IOutbox + Send + Sync>,
}

impl SyncWorkerHandle {
    /// Asks the running worker to dispatch everything now
    ///
    /// Returns once the pass is over. Fails if the worker has stopped.
    pub async fn flush(&self) -> anyhow::Result<DrainReport> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(WorkerCommand::Flush { reply: tx })
            .await
            .map_err(|_| anyhow::anyhow!("Sync worker has stopped"))?;

        rx.await
            .map_err(|_| anyhow::anyhow!("Sync worker response lost"))?
    }

    fn wake(&self) {
        match self.tx.try_send(WorkerCommand::Wake) {
            Ok(()) => {}
            // A wake-up is already queued; it will see the new entry.
            Err(mpsc::error::TrySendError::Full(_)) => {}
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Sync worker not running, task stays in the outbox");
            }
        }
    }
}

#[async_trait::async_trait]
impl ITaskSink for SyncWorkerHandle {
    async fn submit(&self, task: SyncTask) -> anyhow::Result<()> {
        let kind = task.kind();

        // Polls and registrations carry no payload; one pending copy suffices.
        if matches!(kind, RequestKind::Poll | RequestKind::Register)
            && self.outbox.has_pending(kind).await?
        {
            debug!(kind = %kind, "Identical task already pending, not queued");
            self.wake();
            return Ok(());
        }

        let id = self.outbox.enqueue(&task).await?;
        debug!(id, task = %task, "Task submitted");
        self.wake();
        Ok(())
    }
}

// ============================================================================
// Worker
// ============================================================================

/// Serialized dispatcher of outbox entries
pub struct SyncWorker {
    transport: Arc<dyn ITransport + Send + Sync>,
    store: Arc<dyn ILocalStore + Send + Sync>,
    outbox: Arc<dyn IOutbox + Send + Sync>,
    watermark: Arc<dyn IPollWatermark + Send + Sync>,
    registry: Arc<dyn IDeviceRegistry + Send + Sync>,
    reconciler: Reconciler,
    metrics: Option<Arc<MetricsRegistry>>,
    settings: WorkerSettings,
    rx: mpsc::Receiver<WorkerCommand>,
}

impl SyncWorker {
    /// Creates the worker and its submission handle
    pub fn new(deps: WorkerDeps, settings: WorkerSettings) -> (Self, SyncWorkerHandle) {
        let (tx, rx) = mpsc::channel(settings.queue_capacity.max(1));
        let handle = SyncWorkerHandle {
            tx,
            outbox: Arc::clone(&deps.outbox),
        };
        let reconciler = Reconciler::new(Arc::clone(&deps.store), Arc::clone(&deps.watermark));

        let worker = Self {
            transport: deps.transport,
            store: deps.store,
            outbox: deps.outbox,
            watermark: deps.watermark,
            registry: deps.registry,
            reconciler,
            metrics: deps.metrics,
            settings,
            rx,
        };

        (worker, handle)
    }

    /// Runs the dispatch loop until `shutdown` fires or every handle is dropped
    ///
    /// Entries already in the outbox (from a previous run) are picked up
    /// immediately.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Sync worker started");

        loop {
            let wait = match self.drain(false).await {
                Ok(report) if report.blocked => self.until_head_due().await,
                Ok(_) => None,
                Err(e) => {
                    error!(error = ?e, "Outbox unavailable, backing off");
                    Some(self.settings.retry.delay_for(0))
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                command = self.rx.recv() => match command {
                    Some(WorkerCommand::Wake) => {}
                    Some(WorkerCommand::Flush { reply }) => {
                        let result = self.drain(true).await;
                        let _ = reply.send(result);
                    }
                    None => break,
                },
                _ = sleep_or_forever(wait) => {}
            }
        }

        info!("Sync worker stopped");
    }

    /// Dispatches head entries until the outbox is empty or the head has to wait
    ///
    /// With `force`, backoff schedules are ignored. A head that fails with a
    /// retryable error still ends the pass.
    pub async fn drain(&self, force: bool) -> anyhow::Result<DrainReport> {
        let mut report = DrainReport::default();

        while let Some(entry) = self.outbox.head().await? {
            if !force && !entry.is_due(Utc::now()) {
                report.blocked = true;
                break;
            }

            match self.process(&entry).await? {
                Disposition::Delivered(merge) => {
                    report.delivered += 1;
                    report.merges.extend(merge);
                }
                Disposition::Failed => report.failed += 1,
                Disposition::Dropped => report.dropped += 1,
                Disposition::Rescheduled => {
                    report.blocked = true;
                    break;
                }
            }
        }

        report.remaining = self.outbox.depth().await?;
        if let Some(metrics) = &self.metrics {
            metrics.set_outbox_depth(report.remaining);
        }
        Ok(report)
    }

    async fn until_head_due(&self) -> Option<Duration> {
        match self.outbox.head().await {
            Ok(Some(entry)) => Some(
                (entry.next_attempt_at - Utc::now())
                    .to_std()
                    .unwrap_or(Duration::ZERO),
            ),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read outbox head");
                Some(self.settings.retry.delay_for(0))
            }
        }
    }

    /// Dispatches one entry and records the result in the outbox
    #[tracing::instrument(skip(self, entry), fields(id = entry.id, kind = %entry.task.kind(), attempts = entry.attempts))]
    async fn process(&self, entry: &OutboxEntry) -> anyhow::Result<Disposition> {
        let kind = entry.task.kind();
        let started = Instant::now();

        let result = match tokio::time::timeout(
            self.settings.task_timeout,
            self.dispatch(&entry.task),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(self.settings.task_timeout)),
        };

        if let Some(metrics) = &self.metrics {
            metrics.observe_task_duration(kind.as_str(), started.elapsed().as_secs_f64());
        }

        let disposition = match result {
            Ok(merge) => {
                self.outbox.complete(entry.id).await?;
                info!(task = %entry.task, "Task delivered");
                Disposition::Delivered(merge)
            }
            Err(e) if !kind.is_retryable() => {
                self.outbox.complete(entry.id).await?;
                warn!(error = %e, reason = e.label(), "Task failed, dropped");
                Disposition::Dropped
            }
            Err(e) => {
                let attempts = entry.attempts.saturating_add(1);
                if e.is_retryable() && self.settings.retry.allows_retry(attempts) {
                    let delay = self.settings.retry.delay_for(entry.attempts);
                    let next_attempt_at = Utc::now()
                        + chrono::Duration::from_std(delay)
                            .unwrap_or_else(|_| chrono::Duration::seconds(60));
                    self.outbox
                        .reschedule(entry.id, attempts, next_attempt_at, &e.to_string())
                        .await?;
                    warn!(
                        attempt = attempts,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "Transient error, retrying"
                    );
                    Disposition::Rescheduled
                } else {
                    self.outbox.fail(entry.id, &e.to_string()).await?;
                    error!(
                        attempt = attempts,
                        error = %e,
                        reason = e.label(),
                        "Task failed permanently"
                    );
                    Disposition::Failed
                }
            }
        };

        if let Some(metrics) = &self.metrics {
            let status = match &disposition {
                Disposition::Delivered(_) => "success",
                Disposition::Rescheduled => "retry",
                Disposition::Failed => "failed",
                Disposition::Dropped => "dropped",
            };
            metrics.record_task(kind.as_str(), status);
        }

        Ok(disposition)
    }

    async fn dispatch(&self, task: &SyncTask) -> Result<Option<MergeReport>, SyncError> {
        let watermark = match task.kind() {
            RequestKind::Poll => self.watermark.get().await.map_err(SyncError::store)?,
            _ => None,
        };
        let body = task.request_body(watermark.as_ref())?;
        let url = task.kind().url(&self.settings.base_url);

        let response = self.transport.post(&url, body).await?;
        debug!(status = response.status, bytes = response.body.len(), "Server accepted task");

        match (task.kind(), task.payload()) {
            (RequestKind::Upload, Some(event)) => {
                self.confirm_upload(event).await?;
                Ok(None)
            }
            (RequestKind::Register, _) => {
                self.registry
                    .mark_registered()
                    .await
                    .map_err(SyncError::store)?;
                info!("Device registered");
                Ok(None)
            }
            (RequestKind::Poll, _) => {
                let report = self.reconciler.apply_poll_response(&response.body).await?;
                self.record_merge(&report);
                Ok(Some(report))
            }
            _ => Ok(None),
        }
    }

    /// Marks the uploaded event as persisted without clobbering newer edits
    async fn confirm_upload(&self, sent: &EventRecord) -> Result<(), SyncError> {
        let current = self
            .store
            .find_by_uuid(sent.uuid())
            .await
            .map_err(SyncError::store)?;

        let record = match current {
            Some(local) if local.is_persisted() => return Ok(()),
            Some(mut local) => {
                local.mark_persisted();
                local
            }
            None => {
                let mut record = sent.clone();
                record.mark_persisted();
                record
            }
        };

        self.store.upsert(&record).await.map_err(SyncError::store)?;
        Ok(())
    }

    fn record_merge(&self, report: &MergeReport) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        let counts = [
            (SnapshotOutcome::Applied.as_str(), report.applied),
            (SnapshotOutcome::SkippedLocalNewer.as_str(), report.skipped_local_newer),
            (SnapshotOutcome::SkippedTombstone.as_str(), report.skipped_tombstone),
            ("malformed", report.malformed),
            ("store_failure", report.store_failures),
        ];
        for (outcome, count) in counts {
            metrics.record_snapshots(outcome, u64::from(count));
        }
    }
}

async fn sleep_or_forever(wait: Option<Duration>) {
    match wait {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_default_config() {
        let settings = WorkerSettings::from_config(&Config::default());

        assert_eq!(settings.base_url, "http://192.168.0.105:3001/");
        assert_eq!(settings.task_timeout, Duration::from_secs(30));
        assert_eq!(settings.queue_capacity, 100);
        assert_eq!(settings.retry.max_attempts(), 8);
    }

    #[test]
    fn test_drain_report_serializes() {
        let report = DrainReport {
            delivered: 2,
            remaining: 1,
            blocked: true,
            ..DrainReport::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["delivered"], 2);
        assert_eq!(json["blocked"], true);
        assert_eq!(json["merges"].as_array().unwrap().len(), 0);
    }
}
