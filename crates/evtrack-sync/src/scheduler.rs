//! Poll scheduler - periodic pull of remote changes
//!
//! Submits a [`SyncTask::poll`] every `interval`, starting immediately. The
//! sink deduplicates, so a slow server never piles up more than one pending
//! poll.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use evtrack_core::domain::SyncTask;
use evtrack_core::ports::ITaskSink;

/// Interval-driven poll trigger
pub struct PollScheduler {
    sink: Arc<dyn ITaskSink + Send + Sync>,
    interval: Duration,
}

impl PollScheduler {
    /// Creates a scheduler submitting to `sink` every `interval`
    ///
    /// A zero interval is bumped to one second.
    pub fn new(sink: Arc<dyn ITaskSink + Send + Sync>, interval: Duration) -> Self {
        Self {
            sink,
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Submits one poll now
    pub async fn poll_now(&self) {
        match self.sink.submit(SyncTask::poll()).await {
            Ok(()) => debug!("Scheduled poll submitted"),
            Err(e) => warn!(error = %e, "Failed to submit scheduled poll"),
        }
    }

    /// Main loop; returns when `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Poll scheduler started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.poll_now().await,
            }
        }

        info!("Poll scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use evtrack_core::domain::RequestKind;

    use super::*;

    #[derive(Default)]
    struct CountingSink {
        kinds: Mutex<Vec<RequestKind>>,
    }

    #[async_trait::async_trait]
    impl ITaskSink for CountingSink {
        async fn submit(&self, task: SyncTask) -> anyhow::Result<()> {
            self.kinds.lock().unwrap().push(task.kind());
            Ok(())
        }
    }

    struct BrokenSink;

    #[async_trait::async_trait]
    impl ITaskSink for BrokenSink {
        async fn submit(&self, _task: SyncTask) -> anyhow::Result<()> {
            anyhow::bail!("outbox unavailable")
        }
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let scheduler = PollScheduler::new(Arc::new(CountingSink::default()), Duration::ZERO);
        assert_eq!(scheduler.interval(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_start_and_every_interval() {
        let sink = Arc::new(CountingSink::default());
        let scheduler = PollScheduler::new(sink.clone(), Duration::from_secs(60));
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(scheduler.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(125)).await;
        shutdown.cancel();
        task.await.unwrap();

        let kinds = sink.kinds.lock().unwrap().clone();
        assert_eq!(kinds, vec![RequestKind::Poll; 3]);
    }

    #[tokio::test]
    async fn test_submit_failure_is_not_fatal() {
        let scheduler = PollScheduler::new(Arc::new(BrokenSink), Duration::from_secs(60));
        scheduler.poll_now().await;

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        scheduler.run(shutdown).await;
    }
}
