//! Prometheus metrics registry for evtrack
//!
//! Typed, labeled counters, gauges and histograms for the sync worker:
//! outbox depth, task outcomes per request kind, per-snapshot merge
//! outcomes and dispatch latency.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Central metrics registry holding all Prometheus metrics.
pub struct MetricsRegistry {
    registry: Registry,
    /// Gauge: pending outbox entries
    pub outbox_depth: IntGauge,
    /// Counter: dispatched tasks by (kind, status)
    pub sync_tasks_total: IntCounterVec,
    /// Counter: poll snapshots by merge outcome
    pub poll_snapshots_total: IntCounterVec,
    /// Histogram: task dispatch duration in seconds
    pub task_duration_seconds: HistogramVec,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with all metrics registered.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new_custom(Some("evtrack".to_string()), None)?;

        let outbox_depth = IntGauge::with_opts(Opts::new(
            "outbox_depth",
            "Number of sync tasks waiting in the outbox",
        ))?;
        registry.register(Box::new(outbox_depth.clone()))?;

        let sync_tasks_total = IntCounterVec::new(
            Opts::new("sync_tasks_total", "Total dispatched sync tasks"),
            &["kind", "status"],
        )?;
        registry.register(Box::new(sync_tasks_total.clone()))?;

        let poll_snapshots_total = IntCounterVec::new(
            Opts::new(
                "poll_snapshots_total",
                "Remote snapshots seen in poll responses by merge outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(poll_snapshots_total.clone()))?;

        let task_duration_seconds = HistogramVec::new(
            HistogramOpts::new("task_duration_seconds", "Sync task dispatch duration")
                .buckets(vec![0.05, 0.25, 1.0, 5.0, 30.0, f64::INFINITY]),
            &["kind"],
        )?;
        registry.register(Box::new(task_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            outbox_depth,
            sync_tasks_total,
            poll_snapshots_total,
            task_duration_seconds,
        })
    }

    // ========================================================================
    // Recording helpers
    // ========================================================================

    /// Record a task outcome (`success`, `retry`, `failed`, `dropped`).
    pub fn record_task(&self, kind: &str, status: &str) {
        self.sync_tasks_total
            .with_label_values(&[kind, status])
            .inc();
    }

    /// Add `count` snapshots with the given merge outcome.
    pub fn record_snapshots(&self, outcome: &str, count: u64) {
        if count > 0 {
            self.poll_snapshots_total
                .with_label_values(&[outcome])
                .inc_by(count);
        }
    }

    /// Observe how long a dispatch took.
    pub fn observe_task_duration(&self, kind: &str, duration_secs: f64) {
        self.task_duration_seconds
            .with_label_values(&[kind])
            .observe(duration_secs);
    }

    /// Set the outbox depth gauge.
    pub fn set_outbox_depth(&self, depth: u64) {
        self.outbox_depth.set(i64::try_from(depth).unwrap_or(i64::MAX));
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
