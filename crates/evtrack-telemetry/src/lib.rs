//! evtrack Telemetry - Observability
//!
//! Provides:
//! - `MetricsRegistry`: Prometheus metrics for the outbox, task dispatch and poll merges
//! - `MetricsServer`: HTTP server for Prometheus scraping

pub mod metrics;
pub mod server;

pub use metrics::MetricsRegistry;
pub use server::MetricsServer;
