//! evtrack Daemon - background event synchronization
//!
//! This binary runs as a user service and handles:
//! - Delivery of queued event changes to the sync server
//! - Periodic polling of remote changes
//! - Device registration on first run
//! - Optional Prometheus `/metrics` endpoint
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! All adapters are built once here and handed to the components as
//! `Arc<dyn Port>`. The sync worker and the poll scheduler run as tasks
//! until a shared `CancellationToken` is triggered by a signal.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use evtrack_cache::{DatabasePool, SqliteEventStore, SqliteOutbox, SqliteSettingsStore};
use evtrack_core::{
    config::{Config, LoggingConfig},
    usecases::EventService,
};
use evtrack_http::{resolve_base_url, HttpTransport};
use evtrack_sync::{PollScheduler, SyncWorker, WorkerDeps, WorkerSettings};
use evtrack_telemetry::{MetricsRegistry, MetricsServer};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Overrides the configuration file location
const CONFIG_ENV: &str = "EVTRACK_CONFIG";

// ============================================================================
// DaemonService
// ============================================================================

/// Wires the adapters together and supervises the background tasks
struct DaemonService {
    config: Config,
    /// Token for signalling graceful shutdown to all async tasks
    shutdown: CancellationToken,
}

impl DaemonService {
    fn new(config: Config, shutdown: CancellationToken) -> Self {
        Self { config, shutdown }
    }

    /// Runs until the shutdown token is cancelled
    ///
    /// 1. Opens the database and builds the adapters
    /// 2. Starts the metrics server when enabled
    /// 3. Queues device registration if needed
    /// 4. Runs the sync worker and the poll scheduler
    async fn run(&self) -> Result<()> {
        let problems = self.config.validate();
        if !problems.is_empty() {
            for problem in &problems {
                error!(field = %problem.field, message = %problem.message, "Invalid configuration");
            }
            anyhow::bail!("Configuration has {} error(s)", problems.len());
        }

        let db_path = &self.config.storage.database;
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let db_pool = DatabasePool::new(db_path)
            .await
            .context("Failed to open database")?;

        let store = Arc::new(SqliteEventStore::new(db_pool.pool().clone()));
        let outbox = Arc::new(SqliteOutbox::new(db_pool.pool().clone()));
        let settings = Arc::new(SqliteSettingsStore::new(db_pool.pool().clone()));

        let base_url = resolve_base_url(&self.config.server)?;
        let transport = HttpTransport::new(self.config.server.request_timeout())?;
        info!(server = %base_url, "Sync server configured");

        let metrics = if self.config.telemetry.enabled {
            Some(Arc::new(MetricsRegistry::new()?))
        } else {
            None
        };

        let mut tasks = Vec::new();

        if let Some(metrics) = &metrics {
            let server = MetricsServer::new(Arc::clone(metrics), &self.config.telemetry.endpoint)?;
            let token = self.shutdown.child_token();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = server.run(token).await {
                    error!(error = %e, "Metrics server failed");
                }
            }));
        }

        let mut worker_settings = WorkerSettings::from_config(&self.config);
        worker_settings.base_url = base_url.to_string();
        let (worker, handle) = SyncWorker::new(
            WorkerDeps {
                transport: Arc::new(transport),
                store: store.clone(),
                outbox,
                watermark: settings.clone(),
                registry: settings.clone(),
                metrics,
            },
            worker_settings,
        );

        let sink = Arc::new(handle);
        let events = EventService::new(store, sink.clone());
        if let Err(e) = events.ensure_registered(settings.as_ref()).await {
            warn!(error = %format!("{e:#}"), "Could not queue device registration");
        }

        tasks.push(tokio::spawn(worker.run(self.shutdown.child_token())));

        let scheduler = PollScheduler::new(sink, self.config.sync.poll_interval());
        tasks.push(tokio::spawn(scheduler.run(self.shutdown.child_token())));

        info!("evtrack daemon running");
        self.shutdown.cancelled().await;
        info!("Shutdown requested, waiting for background tasks");

        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Background task panicked");
            }
        }

        db_pool.close().await;
        Ok(())
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Logging
// ============================================================================

fn init_tracing(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}

fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path)
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = config_path();
    let config = Config::load_or_default(&config_path);

    init_tracing(&config.logging);
    info!(config_path = %config_path.display(), "evtrack daemon starting (evtrackd)");

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token);
    let result = service.run().await;

    match &result {
        Ok(()) => info!("evtrack daemon shut down gracefully"),
        Err(e) => error!(error = %format!("{e:#}"), "evtrack daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
