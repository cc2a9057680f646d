//! Shared command context
//!
//! Resolves the configuration once per invocation and, for commands that
//! touch the database, builds the same adapter graph the daemon uses. The
//! CLI never runs the worker loop; `evtrack sync` drains the outbox inline.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use evtrack_cache::{DatabasePool, SqliteEventStore, SqliteOutbox, SqliteSettingsStore};
use evtrack_core::{config::Config, usecases::EventService};
use evtrack_http::{resolve_base_url, HttpTransport};
use evtrack_sync::{SyncWorker, WorkerDeps, WorkerSettings};
use tracing::debug;

/// Configuration resolved from `--config` or the default location
pub struct CliContext {
    pub config_path: PathBuf,
    pub config: Config,
}

impl CliContext {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config_path = config_path.unwrap_or_else(Config::default_path);
        let config = Config::load_or_default(&config_path);
        debug!(config_path = %config_path.display(), "Loaded configuration");
        Self {
            config_path,
            config,
        }
    }

    /// Opens the database (creating it if needed) and wires the adapters
    pub async fn open(&self) -> Result<AppContext> {
        let db_path = &self.config.storage.database;
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let pool = DatabasePool::new(db_path)
            .await
            .context("Failed to open database")?;
        let store = Arc::new(SqliteEventStore::new(pool.pool().clone()));
        let outbox = Arc::new(SqliteOutbox::new(pool.pool().clone()));
        let settings = Arc::new(SqliteSettingsStore::new(pool.pool().clone()));

        let base_url = resolve_base_url(&self.config.server)?;
        let transport = HttpTransport::new(self.config.server.request_timeout())?;
        let mut worker_settings = WorkerSettings::from_config(&self.config);
        worker_settings.base_url = base_url.to_string();

        let (worker, handle) = SyncWorker::new(
            WorkerDeps {
                transport: Arc::new(transport),
                store: store.clone(),
                outbox: outbox.clone(),
                watermark: settings.clone(),
                registry: settings.clone(),
                metrics: None,
            },
            worker_settings,
        );
        let events = EventService::new(store.clone(), Arc::new(handle));

        Ok(AppContext {
            pool,
            store,
            outbox,
            settings,
            worker,
            events,
        })
    }
}

/// Adapters for one CLI invocation
pub struct AppContext {
    pub pool: DatabasePool,
    pub store: Arc<SqliteEventStore>,
    pub outbox: Arc<SqliteOutbox>,
    pub settings: Arc<SqliteSettingsStore>,
    pub worker: SyncWorker,
    pub events: EventService,
}

impl AppContext {
    /// Flushes and closes the database
    pub async fn close(self) {
        self.pool.close().await;
    }
}
