//! Configuration module for evtrack.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for evtrack.
///
/// Every section is optional in the file; missing sections take their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub sync: SyncConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub telemetry: TelemetryConfig,
    pub prediction: PredictionConfig,
}

/// Sync server location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `http` or `https`.
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Per-request transport timeout in seconds.
    pub request_timeout_secs: u64,
}

/// Sync worker and scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between scheduled polls.
    pub poll_interval: u64,
    /// Upper bound on a single task dispatch, in seconds.
    pub task_timeout_secs: u64,
    /// Failed attempts before an outbox entry is dead-lettered.
    pub max_attempts: u32,
    /// First retry delay in seconds; doubles on every attempt.
    pub backoff_base_secs: u64,
    /// Ceiling of the retry delay in seconds.
    pub backoff_max_secs: u64,
    /// Capacity of the worker's wake-up channel.
    pub queue_capacity: usize,
}

/// Local persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the SQLite database file.
    pub database: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

/// Prometheus metrics endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    /// `host:port` the `/metrics` server binds to.
    pub endpoint: String,
}

/// Classifier feature extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Event names the classifier knows. Empty accepts any name.
    pub known_names: Vec<String>,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration as YAML to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/evtrack/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("evtrack")
            .join("config.yaml")
    }
}

impl ServerConfig {
    /// `scheme://host:port/`
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}/", self.scheme, self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: "192.168.0.105".to_string(),
            port: 3001,
            request_timeout_secs: 15,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: 300,
            task_timeout_secs: 30,
            max_attempts: 8,
            backoff_base_secs: 2,
            backoff_max_secs: 600,
            queue_capacity: 100,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("evtrack")
                .join("evtrack.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "127.0.0.1:9100".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.poll_interval"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

/// Valid values for `server.scheme`.
const VALID_SCHEMES: &[&str] = &["http", "https"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut positive = |field: &str, value: u64| {
            if value == 0 {
                errors.push(ValidationError {
                    field: field.into(),
                    message: "must be greater than 0".into(),
                });
            }
        };

        positive("server.request_timeout_secs", self.server.request_timeout_secs);
        positive("sync.poll_interval", self.sync.poll_interval);
        positive("sync.task_timeout_secs", self.sync.task_timeout_secs);
        positive("sync.max_attempts", u64::from(self.sync.max_attempts));
        positive("sync.backoff_base_secs", self.sync.backoff_base_secs);
        positive("sync.queue_capacity", self.sync.queue_capacity as u64);

        // --- server ---
        if !VALID_SCHEMES.contains(&self.server.scheme.as_str()) {
            errors.push(ValidationError {
                field: "server.scheme".into(),
                message: format!(
                    "invalid scheme '{}'; valid options: {}",
                    self.server.scheme,
                    VALID_SCHEMES.join(", ")
                ),
            });
        }
        if self.server.host.trim().is_empty() {
            errors.push(ValidationError {
                field: "server.host".into(),
                message: "must not be empty".into(),
            });
        } else if url::Url::parse(&self.server.base_url()).is_err() {
            errors.push(ValidationError {
                field: "server.host".into(),
                message: format!("'{}' does not form a valid URL", self.server.host),
            });
        }
        if self.server.port == 0 {
            errors.push(ValidationError {
                field: "server.port".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- sync ---
        if self.sync.backoff_max_secs < self.sync.backoff_base_secs {
            errors.push(ValidationError {
                field: "sync.backoff_max_secs".into(),
                message: format!(
                    "backoff_max_secs ({}) must not be below backoff_base_secs ({})",
                    self.sync.backoff_max_secs, self.sync.backoff_base_secs
                ),
            });
        }

        // --- storage ---
        if self.storage.database.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.database".into(),
                message: "must not be empty".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        // --- telemetry ---
        if self.telemetry.enabled
            && self
                .telemetry
                .endpoint
                .parse::<std::net::SocketAddr>()
                .is_err()
        {
            errors.push(ValidationError {
                field: "telemetry.endpoint".into(),
                message: format!("'{}' is not a host:port address", self.telemetry.endpoint),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use evtrack_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .server_host("sync.example.org")
///     .sync_poll_interval(60)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- server ---

    pub fn server_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.config.server.scheme = scheme.into();
        self
    }

    pub fn server_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn server_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn server_request_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.server.request_timeout_secs = seconds;
        self
    }

    // --- sync ---

    pub fn sync_poll_interval(mut self, seconds: u64) -> Self {
        self.config.sync.poll_interval = seconds;
        self
    }

    pub fn sync_task_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.sync.task_timeout_secs = seconds;
        self
    }

    pub fn sync_max_attempts(mut self, attempts: u32) -> Self {
        self.config.sync.max_attempts = attempts;
        self
    }

    pub fn sync_backoff(mut self, base_secs: u64, max_secs: u64) -> Self {
        self.config.sync.backoff_base_secs = base_secs;
        self.config.sync.backoff_max_secs = max_secs;
        self
    }

    pub fn sync_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.sync.queue_capacity = capacity;
        self
    }

    // --- storage ---

    pub fn storage_database(mut self, path: PathBuf) -> Self {
        self.config.storage.database = path;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- telemetry ---

    pub fn telemetry_enabled(mut self, enabled: bool) -> Self {
        self.config.telemetry.enabled = enabled;
        self
    }

    pub fn telemetry_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.telemetry.endpoint = endpoint.into();
        self
    }

    // --- prediction ---

    pub fn prediction_known_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.prediction.known_names = names.into_iter().map(Into::into).collect();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
