//! Config command - View and manage evtrack configuration
//!
//! Provides the `evtrack config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Writes a default configuration file
//! 3. Sets individual values via dot-notation keys
//! 4. Validates the configuration file and reports errors
//! 5. Prints the configuration file location

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use evtrack_core::config::Config;
use tracing::info;

use crate::context::CliContext;
use crate::output::{get_formatter, OutputFormat};

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "sync.poll_interval")
        key: String,
        /// New value
        value: String,
    },
    /// Validate the configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(ctx, format),
            ConfigCommand::Init { force } => execute_init(ctx, *force, format),
            ConfigCommand::Set { key, value } => execute_set(ctx, key, value, format),
            ConfigCommand::Validate => execute_validate(ctx, format),
            ConfigCommand::Path => {
                let formatter = get_formatter(format);
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "config_path": ctx.config_path.display().to_string(),
                        "exists": ctx.config_path.exists(),
                    }));
                } else {
                    println!("{}", ctx.config_path.display());
                }
                Ok(())
            }
        }
    }
}

fn execute_show(ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    info!(config_path = %ctx.config_path.display(), "Showing configuration");

    if format.is_json() {
        let json = serde_json::to_value(&ctx.config)
            .context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
        formatter.info("");
        let yaml = serde_yaml::to_string(&ctx.config)
            .context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }
    Ok(())
}

fn execute_init(ctx: &CliContext, force: bool, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let written = init_config(&ctx.config_path, force)?;

    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "success": written,
            "config_path": ctx.config_path.display().to_string(),
        }));
    } else if written {
        formatter.success(&format!("Wrote {}", ctx.config_path.display()));
    } else {
        formatter.warn(&format!(
            "{} already exists; use --force to overwrite",
            ctx.config_path.display()
        ));
    }
    Ok(())
}

/// Writes the default configuration unless a file exists and `force` is off
///
/// Returns whether the file was written.
fn init_config(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    Config::default().save(path)?;
    Ok(true)
}

fn execute_set(ctx: &CliContext, key: &str, value: &str, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let mut config = ctx.config.clone();

    info!(key = %key, value = %value, "Setting configuration value");

    if let Err(e) = apply_config_value(&mut config, key, value) {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "error": e.to_string(),
            }));
        } else {
            formatter.error(&format!("Failed to set '{}': {}", key, e));
            formatter.info("");
            formatter.info("Supported keys:");
            for supported in SUPPORTED_KEYS {
                formatter.info(&format!("  {supported}"));
            }
        }
        return Ok(());
    }

    let errors: Vec<String> = config.validate().iter().map(|e| e.to_string()).collect();
    if !errors.is_empty() {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "errors": errors,
            }));
        } else {
            formatter.error(&format!("Invalid value for '{}': {}", key, errors.join("; ")));
        }
        return Ok(());
    }

    config.save(&ctx.config_path)?;
    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "success": true,
            "key": key,
            "value": value,
            "config_path": ctx.config_path.display().to_string(),
        }));
    } else {
        formatter.success(&format!("Set {} = {}", key, value));
        formatter.info(&format!("Saved to {}", ctx.config_path.display()));
    }
    Ok(())
}

fn execute_validate(ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let path = &ctx.config_path;

    // Load explicitly: a parse error must be reported, not defaulted away
    let config = if path.exists() {
        match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": path.display().to_string(),
                        "errors": [format!("{e:#}")],
                    }));
                } else {
                    formatter.error(&format!("{e:#}"));
                }
                return Ok(());
            }
        }
    } else {
        formatter.info(&format!(
            "No configuration file at {}; checking defaults",
            path.display()
        ));
        Config::default()
    };

    let errors = config.validate();
    if format.is_json() {
        let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": path.display().to_string(),
            "errors": error_strings,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }
    Ok(())
}

const SUPPORTED_KEYS: &[&str] = &[
    "server.scheme",
    "server.host",
    "server.port",
    "server.request_timeout_secs",
    "sync.poll_interval",
    "sync.task_timeout_secs",
    "sync.max_attempts",
    "sync.backoff_base_secs",
    "sync.backoff_max_secs",
    "sync.queue_capacity",
    "storage.database",
    "logging.level",
    "logging.format",
    "telemetry.enabled",
    "telemetry.endpoint",
    "prediction.known_names (comma separated)",
];

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| anyhow::anyhow!("Expected a non-negative integer for {key}"))
}

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "server.scheme" => config.server.scheme = value.to_string(),
        "server.host" => config.server.host = value.to_string(),
        "server.port" => config.server.port = parse_number(key, value)?,
        "server.request_timeout_secs" => {
            config.server.request_timeout_secs = parse_number(key, value)?
        }
        "sync.poll_interval" => config.sync.poll_interval = parse_number(key, value)?,
        "sync.task_timeout_secs" => config.sync.task_timeout_secs = parse_number(key, value)?,
        "sync.max_attempts" => config.sync.max_attempts = parse_number(key, value)?,
        "sync.backoff_base_secs" => config.sync.backoff_base_secs = parse_number(key, value)?,
        "sync.backoff_max_secs" => config.sync.backoff_max_secs = parse_number(key, value)?,
        "sync.queue_capacity" => config.sync.queue_capacity = parse_number(key, value)?,
        "storage.database" => config.storage.database = value.into(),
        "logging.level" => config.logging.level = value.to_string(),
        "logging.format" => config.logging.format = value.to_string(),
        "telemetry.enabled" => {
            config.telemetry.enabled = value
                .parse::<bool>()
                .map_err(|_| anyhow::anyhow!("Expected true or false for {key}"))?
        }
        "telemetry.endpoint" => config.telemetry.endpoint = value.to_string(),
        "prediction.known_names" => {
            config.prediction.known_names = value
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect()
        }
        _ => anyhow::bail!("Unknown configuration key: {key}"),
    }
    Ok(())
}
