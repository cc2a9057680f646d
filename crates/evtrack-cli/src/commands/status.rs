//! Status command - Display synchronization status
//!
//! Provides the `evtrack status` CLI command which shows:
//! 1. The configured server and database
//! 2. Whether the device is registered and the current poll watermark
//! 3. Outbox depth, dead letters and the entries waiting for delivery

use anyhow::Result;
use chrono::{Local, Utc};
use clap::Args;
use evtrack_core::ports::{IDeviceRegistry, IOutbox, IPollWatermark, OutboxEntry, OutboxStatus};

use crate::context::CliContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// List every outbox entry, not only the first few
    #[arg(long)]
    pub all: bool,
}

/// Entries listed when `--all` is not given
const DEFAULT_LISTED: usize = 10;

impl StatusCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let app = ctx.open().await?;

        let registered = app.settings.is_registered().await?;
        let watermark = IPollWatermark::get(app.settings.as_ref()).await?;
        let depth = app.outbox.depth().await?;
        let failed = app.outbox.failed_count().await?;
        let live_events = app.store.count_live().await?;
        let entries = app.outbox.list().await?;
        app.close().await;

        let shown: Vec<&OutboxEntry> = if self.all {
            entries.iter().collect()
        } else {
            entries.iter().take(DEFAULT_LISTED).collect()
        };

        if format.is_json() {
            let outbox: Vec<serde_json::Value> = shown.iter().map(|e| entry_json(e)).collect();
            let json = serde_json::json!({
                "server": ctx.config.server.base_url(),
                "database": ctx.config.storage.database.display().to_string(),
                "registered": registered,
                "watermark": watermark.as_ref().map(|w| w.as_str()),
                "events": live_events,
                "outbox_depth": depth,
                "outbox_failed": failed,
                "outbox": outbox,
            });
            formatter.print_json(&json);
            return Ok(());
        }

        if depth == 0 && failed == 0 {
            formatter.success("Everything is synchronized");
        } else {
            formatter.success(&format!("{depth} task(s) waiting, {failed} failed"));
        }
        formatter.field("server", &ctx.config.server.base_url());
        formatter.field("database", &ctx.config.storage.database.display().to_string());
        formatter.field("registered", if registered { "yes" } else { "no" });
        formatter.field(
            "watermark",
            watermark.as_ref().map_or("(never polled)", |w| w.as_str()),
        );
        formatter.field("events", &live_events.to_string());

        if !shown.is_empty() {
            formatter.info("");
            formatter.info("Outbox:");
            for entry in &shown {
                formatter.info(&entry_line(entry));
            }
            if shown.len() < entries.len() {
                formatter.info(&format!(
                    "... {} more (use --all)",
                    entries.len() - shown.len()
                ));
            }
        }
        if failed > 0 {
            formatter.info("");
            formatter.info("Run 'evtrack sync --retry-failed' to retry failed tasks");
        }

        Ok(())
    }
}

fn entry_json(entry: &OutboxEntry) -> serde_json::Value {
    serde_json::json!({
        "id": entry.id,
        "kind": entry.task.kind(),
        "uuid": entry.task.payload().map(|e| e.uuid().as_str()),
        "status": entry.status,
        "attempts": entry.attempts,
        "next_attempt_at": entry.next_attempt_at.to_rfc3339(),
        "last_error": entry.last_error,
    })
}

fn entry_line(entry: &OutboxEntry) -> String {
    let state = match entry.status {
        OutboxStatus::Failed => "failed".to_string(),
        OutboxStatus::Pending if entry.is_due(Utc::now()) => "due".to_string(),
        OutboxStatus::Pending => format!(
            "retry at {}",
            entry
                .next_attempt_at
                .with_timezone(&Local)
                .format("%H:%M:%S")
        ),
    };
    let mut line = format!(
        "  #{:<5} {:<24} attempts {:<3} {}",
        entry.id,
        entry.task.to_string(),
        entry.attempts,
        state
    );
    if let Some(error) = &entry.last_error {
        line.push_str(&format!(" ({error})"));
    }
    line
}
