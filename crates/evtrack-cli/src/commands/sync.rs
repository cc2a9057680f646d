//! Sync command - deliver queued changes now
//!
//! Provides the `evtrack sync` CLI command which:
//! 1. Optionally revives dead-lettered outbox entries
//! 2. Queues device registration if this device is not registered yet
//! 3. Queues a poll unless `--no-poll` is given
//! 4. Drains the outbox inline, ignoring backoff schedules

use anyhow::Result;
use clap::Args;
use evtrack_sync::DrainReport;
use tracing::info;

use crate::context::{AppContext, CliContext};
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Only push local changes, do not fetch remote ones
    #[arg(long)]
    pub no_poll: bool,

    /// Give dead-lettered tasks another chance
    #[arg(long)]
    pub retry_failed: bool,
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &CliContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let app = ctx.open().await?;

        let result = self.run(&app).await;
        app.close().await;

        let (revived, report) = result?;
        if format.is_json() {
            let mut json = serde_json::to_value(&report)?;
            json["revived"] = serde_json::json!(revived);
            formatter.print_json(&json);
        } else {
            print_report(formatter.as_ref(), revived, &report);
        }
        Ok(())
    }

    async fn run(&self, app: &AppContext) -> Result<(u64, DrainReport)> {
        use evtrack_core::ports::IOutbox;

        let revived = if self.retry_failed {
            app.outbox.requeue_failed().await?
        } else {
            0
        };

        app.events.ensure_registered(app.settings.as_ref()).await?;
        if !self.no_poll {
            app.events.request_poll().await?;
        }

        info!(revived, poll = !self.no_poll, "Draining outbox");
        let report = app.worker.drain(true).await?;
        Ok((revived, report))
    }
}

fn print_report(formatter: &dyn OutputFormatter, revived: u64, report: &DrainReport) {
    if revived > 0 {
        formatter.info(&format!("Requeued {revived} failed task(s)"));
    }

    if report.blocked {
        formatter.warn(&format!(
            "Server unavailable; {} task(s) remain queued and will be retried",
            report.remaining
        ));
    } else {
        formatter.success("Sync completed");
    }

    formatter.field("delivered", &report.delivered.to_string());
    if report.failed > 0 {
        formatter.field("failed", &report.failed.to_string());
    }
    if report.dropped > 0 {
        formatter.field("polls dropped", &report.dropped.to_string());
    }
    formatter.field("queued", &report.remaining.to_string());

    for merge in &report.merges {
        formatter.field(
            "poll",
            &format!(
                "{} applied, {} kept local, {} tombstones ignored, {} malformed",
                merge.applied, merge.skipped_local_newer, merge.skipped_tombstone, merge.malformed
            ),
        );
        if !merge.watermark_advanced {
            formatter.warn("Some remote changes could not be stored; they will be fetched again");
        }
    }
}
